//! One-shot render command: fetch the preview artifact set and print it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::StudioConfig;
use crate::document::{ContentSnapshot, RenderOptions, System};
use crate::remote::{HttpRenderService, RenderService};

pub fn run(
    file: &Path,
    system: Option<System>,
    pretty: bool,
    output: Option<&Path>,
    config: &StudioConfig,
) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let snapshot = ContentSnapshot::new(content);
    let options = RenderOptions {
        system: system.unwrap_or(config.preview.system),
    };

    let service = HttpRenderService::new(
        &config.service.url,
        config.preview_timeout(),
        config.engrave_timeout(),
    )?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let artifacts = runtime
        .block_on(service.render_preview(&snapshot, &options))
        .map_err(|e| anyhow::anyhow!("render failed: {e}"))?;

    let value = serde_json::json!({
        "tree": artifacts.tree,
        "rhythm": artifacts.rhythm,
        "source": artifacts.source,
        "score": artifacts.score,
        "text": artifacts.text,
    });
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };

    match output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("cannot write {}", path.display()))?;
            crate::log!("render"; "wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
