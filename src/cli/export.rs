//! Export command: snapshot to a target format via the service.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::StudioConfig;
use crate::document::{ContentSnapshot, ExportFormat, RenderOptions, System};
use crate::remote::{HttpRenderService, RenderService};

pub fn run(
    file: &Path,
    format: ExportFormat,
    system: Option<System>,
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
    let payload = runtime
        .block_on(service.export_document(&snapshot, &options, format))
        .map_err(|e| anyhow::anyhow!("export to {} failed: {e}", format.as_str()))?;

    match output {
        Some(path) => {
            fs::write(path, payload.content)
                .with_context(|| format!("cannot write {}", path.display()))?;
            crate::log!("export"; "wrote {} ({})", path.display(), format.as_str());
        }
        None => println!("{}", payload.content),
    }
    Ok(())
}
