//! Configuration management for `stavelive.toml`.
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[service]` | Remote render service (url, exchange timeouts)   |
//! | `[preview]` | Debounce windows and notation system             |
//! | `[session]` | Session store location and persistence toggle    |
//!
//! The config file is optional: a missing file yields defaults, CLI
//! options override file values, and unknown fields warn rather than fail.

mod error;
mod section;

pub use error::ConfigError;
pub use section::{PreviewConfig, ServiceConfig, SessionConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::document::RenderOptions;
use crate::engine::EngineOptions;

/// Root configuration structure representing stavelive.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StudioConfig {
    /// Absolute path to the config file, when one was found (internal)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Remote render service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Preview engine settings
    #[serde(default)]
    pub preview: PreviewConfig,

    /// Session persistence settings
    #[serde(default)]
    pub session: SessionConfig,
}

impl StudioConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file; a missing file is not
    /// an error - the defaults describe a local development service.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match find_config_file(&cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = Some(path);
                config
            }
            None => Self::default(),
        };

        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content, warning about unknown fields.
    pub fn from_str(content: &str) -> Result<Self> {
        let (config, ignored) = Self::parse_with_ignored(content)?;
        if !ignored.is_empty() {
            crate::log!("warning"; "ignoring unknown config fields:");
            for field in &ignored {
                eprintln!("- {}", field);
            }
        }
        Ok(config)
    }

    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_str(&content)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// CLI options override file values.
    fn apply_cli(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);
        if let Some(url) = &cli.service_url {
            self.service.url = url.clone();
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.service.url.starts_with("http://") && !self.service.url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "service.url must be an http(s) URL, got `{}`",
                self.service.url
            ))
            .into());
        }
        if self.preview.debounce_ms == 0 {
            return Err(
                ConfigError::Validation("preview.debounce_ms must be non-zero".into()).into(),
            );
        }
        if self.preview.engrave_debounce_ms < self.preview.debounce_ms {
            return Err(ConfigError::Validation(
                "preview.engrave_debounce_ms must not be shorter than preview.debounce_ms".into(),
            )
            .into());
        }
        Ok(())
    }

    // ========================================================================
    // derived settings
    // ========================================================================

    /// Engine tuning derived from the `[preview]` section.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            preview_delay: Duration::from_millis(self.preview.debounce_ms),
            engrave_delay: Duration::from_millis(self.preview.engrave_debounce_ms),
            render: self.render_options(),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            system: self.preview.system,
        }
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_millis(self.service.timeout_ms)
    }

    pub fn engrave_timeout(&self) -> Duration {
        Duration::from_millis(self.service.engrave_timeout_ms)
    }

    /// Session store file for a watched notation file.
    pub fn store_path_for(&self, file: &Path) -> PathBuf {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".into());
        self.session.dir.join(format!("{stem}.session.json"))
    }

    /// Preview projection directory for a watched notation file.
    pub fn preview_dir_for(&self, file: &Path) -> PathBuf {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".into());
        self.session.dir.join("preview").join(stem)
    }
}

/// Search upward from cwd for the config file.
fn find_config_file(name: &Path) -> Option<PathBuf> {
    if name.is_absolute() {
        return name.exists().then(|| name.to_path_buf());
    }

    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(name);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::System;

    #[test]
    fn test_defaults() {
        let config = StudioConfig::default();
        assert_eq!(config.service.url, "http://127.0.0.1:3000");
        assert_eq!(config.preview.debounce_ms, 300);
        assert_eq!(config.preview.engrave_debounce_ms, 5000);
        assert_eq!(config.preview.system, System::Auto);
        assert!(config.session.persist);
    }

    #[test]
    fn test_from_str_sections() {
        let config = StudioConfig::from_str(
            "[service]\nurl = \"http://localhost:9000\"\n[preview]\nsystem = \"sargam\"\ndebounce_ms = 150",
        )
        .unwrap();
        assert_eq!(config.service.url, "http://localhost:9000");
        assert_eq!(config.preview.system, System::Sargam);
        assert_eq!(config.preview.debounce_ms, 150);
        // Unspecified fields keep their defaults
        assert_eq!(config.preview.engrave_debounce_ms, 5000);
    }

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(StudioConfig::from_str("[service\nurl = 3").is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let (config, ignored) =
            StudioConfig::parse_with_ignored("[service]\nurl = \"http://x\"\nshiny = true")
                .unwrap();
        assert_eq!(config.service.url, "http://x");
        assert!(ignored.iter().any(|f| f.contains("shiny")));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = StudioConfig::default();
        config.service.url = "ftp://example".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_windows() {
        let mut config = StudioConfig::default();
        config.preview.engrave_debounce_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_path_uses_file_stem() {
        let config = StudioConfig::default();
        let path = config.store_path_for(Path::new("/scores/raga.mt"));
        assert!(path.ends_with(".stavelive/raga.session.json"));
    }
}
