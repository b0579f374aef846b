//! Configuration section definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::document::System;

/// `[service]` - the remote render service boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the parse/engrave service.
    pub url: String,
    /// Preview exchange timeout in milliseconds.
    pub timeout_ms: u64,
    /// Engrave exchange timeout in milliseconds. The engrave exchange is
    /// expected to take materially longer.
    pub engrave_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".into(),
            timeout_ms: 10_000,
            engrave_timeout_ms: 60_000,
        }
    }
}

/// `[preview]` - engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Quiescence window for live preview renders, in milliseconds.
    pub debounce_ms: u64,
    /// Quiescence window for the expensive engrave channel, in
    /// milliseconds.
    pub engrave_debounce_ms: u64,
    /// Notation system to parse under.
    pub system: System,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            engrave_debounce_ms: 5000,
            system: System::Auto,
        }
    }
}

/// `[session]` - persistence across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding session stores and preview projections.
    pub dir: PathBuf,
    /// Disable to keep session state in memory only.
    pub persist: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".stavelive"),
            persist: true,
        }
    }
}
