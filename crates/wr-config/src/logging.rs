use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// `[logging]` section. Every knob has a default, so the whole section may
/// be left out of `workrules.toml`.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Base severity applied to every target without an override.
    #[serde(default = "default_level")]
    pub level: String,
    /// Rendering of the stderr stream and, when `file` is set, the log file.
    #[serde(default)]
    pub format: LogFormat,
    /// Copy log output to this file in addition to stderr. A relative path
    /// is taken from the directory holding the config file.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Per-target severity overrides keyed by module path:
    /// `modules = { "wr_runtime::receiver" = "debug" }`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            file: None,
            modules: HashMap::new(),
        }
    }
}

/// Rendering of a log stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One line per event, colored on a terminal.
    #[default]
    Plain,
    /// One JSON object per event.
    Json,
}
