use std::path::PathBuf;

use serde::Deserialize;

/// `[store]` section: what the in-memory store seeds from and journals to.
/// Both fields are optional; relative paths are resolved against the config
/// file's parent directory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSONL file of work items loaded at startup.
    pub seed: Option<PathBuf>,
    /// JSONL append log recording every persisted save.
    pub journal: Option<PathBuf>,
}
