use serde::Deserialize;

use crate::error::ScriptError;
use crate::item::{FieldValue, WorkItem};

use super::catalog::SnippetCatalog;
use super::{EngineKind, ScriptEngine};

/// Declarative backend: a snippet is a JSON array of patch operations.
///
/// ```json
/// [
///   {"op": "set", "field": "state", "value": "triaged"},
///   {"op": "remove", "field": "stale"}
/// ]
/// ```
///
/// Values must be JSON scalars; everything is checked at load time, so a
/// loaded patch can only fail on a missing snippet.
pub struct PatchEngine {
    catalog: SnippetCatalog<Vec<PatchOp>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum RawOp {
    Set {
        field: String,
        value: serde_json::Value,
    },
    Remove {
        field: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum PatchOp {
    Set { field: String, value: FieldValue },
    Remove { field: String },
}

impl PatchEngine {
    pub fn new() -> Self {
        Self {
            catalog: SnippetCatalog::new(),
        }
    }
}

impl Default for PatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for PatchEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Patch
    }

    fn load(&mut self, name: &str, source: &str) -> Result<(), ScriptError> {
        let raw: Vec<RawOp> = serde_json::from_str(source).map_err(|e| ScriptError::Compile {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        let mut ops = Vec::with_capacity(raw.len());
        for op in raw {
            ops.push(match op {
                RawOp::Set { field, value } => {
                    let value = FieldValue::from_json(&value).ok_or_else(|| {
                        ScriptError::Compile {
                            name: name.to_string(),
                            message: format!("set {field:?}: value must be a JSON scalar"),
                        }
                    })?;
                    PatchOp::Set { field, value }
                }
                RawOp::Remove { field } => PatchOp::Remove { field },
            });
        }
        self.catalog.insert(name, ops)
    }

    fn load_completed(&mut self) -> Result<(), ScriptError> {
        self.catalog.seal()
    }

    fn run(&mut self, name: &str, item: &mut WorkItem) -> Result<(), ScriptError> {
        let ops = self.catalog.get(name)?;
        for op in ops {
            match op {
                PatchOp::Set { field, value } => item.set_field(field, value.clone()),
                PatchOp::Remove { field } => item.remove_field(field),
            }
        }
        Ok(())
    }
}
