use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChangeKind
// ---------------------------------------------------------------------------

/// The kind of change a notification reports for a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    Restored,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Restored => "restored",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Scope configuration
// ---------------------------------------------------------------------------
//
// Policy scopes constrain the triggering event; rule scopes constrain the
// loaded record. The two shapes are separate structs with
// `deny_unknown_fields`, so declaring a record condition inside a policy
// scope (or the reverse) is a parse error, not a silent mismatch.

/// Event-level scope conditions for a `[[policy]]`. Absent keys are
/// unconstrained; an empty (or omitted) table matches every event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyScopeConfig {
    /// Wildcard pattern matched against the event's collection name.
    pub collection: Option<String>,
    /// Wildcard patterns; the event's project must match at least one.
    pub projects: Option<Vec<String>>,
    /// The notification's change kind must be one of these.
    pub changes: Option<Vec<ChangeKind>>,
}

/// Record-level scope conditions for a `[[rule]]`. Absent keys are
/// unconstrained; an empty (or omitted) table matches every record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleScopeConfig {
    /// Wildcard patterns; the item's kind must match at least one.
    pub item_types: Option<Vec<String>>,
    /// All of these fields must be present on the item.
    pub has_fields: Option<Vec<String>>,
    /// Per-field regular expressions; every named field must be present and
    /// its value (stringified) must match.
    pub field_matches: Option<BTreeMap<String, String>>,
}

// ---------------------------------------------------------------------------
// Rule catalog
// ---------------------------------------------------------------------------

/// Raw `[[rule]]` table as written in TOML.
#[derive(Debug, Deserialize)]
pub(crate) struct RuleRaw {
    pub name: String,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub script_file: Option<PathBuf>,
    #[serde(default)]
    pub scope: RuleScopeConfig,
}

impl RuleRaw {
    /// Enforce the exactly-one-of rule for `script` / `script_file`.
    pub(crate) fn resolve(self) -> anyhow::Result<RuleDef> {
        let script = match (self.script, self.script_file) {
            (Some(_), Some(_)) => anyhow::bail!(
                "rule {:?}: set either script or script_file, not both",
                self.name,
            ),
            (Some(text), None) => ScriptSource::Inline(text),
            (None, Some(path)) => ScriptSource::File(path),
            (None, None) => anyhow::bail!(
                "rule {:?}: one of script or script_file is required",
                self.name,
            ),
        };
        Ok(RuleDef {
            name: self.name,
            scope: self.scope,
            script,
        })
    }
}

/// A resolved rule: a record-level scope plus the script source that gets
/// registered in the backend under the rule's name.
#[derive(Debug, Clone)]
pub struct RuleDef {
    pub name: String,
    pub scope: RuleScopeConfig,
    pub script: ScriptSource,
}

/// Where a rule's script text comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptSource {
    /// Inline source from the `script` key.
    Inline(String),
    /// Path from the `script_file` key, relative to the config file.
    File(PathBuf),
}

impl ScriptSource {
    /// The source text, if already inlined.
    pub fn text(&self) -> Option<&str> {
        match self {
            ScriptSource::Inline(s) => Some(s),
            ScriptSource::File(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// A `[[policy]]` table: an event-level scope plus ordered references into
/// the rule catalog. Reference order is application order.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDef {
    pub name: String,
    pub rules: Vec<String>,
    #[serde(default)]
    pub scope: PolicyScopeConfig,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
