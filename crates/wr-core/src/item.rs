use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a work item inside its collection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WorkItemId(pub u64);

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(WorkItemId)
    }
}

impl From<u64> for WorkItemId {
    fn from(raw: u64) -> Self {
        WorkItemId(raw)
    }
}

/// Scalar value of a work item field.
///
/// Untagged on the wire: a JSON number, string or bool maps straight onto
/// the matching variant. Structured values are not field material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Str(String),
    Bool(bool),
}

impl FieldValue {
    /// Text rendering used by pattern scopes and log lines.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Number(n) => format!("{n}"),
            FieldValue::Str(s) => s.clone(),
            FieldValue::Bool(b) => format!("{b}"),
        }
    }

    /// Convert a JSON scalar; `None` for null and structured values.
    pub fn from_json(value: &serde_json::Value) -> Option<FieldValue> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
            serde_json::Value::String(s) => Some(FieldValue::Str(s.clone())),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Number(_) => "number",
            FieldValue::Str(_) => "string",
            FieldValue::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// A work item record: identity, classification and a scalar field map.
///
/// `dirty` and `open` are runtime state, never serialized. A record becomes
/// dirty on the first observable field change and must be opened before the
/// store will accept a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub kind: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub rev: u32,
    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    open: bool,
}

impl WorkItem {
    pub fn new(id: WorkItemId, kind: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            project: project.into(),
            fields: BTreeMap::new(),
            rev: 0,
            dirty: false,
            open: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Set a field, marking the record dirty only when the value actually
    /// changes.
    pub fn set_field(&mut self, name: &str, value: FieldValue) {
        if self.fields.get(name) == Some(&value) {
            return;
        }
        self.fields.insert(name.to_string(), value);
        self.dirty = true;
    }

    /// Remove a field; a no-op on absent fields.
    pub fn remove_field(&mut self, name: &str) {
        if self.fields.remove(name).is_some() {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// A record is savable while it carries a non-empty string title.
    pub fn is_valid(&self) -> bool {
        matches!(self.fields.get("title"), Some(FieldValue::Str(s)) if !s.is_empty())
    }

    /// Open the record for the commit that follows.
    pub fn partial_open(&mut self) {
        self.open = true;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
        self.open = false;
    }
}
