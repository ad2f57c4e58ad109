use serde::{Deserialize, Serialize};

pub use wr_config::ChangeKind;

use crate::item::WorkItemId;

/// A change notification: which item changed and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub item_id: WorkItemId,
    pub change: ChangeKind,
}

impl Notification {
    pub fn new(item_id: WorkItemId, change: ChangeKind) -> Self {
        Self { item_id, change }
    }
}

/// Where a notification came from: the collection and project it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub collection: String,
    pub project: String,
}

impl RequestContext {
    pub fn new(collection: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            project: project.into(),
        }
    }
}

/// Outcome reported back for one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub status_code: i32,
    pub status_message: String,
}

impl ProcessingResult {
    /// At least one policy matched and the invocation ran to completion.
    pub fn success() -> Self {
        Self {
            status_code: 0,
            status_message: "Success".to_string(),
        }
    }

    /// No policy scope matched; the store was never touched.
    pub fn no_operation() -> Self {
        Self {
            status_code: 1,
            status_message: "No operation".to_string(),
        }
    }
}
