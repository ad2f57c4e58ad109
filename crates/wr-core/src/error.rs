use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};
use thiserror::Error;

use crate::item::WorkItemId;

/// Failure classes of the rule engine.
#[derive(Debug, Clone, PartialEq, Error, From)]
pub enum CoreReason {
    #[error("config error")]
    Config,
    #[error("script error")]
    Script,
    #[error("store error")]
    Store,
    #[error("save error")]
    Save,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            CoreReason::Config => 1001,
            CoreReason::Script => 1002,
            CoreReason::Store => 1003,
            CoreReason::Save => 1004,
            CoreReason::Uvs(r) => r.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;

/// Script backend failures, from load through run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("snippet {0:?} is already loaded")]
    DuplicateSnippet(String),
    #[error("unknown snippet {0:?}")]
    UnknownSnippet(String),
    #[error("snippet catalog is not sealed yet")]
    NotReady,
    #[error("snippet catalog is sealed, cannot load {0:?}")]
    Sealed(String),
    #[error("snippet catalog is already sealed")]
    AlreadySealed,
    #[error("snippet {name:?} failed to compile: {message}")]
    Compile { name: String, message: String },
    #[error("snippet {name:?} failed: {message}")]
    Execution { name: String, message: String },
}

/// Work item store failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("work item {0} not found")]
    NotFound(WorkItemId),
    #[error("store transport failed: {0}")]
    Transport(String),
    #[error("work item {0} was committed without being opened")]
    SaveProtocol(WorkItemId),
}

pub(crate) fn config_failure(detail: impl Into<String>) -> CoreError {
    StructError::from(CoreReason::Config).with_detail(detail.into())
}

pub(crate) fn script_failure(e: ScriptError) -> CoreError {
    StructError::from(CoreReason::Script).with_detail(e.to_string())
}

pub(crate) fn store_failure(e: StoreError) -> CoreError {
    StructError::from(CoreReason::Store).with_detail(e.to_string())
}

pub(crate) fn save_failure(e: StoreError) -> CoreError {
    StructError::from(CoreReason::Save).with_detail(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(CoreReason::Config.error_code(), 1001);
        assert_eq!(CoreReason::Script.error_code(), 1002);
        assert_eq!(CoreReason::Store.error_code(), 1003);
        assert_eq!(CoreReason::Save.error_code(), 1004);
    }

    #[test]
    fn script_failure_carries_backend_message() {
        let err = script_failure(ScriptError::Execution {
            name: "rollup".to_string(),
            message: "unknown field \"estimate\"".to_string(),
        });
        let text = format!("{err}");
        assert!(text.contains("rollup"), "missing snippet name: {text}");
        assert!(text.contains("unknown field"), "missing cause: {text}");
    }

    #[test]
    fn store_error_names_the_item() {
        let err = StoreError::NotFound(WorkItemId(7));
        assert_eq!(err.to_string(), "work item 7 not found");
    }
}
