use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};
use thiserror::Error;
use wr_core::CoreReason;

#[derive(Debug, Clone, PartialEq, Error, From)]
pub enum RuntimeReason {
    #[error("bootstrap failed")]
    Bootstrap,
    #[error("shutdown failed")]
    Shutdown,
    #[error("{0}")]
    Core(CoreReason),
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for RuntimeReason {
    fn error_code(&self) -> i32 {
        match self {
            RuntimeReason::Bootstrap => 2001,
            RuntimeReason::Shutdown => 2002,
            RuntimeReason::Core(reason) => reason.error_code(),
            RuntimeReason::Uvs(reason) => reason.error_code(),
        }
    }
}

pub type RuntimeError = StructError<RuntimeReason>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
