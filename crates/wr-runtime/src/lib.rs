#[macro_use]
mod log_macros;

pub mod error;
pub mod lifecycle;
pub mod observer;
pub(crate) mod processor_task;
pub mod receiver;
pub mod tracing_init;
