pub mod error;
pub mod event;
pub mod item;
pub mod observer;
pub mod processor;
pub mod save;
pub mod scope;
pub mod script;
pub mod store;

pub use error::{CoreError, CoreReason, CoreResult, ScriptError, StoreError};
pub use event::{ChangeKind, Notification, ProcessingResult, RequestContext};
pub use item::{FieldValue, WorkItem, WorkItemId};
pub use observer::{EngineObserver, NullObserver};
pub use processor::{EventProcessor, Policy, Rule};
pub use save::{SaveReport, save_dirty};
pub use script::{EngineKind, EngineState, ScriptEngine, build_engine, fingerprint};
pub use store::{MemoryStore, Session, WorkItemStore};
