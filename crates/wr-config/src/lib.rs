pub mod logging;
pub mod policy;
pub mod server;
pub mod settings;
pub mod store;
pub mod validate;

pub use logging::{LogFormat, LoggingConfig};
pub use policy::{ChangeKind, PolicyDef, PolicyScopeConfig, RuleDef, RuleScopeConfig, ScriptSource};
pub use server::ServerConfig;
pub use settings::{EngineConfig, RulesConfig};
pub use store::StoreConfig;
