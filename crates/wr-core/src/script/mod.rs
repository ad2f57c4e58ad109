use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::ScriptError;
use crate::item::WorkItem;
use crate::observer::EngineObserver;

pub mod calc;
pub mod catalog;
pub mod js;
pub mod patch;

pub use calc::CalcEngine;
pub use catalog::{EngineState, SnippetCatalog};
pub use js::JsEngine;
pub use patch::PatchEngine;

/// The backend variants a config can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Js,
    Calc,
    Patch,
}

/// Accepted spellings per backend, matched case-insensitively.
const ALIASES: &[(EngineKind, &[&str])] = &[
    (EngineKind::Js, &["js", "javascript", "ecmascript"]),
    (EngineKind::Calc, &["calc", "expr", "expression"]),
    (EngineKind::Patch, &["patch", "jsonpatch", "json-patch"]),
];

impl EngineKind {
    /// Resolve a configured language identifier to a backend.
    pub fn resolve(identifier: &str) -> Option<EngineKind> {
        let wanted = identifier.trim().to_ascii_lowercase();
        ALIASES
            .iter()
            .find(|(_, names)| names.contains(&wanted.as_str()))
            .map(|(kind, _)| *kind)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineKind::Js => "js",
            EngineKind::Calc => "calc",
            EngineKind::Patch => "patch",
        };
        write!(f, "{name}")
    }
}

/// A script backend: compiles named snippets at load time and mutates work
/// items at run time.
///
/// Backends go through the catalog lifecycle exactly once: a sequence of
/// `load` calls, one `load_completed`, then any number of `run` calls.
pub trait ScriptEngine: Send {
    fn kind(&self) -> EngineKind;

    /// Compile and store one snippet.
    fn load(&mut self, name: &str, source: &str) -> Result<(), ScriptError>;

    /// Seal the catalog.
    fn load_completed(&mut self) -> Result<(), ScriptError>;

    /// Run a loaded snippet against a working copy.
    fn run(&mut self, name: &str, item: &mut WorkItem) -> Result<(), ScriptError>;
}

/// Build the backend for a configured language identifier.
///
/// Unknown identifiers fall back to the default js backend with a warning
/// rather than failing the whole config.
pub fn build_engine(language: &str, observer: &dyn EngineObserver) -> Box<dyn ScriptEngine> {
    let kind = match EngineKind::resolve(language) {
        Some(kind) => kind,
        None => {
            log::warn!("unknown script language {language:?}, falling back to js");
            EngineKind::Js
        }
    };
    observer.backend_selected(kind, language);
    match kind {
        EngineKind::Js => Box::new(JsEngine::new()),
        EngineKind::Calc => Box::new(CalcEngine::new()),
        EngineKind::Patch => Box::new(PatchEngine::new()),
    }
}

/// Short content fingerprint used in load logs.
pub fn fingerprint(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let hex = format!("{digest:x}");
    hex[..12].to_string()
}
