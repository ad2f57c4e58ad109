use crate::item::WorkItem;
use crate::script::EngineKind;

/// Side channel the engine narrates its progress through.
///
/// Every hook has an empty default so implementors pick what they care
/// about. Hooks are called inline on the processing path and must not block.
pub trait EngineObserver: Send + Sync {
    /// A backend was chosen for the configured language identifier.
    fn backend_selected(&self, _kind: EngineKind, _requested: &str) {}

    /// A snippet was loaded into the catalog.
    fn snippet_loaded(&self, _name: &str, _fingerprint: &str) {}

    /// A policy matched the event scope and is being applied.
    fn policy_applying(&self, _policy: &str) {}

    /// A rule of a matched policy is being considered.
    fn rule_applying(&self, _policy: &str, _rule: &str) {}

    /// A rule's record scope matched; its snippet is about to run.
    fn rule_running(&self, _rule: &str, _item: &WorkItem) {}

    /// A dirty record reached the save phase.
    fn saving(&self, _item: &WorkItem, _valid: bool) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl EngineObserver for NullObserver {}
