use wr_core::{EngineKind, EngineObserver, WorkItem};

/// Bridges engine progress hooks into the domain-tagged log stream.
///
/// The core crate stays `tracing`-free; this is where its narration turns
/// into `proc` and `store` log lines.
pub struct TracingObserver;

impl EngineObserver for TracingObserver {
    fn backend_selected(&self, kind: EngineKind, requested: &str) {
        wr_info!(proc, backend = %kind, requested, "script backend selected");
    }

    fn snippet_loaded(&self, name: &str, fingerprint: &str) {
        wr_debug!(proc, rule = name, fingerprint, "snippet loaded");
    }

    fn policy_applying(&self, policy: &str) {
        wr_debug!(proc, policy, "policy applying");
    }

    fn rule_applying(&self, policy: &str, rule: &str) {
        wr_trace!(proc, policy, rule, "rule considered");
    }

    fn rule_running(&self, rule: &str, item: &WorkItem) {
        wr_debug!(proc, rule, item_id = %item.id, kind = %item.kind, "rule running");
    }

    fn saving(&self, item: &WorkItem, valid: bool) {
        if valid {
            wr_debug!(store, item_id = %item.id, "saving work item");
        } else {
            wr_warn!(store, item_id = %item.id, "skipping save of invalid work item");
        }
    }
}
