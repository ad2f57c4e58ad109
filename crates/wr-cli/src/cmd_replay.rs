use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use wr_config::RulesConfig;
use wr_core::{EventProcessor, MemoryStore, NullObserver, WorkItemId};
use wr_runtime::receiver::EventEnvelope;

/// Outcome of one successfully processed envelope.
pub struct EventOutcome {
    pub item_id: WorkItemId,
    pub status_code: i32,
    pub status_message: String,
}

/// Result of replaying captured envelopes through the engine.
pub struct ReplayResult {
    /// One entry per envelope that processed without error, in input order.
    pub outcomes: Vec<EventOutcome>,
    /// Envelopes decoded from the input.
    pub events: u64,
    /// Envelopes that matched a policy and went through the save phase.
    pub applied: u64,
    /// Envelopes no policy matched.
    pub no_op: u64,
    /// Undecodable lines plus processing errors.
    pub failed: u64,
}

/// CLI entry point: load config + events file → replay → print output.
pub fn run(config: PathBuf, events: PathBuf, seed: Option<PathBuf>) -> Result<()> {
    let config_path = config
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
    let rules_config = RulesConfig::load(&config_path)?;
    let base_dir = config_path.parent().unwrap_or(Path::new("."));

    let store = build_replay_store(&rules_config, base_dir, seed.as_deref())?;

    let reader = BufReader::new(
        std::fs::File::open(&events)
            .map_err(|e| anyhow::anyhow!("failed to open {}: {e}", events.display()))?,
    );

    let result = replay_events(&rules_config, Arc::new(store), reader)?;

    for outcome in &result.outcomes {
        println!(
            "{}",
            serde_json::json!({
                "item_id": outcome.item_id,
                "status_code": outcome.status_code,
                "status_message": outcome.status_message,
            })
        );
    }

    eprintln!("---");
    eprintln!(
        "Replay complete: {} events processed, {} applied, {} no-ops, {} errors",
        result.events, result.applied, result.no_op, result.failed
    );

    Ok(())
}

/// Replay seeds the store from `--seed` when given, otherwise from the
/// config's `[store]` section. It never opens the journal; every mutation
/// stays in memory.
fn build_replay_store(
    config: &RulesConfig,
    base_dir: &Path,
    seed_override: Option<&Path>,
) -> Result<MemoryStore> {
    let store = MemoryStore::new();
    let seed_path = match seed_override {
        Some(path) => Some(path.to_path_buf()),
        None => config.store.seed.as_ref().map(|seed| {
            if seed.is_relative() {
                base_dir.join(seed)
            } else {
                seed.clone()
            }
        }),
    };
    if let Some(path) = seed_path {
        let count = store.load_seed(&path)?;
        eprintln!("Loaded {count} item(s) from {}", path.display());
    }
    Ok(store)
}

/// Pure-logic replay: build the processor from config and feed it
/// newline-delimited envelopes from `reader`.
///
/// Returns per-event outcomes plus statistics. This function is testable
/// without filesystem access.
pub fn replay_events<R: BufRead>(
    config: &RulesConfig,
    store: Arc<MemoryStore>,
    reader: R,
) -> Result<ReplayResult> {
    let processor = EventProcessor::new(config, store, Arc::new(NullObserver))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut outcomes = Vec::new();
    let mut events: u64 = 0;
    let mut applied: u64 = 0;
    let mut no_op: u64 = 0;
    let mut failed: u64 = 0;

    for (no, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let envelope: EventEnvelope = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("WARN: skipping invalid envelope on line {}: {e}", no + 1);
                failed += 1;
                continue;
            }
        };

        events += 1;
        let item_id = envelope.item_id;
        let (ctx, notification) = envelope.split();
        match processor.process_event(&ctx, &notification) {
            Ok(result) => {
                if result.status_code == 0 {
                    applied += 1;
                } else {
                    no_op += 1;
                }
                outcomes.push(EventOutcome {
                    item_id,
                    status_code: result.status_code,
                    status_message: result.status_message,
                });
            }
            Err(e) => {
                eprintln!("ERROR: processing item {item_id} failed: {e}");
                failed += 1;
            }
        }
    }

    Ok(ReplayResult {
        outcomes,
        events,
        applied,
        no_op,
        failed,
    })
}
