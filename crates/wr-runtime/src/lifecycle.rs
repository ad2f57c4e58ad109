use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use orion_error::op_context;
use orion_error::prelude::*;
use orion_error::{ErrorOwe, ErrorOweBase};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wr_config::RulesConfig;
use wr_core::{EventProcessor, MemoryStore};

use crate::error::{RuntimeReason, RuntimeResult};
use crate::observer::TracingObserver;
use crate::processor_task::run_processor_task;
use crate::receiver::{EventEnvelope, Receiver};

// ---------------------------------------------------------------------------
// TaskGroup — tasks that stop together, joined in a fixed order
// ---------------------------------------------------------------------------

/// Tasks belonging to one shutdown unit.
///
/// Groups are pushed in start order and joined back-to-front, so the join
/// order is the reverse of the dependency order:
///
///   start:  processor → receiver
///   join:   receiver → processor
///
/// The receiver is joined first so no new envelopes enter the queue; the
/// processor then drains whatever is left and exits when the channel
/// closes.
pub(crate) struct TaskGroup {
    name: &'static str,
    handles: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl TaskGroup {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            handles: Vec::new(),
        }
    }

    fn push(&mut self, handle: JoinHandle<anyhow::Result<()>>) {
        self.handles.push(handle);
    }

    /// Join every task in the group; the first failure wins.
    async fn wait(self) -> RuntimeResult<()> {
        for handle in self.handles {
            handle
                .await
                .map_err(|e| {
                    StructError::from(RuntimeReason::Shutdown)
                        .with_detail(format!("join failed: {e}"))
                })?
                .owe(RuntimeReason::Shutdown)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reactor — bootstrap, run, graceful stop
// ---------------------------------------------------------------------------

/// Top-level handle over the rules runtime.
///
/// [`wait`](Self::wait) joins the task groups back-to-front: the receiver
/// stops accepting first, its connections close and drop their channel
/// handles, and the processor task drains the queued envelopes before the
/// reactor stops.
pub struct Reactor {
    cancel: CancellationToken,
    groups: Vec<TaskGroup>,
    listen_addr: SocketAddr,
    store: Arc<MemoryStore>,
}

impl Reactor {
    /// Bootstrap the entire runtime from a [`RulesConfig`] and a base
    /// directory (for resolving relative seed/journal paths).
    #[tracing::instrument(name = "reactor.start", skip_all, fields(listen = %config.server.listen))]
    pub async fn start(config: RulesConfig, base_dir: &Path) -> RuntimeResult<Self> {
        let mut op = op_context!("reactor-bootstrap").with_auto_log();
        op.record("listen", config.server.listen.as_str());
        op.record("base_dir", base_dir.display().to_string().as_str());

        let cancel = CancellationToken::new();

        // Phase 1: store + processor construction
        let store = Arc::new(build_store(&config, base_dir)?);
        let processor = EventProcessor::new(
            &config,
            Arc::clone(&store) as Arc<dyn wr_core::WorkItemStore>,
            Arc::new(TracingObserver),
        )
        .err_conv()?;
        wr_info!(
            sys,
            rules = config.rules.len(),
            policies = config.policies.len(),
            backend = %processor.engine_kind(),
            "reactor bootstrap complete"
        );

        // Phase 2: spawn task groups (start order: processor → receiver)
        let (event_tx, event_rx) = mpsc::channel::<EventEnvelope>(config.server.queue_capacity);
        let mut groups: Vec<TaskGroup> = Vec::with_capacity(2);

        groups.push(spawn_processor_task(event_rx, processor));

        let (listen_addr, receiver_group) =
            spawn_receiver_task(&config, event_tx, cancel.clone()).await?;
        groups.push(receiver_group);

        op.mark_suc();
        Ok(Self {
            cancel,
            groups,
            listen_addr,
            store,
        })
    }

    /// Returns the local address the reactor is listening on.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// Returns a handle to the backing store, mainly for inspection in
    /// tests and the replay tooling.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Ask every task to stop.
    pub fn shutdown(&self) {
        wr_info!(sys, "shutdown requested");
        self.cancel.cancel();
    }

    /// Block until every task group has finished, receiver before
    /// processor. Joining the receiver first guarantees every connection
    /// task has dropped its sender, so the processor sees the channel
    /// close only after the queue holds everything that will ever arrive.
    pub async fn wait(mut self) -> RuntimeResult<()> {
        while let Some(group) = self.groups.pop() {
            let name = group.name;
            wr_debug!(sys, task_group = name, "waiting for task group to finish");
            group.wait().await?;
            wr_debug!(sys, task_group = name, "task group finished");
        }
        Ok(())
    }

    /// Clone of the root cancellation token, for wiring up signal handlers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

// ---------------------------------------------------------------------------
// Bootstrap helpers
// ---------------------------------------------------------------------------

fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Build the in-memory store, opening the journal and loading the seed
/// when the config asks for them. Relative paths land next to the config
/// file rather than relative to CWD.
fn build_store(config: &RulesConfig, base_dir: &Path) -> RuntimeResult<MemoryStore> {
    let mut op = op_context!("build-store").with_auto_log();

    let store = match &config.store.journal {
        Some(journal) => {
            let path = resolve_path(journal, base_dir);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).owe_sys()?;
            }
            op.record("journal", path.display().to_string().as_str());
            let store = MemoryStore::with_journal(&path).owe_conf()?;
            wr_debug!(store, path = %path.display(), "journal opened");
            store
        }
        None => MemoryStore::new(),
    };

    if let Some(seed) = &config.store.seed {
        let path = resolve_path(seed, base_dir);
        let count = store
            .load_seed(&path)
            .owe(RuntimeReason::Bootstrap)
            .position(path.display().to_string())?;
        op.record("seed_items", count.to_string().as_str());
        wr_info!(store, file = %path.display(), items = count, "seed loaded");
    }

    op.mark_suc();
    Ok(store)
}

/// Spawn the envelope consumer task. Returns its task group.
fn spawn_processor_task(
    event_rx: mpsc::Receiver<EventEnvelope>,
    processor: EventProcessor,
) -> TaskGroup {
    let mut group = TaskGroup::new("processor");
    group.push(tokio::spawn(async move {
        run_processor_task(event_rx, processor).await
    }));
    group
}

/// Bind the listener and spawn the receiver task, reporting the bound
/// address.
async fn spawn_receiver_task(
    config: &RulesConfig,
    event_tx: mpsc::Sender<EventEnvelope>,
    cancel: CancellationToken,
) -> RuntimeResult<(SocketAddr, TaskGroup)> {
    let receiver = Receiver::bind(&config.server.listen, event_tx)
        .await
        .owe_sys()?;
    let listen_addr = receiver.local_addr().owe_sys()?;
    let receiver_cancel = receiver.cancel_token();
    tokio::spawn(async move {
        cancel.cancelled().await;
        receiver_cancel.cancel();
    });
    let mut group = TaskGroup::new("receiver");
    group.push(tokio::spawn(async move { receiver.run().await }));
    Ok((listen_addr, group))
}

/// Register Ctrl-C (SIGINT) and SIGTERM handling; cancel the reactor on
/// first signal received.
pub async fn wait_for_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler install failed");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                wr_info!(sys, signal = "SIGINT", "signal received, shutting down");
            }
            _ = sigterm.recv() => {
                wr_info!(sys, signal = "SIGTERM", "signal received, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Ctrl-C handler install failed");
        wr_info!(sys, "signal received, shutting down");
    }
    cancel.cancel();
}
