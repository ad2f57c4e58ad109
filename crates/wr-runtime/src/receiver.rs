use std::io;
use std::net::SocketAddr;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wr_core::{ChangeKind, Notification, RequestContext, WorkItemId};

/// Wire form of one change notification, one JSON object per line.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub collection: String,
    pub project: String,
    pub item_id: WorkItemId,
    pub change: ChangeKind,
}

impl EventEnvelope {
    /// Split into the engine's per-invocation inputs.
    pub fn split(self) -> (RequestContext, Notification) {
        let notification = Notification::new(self.item_id, self.change);
        (
            RequestContext::new(self.collection, self.project),
            notification,
        )
    }
}

/// TCP receiver that accepts connections, reads newline-delimited JSON
/// event envelopes, and forwards them into the processing channel.
///
/// A line that fails to parse is logged and skipped; the connection stays
/// up so one bad event never takes a source offline.
pub struct Receiver {
    listener: TcpListener,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<EventEnvelope>,
}

impl Receiver {
    /// Bind a TCP listener from a `"tcp://host:port"` address string.
    pub async fn bind(
        listen: &str,
        event_tx: mpsc::Sender<EventEnvelope>,
    ) -> anyhow::Result<Self> {
        let addr = listen.strip_prefix("tcp://").unwrap_or(listen);
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            cancel: CancellationToken::new(),
            event_tx,
        })
    }

    /// Actual bound address, useful after binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops the accept loop and every open connection.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Accept connections until the cancellation token fires.
    #[tracing::instrument(name = "receiver", skip_all)]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = result?;
                    wr_debug!(conn, peer = %peer, "accepted connection");
                    let cancel = self.cancel.child_token();
                    let event_tx = self.event_tx.clone();
                    tokio::spawn(handle_connection(stream, cancel, peer, event_tx));
                }
                _ = self.cancel.cancelled() => break,
            }
        }
        Ok(())
    }
}

#[tracing::instrument(skip_all, fields(peer = %peer))]
async fn handle_connection(
    stream: TcpStream,
    cancel: CancellationToken,
    peer: SocketAddr,
    event_tx: mpsc::Sender<EventEnvelope>,
) {
    let (reader, _writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    loop {
        line.clear();
        tokio::select! {
            result = reader.read_line(&mut line) => {
                match result {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<EventEnvelope>(trimmed) {
                            Ok(envelope) => {
                                wr_trace!(conn, item_id = %envelope.item_id, "envelope decoded");
                                if event_tx.send(envelope).await.is_err() {
                                    wr_warn!(conn, peer = %peer, "event channel closed, dropping connection");
                                    break;
                                }
                            }
                            Err(e) => wr_warn!(conn, error = %e, "envelope decode error"),
                        }
                    }
                    Err(e) => {
                        wr_warn!(conn, error = %e, "connection read error");
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
    wr_debug!(conn, peer = %peer, "connection closed");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
