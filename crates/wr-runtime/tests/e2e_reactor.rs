//! End-to-end reactor integration tests.
//!
//! Prove the full pipeline: TCP → envelope parse → event queue →
//! processor → store commit → journal line.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};
use wr_config::RulesConfig;
use wr_core::{FieldValue, WorkItemId};
use wr_runtime::lifecycle::Reactor;
use wr_runtime::tracing_init::{FileFieldBuffer, TextFormat};

#[tokio::test]
async fn e2e_event_applies_policy_and_journals() {
    // Write to target/test-artifacts/ for easy post-run inspection.
    let artifact_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../target/test-artifacts/e2e_reactor");
    std::fs::create_dir_all(&artifact_dir).expect("failed to create artifact dir");
    let journal_path = artifact_dir.join("journal.jsonl");
    // Clear any stale output from previous runs.
    let _ = std::fs::remove_file(&journal_path);

    // -- Set up tracing with file output --
    let log_file = artifact_dir.join("e2e_reactor.log");
    let _ = std::fs::remove_file(&log_file);
    let file_appender = tracing_appender::rolling::never(&artifact_dir, "e2e_reactor.log");
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(TextFormat::default())
                .with_test_writer()
                .with_filter(EnvFilter::try_new("info").unwrap()),
        )
        .with(
            fmt::layer()
                .event_format(TextFormat::default())
                .fmt_fields(FileFieldBuffer::default())
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(EnvFilter::try_new("debug").unwrap()),
        )
        .try_init();

    // -- Seed one work item next to the config base dir --
    std::fs::write(
        artifact_dir.join("items.jsonl"),
        r#"{"id":12,"kind":"task","project":"website","fields":{"title":"Checkout flow","estimate":4.0},"rev":3}"#,
    )
    .expect("failed to write seed file");

    let toml_str = r#"
[engine]
language = "calc"

[server]
listen = "tcp://127.0.0.1:0"
queue_capacity = 16

[store]
seed = "items.jsonl"
journal = "journal.jsonl"

[[rule]]
name = "estimate-bump"
script = "estimate = estimate * 2"

[rule.scope]
item_types = ["task"]
has_fields = ["estimate"]

[[policy]]
name = "website"
rules = ["estimate-bump"]

[policy.scope]
projects = ["website"]
changes = ["updated"]
"#;

    let config: RulesConfig = toml_str.parse().expect("failed to parse config TOML");

    // -- Start reactor --
    let reactor = Reactor::start(config, &artifact_dir)
        .await
        .expect("Reactor::start failed");
    let addr = reactor.listen_addr();
    let store = reactor.store();

    // -- Connect TCP and send one change notification --
    let mut stream = TcpStream::connect(addr).await.expect("TCP connect failed");
    stream
        .write_all(
            b"{\"collection\":\"DefaultCollection\",\"project\":\"website\",\"item_id\":12,\"change\":\"updated\"}\n",
        )
        .await
        .expect("TCP write failed");
    stream.flush().await.expect("TCP flush failed");

    // Actual latency is <10ms; 200ms gives ample margin for slow CI.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // -- Shutdown (drains the queue before the processor exits) --
    reactor.shutdown();
    // Drop the TCP stream so the connection task releases its sender.
    drop(stream);
    reactor.wait().await.expect("reactor.wait failed");

    // -- Verify store state --
    let item = store
        .snapshot(WorkItemId(12))
        .expect("item 12 missing from store");
    assert_eq!(item.field("estimate"), Some(&FieldValue::Number(8.0)));
    assert_eq!(item.rev, 4);

    // -- Verify journal output --
    let journal = std::fs::read_to_string(&journal_path)
        .unwrap_or_else(|e| panic!("failed to read journal {}: {e}", journal_path.display()));
    let lines: Vec<&str> = journal.lines().collect();
    assert_eq!(
        lines.len(),
        1,
        "expected exactly 1 journal line, got {}. Full journal:\n{journal}",
        lines.len()
    );
    let entry: serde_json::Value =
        serde_json::from_str(lines[0]).expect("failed to parse journal JSON");
    assert_eq!(entry["id"].as_u64().unwrap(), 12, "unexpected id: {entry}");
    assert_eq!(entry["rev"].as_u64().unwrap(), 4, "unexpected rev: {entry}");
    assert_eq!(
        entry["fields"]["estimate"].as_f64().unwrap(),
        8.0,
        "unexpected estimate: {entry}"
    );
}

#[tokio::test]
async fn e2e_bad_input_does_not_stall_the_stream() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    std::fs::write(
        dir.path().join("items.jsonl"),
        r#"{"id":1,"kind":"bug","project":"api","fields":{"title":"Crash on save","triaged":false},"rev":0}"#,
    )
    .expect("failed to write seed file");

    let toml_str = r#"
[engine]
language = "patch"

[server]
listen = "tcp://127.0.0.1:0"

[store]
seed = "items.jsonl"

[[rule]]
name = "mark-triaged"
script = '[{"op": "set", "field": "triaged", "value": true}]'

[[policy]]
name = "all-bugs"
rules = ["mark-triaged"]
"#;

    let config: RulesConfig = toml_str.parse().expect("failed to parse config TOML");
    let reactor = Reactor::start(config, dir.path())
        .await
        .expect("Reactor::start failed");
    let addr = reactor.listen_addr();
    let store = reactor.store();

    // A garbage line first; the valid envelope behind it must still land.
    let mut stream = TcpStream::connect(addr).await.expect("TCP connect failed");
    stream
        .write_all(
            b"definitely not an envelope\n{\"collection\":\"c\",\"project\":\"api\",\"item_id\":1,\"change\":\"updated\"}\n",
        )
        .await
        .expect("TCP write failed");
    stream.flush().await.expect("TCP flush failed");

    tokio::time::sleep(Duration::from_millis(200)).await;

    reactor.shutdown();
    drop(stream);
    reactor.wait().await.expect("reactor.wait failed");

    let item = store.snapshot(WorkItemId(1)).expect("item 1 missing");
    assert_eq!(item.field("triaged"), Some(&FieldValue::Bool(true)));
    assert_eq!(item.rev, 1);
}

#[tokio::test]
async fn e2e_shutdown_without_traffic_is_clean() {
    let dir = tempfile::tempdir().expect("tempdir failed");

    let toml_str = r#"
[server]
listen = "tcp://127.0.0.1:0"

[[rule]]
name = "touch"
script = "item.fields.touched = true;"

[[policy]]
name = "everything"
rules = ["touch"]
"#;

    let config: RulesConfig = toml_str.parse().expect("failed to parse config TOML");
    let reactor = Reactor::start(config, dir.path())
        .await
        .expect("Reactor::start failed");
    let store = reactor.store();

    reactor.shutdown();
    reactor.wait().await.expect("reactor.wait failed");
    assert!(store.is_empty(), "no seed, no traffic, store must stay empty");
}
