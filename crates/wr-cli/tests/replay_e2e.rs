use std::io::BufReader;
use std::sync::Arc;

use wr_cli::cmd_replay::replay_events;
use wr_config::RulesConfig;
use wr_core::{FieldValue, MemoryStore, WorkItem, WorkItemId};

const CONFIG: &str = r#"
[engine]
language = "calc"

[server]
listen = "tcp://127.0.0.1:0"

[[rule]]
name = "estimate-bump"
script = "estimate = estimate + 1"

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

fn config() -> RulesConfig {
    CONFIG.parse().expect("config must parse")
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    let item: WorkItem = serde_json::from_str(
        r#"{"id":7,"kind":"task","project":"website","fields":{"title":"Login page","estimate":2.0},"rev":0}"#,
    )
    .expect("seed item must parse");
    store.insert(item);
    Arc::new(store)
}

fn envelope(id: u64, project: &str, change: &str) -> String {
    format!(
        r#"{{"collection":"DefaultCollection","project":"{project}","item_id":{id},"change":"{change}"}}"#
    )
}

#[test]
fn replay_applies_matching_events() {
    let store = seeded_store();
    let input = format!(
        "{}\n{}\n{}\n",
        envelope(7, "website", "updated"),
        envelope(7, "website", "updated"),
        envelope(7, "website", "updated"),
    );
    let reader = BufReader::new(input.as_bytes());

    let result =
        replay_events(&config(), Arc::clone(&store), reader).expect("replay should succeed");

    assert_eq!(result.events, 3);
    assert_eq!(result.applied, 3);
    assert_eq!(result.no_op, 0);
    assert_eq!(result.failed, 0);
    assert_eq!(result.outcomes.len(), 3);
    assert!(result.outcomes.iter().all(|o| o.status_code == 0));
    assert_eq!(result.outcomes[0].item_id, WorkItemId(7));
    assert_eq!(result.outcomes[0].status_message, "Success");

    // Each event bumped the estimate and committed a revision.
    let item = store.snapshot(WorkItemId(7)).expect("item 7 must exist");
    assert_eq!(item.field("estimate"), Some(&FieldValue::Number(5.0)));
    assert_eq!(item.rev, 3);
}

#[test]
fn replay_counts_events_outside_every_policy_scope() {
    let store = seeded_store();
    let input = format!(
        "{}\n{}\n",
        envelope(7, "api", "updated"),
        envelope(7, "website", "deleted"),
    );
    let reader = BufReader::new(input.as_bytes());

    let result =
        replay_events(&config(), Arc::clone(&store), reader).expect("replay should succeed");

    assert_eq!(result.events, 2);
    assert_eq!(result.applied, 0);
    assert_eq!(result.no_op, 2);
    assert_eq!(result.failed, 0);
    assert!(result.outcomes.iter().all(|o| o.status_code == 1));
    assert!(
        result
            .outcomes
            .iter()
            .all(|o| o.status_message == "No operation")
    );

    let item = store.snapshot(WorkItemId(7)).expect("item 7 must exist");
    assert_eq!(item.field("estimate"), Some(&FieldValue::Number(2.0)));
    assert_eq!(item.rev, 0);
}

#[test]
fn replay_skips_undecodable_lines() {
    let store = seeded_store();
    let input = format!("not an envelope\n\n{}\n", envelope(7, "website", "updated"));
    let reader = BufReader::new(input.as_bytes());

    let result = replay_events(&config(), store, reader).expect("replay should succeed");

    assert_eq!(result.events, 1);
    assert_eq!(result.applied, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.outcomes.len(), 1);
}

#[test]
fn replay_records_processing_failures_and_continues() {
    let store = seeded_store();
    // Item 999 is not in the store, so its event fails in the load phase;
    // the event behind it must still apply.
    let input = format!(
        "{}\n{}\n",
        envelope(999, "website", "updated"),
        envelope(7, "website", "updated"),
    );
    let reader = BufReader::new(input.as_bytes());

    let result =
        replay_events(&config(), Arc::clone(&store), reader).expect("replay should succeed");

    assert_eq!(result.events, 2);
    assert_eq!(result.applied, 1);
    assert_eq!(result.no_op, 0);
    assert_eq!(result.failed, 1);
    assert_eq!(result.outcomes.len(), 1);
    assert_eq!(result.outcomes[0].item_id, WorkItemId(7));

    let item = store.snapshot(WorkItemId(7)).expect("item 7 must exist");
    assert_eq!(item.field("estimate"), Some(&FieldValue::Number(3.0)));
}
