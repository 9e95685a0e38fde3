//! Tests for badge counters (level semantics, error retention, disposal)

use admin_notify::source::ChangeKind;
use admin_notify::{
    BadgeAggregator, BadgeDefinition, DataSource, DocChange, Document, Fields, Filter,
    MemorySource, Query, RawSnapshot, SnapshotCallback, SourceEvent, Subscription,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn fields(value: serde_json::Value) -> Fields {
    let serde_json::Value::Object(map) = value else {
        panic!("fields must be an object");
    };
    map
}

/// A data source whose snapshots are injected by the test, so counter
/// sequences can be asserted exactly.
#[derive(Clone, Default)]
struct ScriptedSource {
    subscribers: Arc<Mutex<Vec<(Subscription, Arc<Mutex<SnapshotCallback>>)>>>,
}

impl ScriptedSource {
    fn push_snapshot_of_size(&self, collection: &str, size: usize) {
        let docs: Vec<Document> = (0..size)
            .map(|i| Document::new(format!("d{i}"), Fields::new()))
            .collect();
        let snapshot = RawSnapshot {
            collection: collection.to_string(),
            docs: docs.clone(),
            changes: docs
                .into_iter()
                .map(|doc| DocChange {
                    kind: ChangeKind::Added,
                    doc,
                })
                .collect(),
        };

        let subscribers = self.subscribers.lock().unwrap().clone();
        for (subscription, callback) in subscribers {
            if !subscription.is_disposed() {
                let mut callback = callback.lock().unwrap();
                (*callback)(SourceEvent::Snapshot(snapshot.clone()));
            }
        }
    }
}

impl DataSource for ScriptedSource {
    fn subscribe(&self, _query: Query, callback: SnapshotCallback) -> Subscription {
        let subscription = Subscription::new();
        self.subscribers
            .lock()
            .unwrap()
            .push((subscription.clone(), Arc::new(Mutex::new(callback))));
        subscription
    }
}

#[test]
fn test_counter_follows_injected_snapshot_sizes_exactly() {
    // The counter always equals the size of the most recent snapshot.
    // Inject sizes 0, 3, 1, 5 and assert the observed sequence matches.
    let source = ScriptedSource::default();
    let badges = BadgeAggregator::watch(
        &source,
        vec![BadgeDefinition::total("applications", "applications")],
    );

    let mut observed = Vec::new();
    for size in [0usize, 3, 1, 5] {
        source.push_snapshot_of_size("applications", size);
        observed.push(badges.count("applications").unwrap());
    }

    assert_eq!(observed, vec![0, 3, 1, 5]);
}

#[test]
fn test_counter_is_a_level_not_an_accumulator() {
    let source = MemorySource::new();
    source.add_document(
        "messages",
        Document::new("m1", fields(json!({"status": "unread"}))),
    );

    let badges = BadgeAggregator::watch(
        &source,
        vec![BadgeDefinition::filtered(
            "unread_messages",
            "messages",
            Filter::eq("status", "unread"),
        )],
    );
    assert_eq!(badges.count("unread_messages"), Some(1));

    // marking read pulls the document out of the filter -> level drops
    source.update_document("messages", "m1", fields(json!({"status": "read"})));
    assert_eq!(badges.count("unread_messages"), Some(0));

    // and a fresh unread message raises it again
    source.add_document(
        "messages",
        Document::new("m2", fields(json!({"status": "unread"}))),
    );
    assert_eq!(badges.count("unread_messages"), Some(1));
}

#[test]
fn test_disposed_aggregator_ignores_injected_snapshots() {
    // Disposing prevents counter updates even for snapshots injected
    // immediately after disposal.
    let source = ScriptedSource::default();
    let badges = BadgeAggregator::watch(&source, vec![BadgeDefinition::total("jobs", "jobs")]);

    source.push_snapshot_of_size("jobs", 4);
    assert_eq!(badges.count("jobs"), Some(4));

    badges.dispose();
    source.push_snapshot_of_size("jobs", 9);
    assert_eq!(badges.count("jobs"), Some(4)); // frozen at last value
}

#[test]
fn test_subscription_failure_keeps_last_value() {
    let source = MemorySource::new();
    source.add_document("jobs", Document::new("j1", fields(json!({}))));

    // healthy subscription first
    let badges = BadgeAggregator::watch(&source, vec![BadgeDefinition::total("jobs", "jobs")]);
    assert_eq!(badges.count("jobs"), Some(1));

    // a denied collection elsewhere never zeroes an existing counter
    source.deny_collection("applications");
    let more = BadgeAggregator::watch(
        &source,
        vec![
            BadgeDefinition::total("jobs", "jobs"),
            BadgeDefinition::total("applications", "applications"),
        ],
    );
    assert_eq!(more.count("jobs"), Some(1));
    assert_eq!(more.count("applications"), Some(0)); // never updated, not missing
}

#[test]
fn test_independent_counters_over_one_collection() {
    let source = MemorySource::new();
    source.add_document(
        "messages",
        Document::new("m1", fields(json!({"status": "unread"}))),
    );
    source.add_document(
        "messages",
        Document::new("m2", fields(json!({"status": "read"}))),
    );

    let badges = BadgeAggregator::watch(
        &source,
        vec![
            BadgeDefinition::total("messages", "messages"),
            BadgeDefinition::filtered(
                "unread_messages",
                "messages",
                Filter::eq("status", "unread"),
            ),
        ],
    );

    assert_eq!(badges.count("messages"), Some(2));
    assert_eq!(badges.count("unread_messages"), Some(1));
}
