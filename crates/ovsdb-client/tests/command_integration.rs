//! Command building and execution against an in-memory database.

use ovsdb_client::{
    CommandObserver, Condition, Function, Mutation, Mutator, OvsdbError, RowCache, SnapshotFeed,
    TableUpdates,
};
use ovsdb_test::{global_row, northbound, string_map, FakeOvsdb, NB_DATABASE, NB_GLOBAL};
use ovsdb_types::{Atom, Columns, Uuid, Value};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingObserver {
    samples: Mutex<Vec<(String, bool)>>,
}

impl CommandObserver for RecordingObserver {
    fn observe_command(&self, command: &str, _elapsed: Duration, succeeded: bool) {
        self.samples.lock().push((command.to_string(), succeeded));
    }
}

fn options_row(pairs: &[(&str, &str)]) -> Columns {
    let mut row = Columns::new();
    row.insert("options".to_string(), Value::string_map(&string_map(pairs)));
    row
}

#[tokio::test]
async fn test_building_has_no_side_effects() {
    let (db, uuid) = northbound(&[("a", "1")]);
    let client = db.client([NB_GLOBAL]);

    let update = client
        .update(NB_GLOBAL, vec![Condition::uuid_eq(uuid)], options_row(&[("a", "2")]))
        .unwrap();
    let mutate = client
        .mutate(
            NB_GLOBAL,
            vec![],
            vec![Mutation::new("options", Mutator::Delete, Value::string_set(["a"]))],
        )
        .unwrap();
    assert_eq!(update.len(), 1);
    drop(update);
    drop(mutate);

    assert_eq!(db.transaction_count(), 0);
    assert_eq!(
        db.map_column(NB_GLOBAL, "options").unwrap(),
        string_map(&[("a", "1")])
    );
}

#[tokio::test]
async fn test_empty_command_does_no_io() {
    let (db, _) = northbound(&[]);
    let client = db.client([NB_GLOBAL]);
    db.set_unavailable(true);

    let results = client.command().execute().await.unwrap();
    assert!(results.is_empty());
    assert_eq!(db.transaction_count(), 0);
}

#[tokio::test]
async fn test_unknown_table_fails_at_build_time() {
    let (db, _) = northbound(&[]);
    let client = db.client([NB_GLOBAL]);

    assert!(matches!(
        client.select("Logical_Switch", vec![], None),
        Err(OvsdbError::Schema { .. })
    ));
    assert!(matches!(
        client.insert("", Columns::new()),
        Err(OvsdbError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.mutate(NB_GLOBAL, vec![], vec![]),
        Err(OvsdbError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_extended_command_runs_as_one_transaction() {
    let (db, uuid) = northbound(&[("a", "1")]);
    let client = db.client([NB_GLOBAL]);

    let command = client
        .update(NB_GLOBAL, vec![Condition::uuid_eq(uuid)], options_row(&[("b", "2")]))
        .unwrap()
        .extend(
            client
                .select(
                    NB_GLOBAL,
                    vec![Condition::new("_uuid", Function::Equal, Atom::Uuid(uuid))],
                    Some(vec!["options".to_string()]),
                )
                .unwrap(),
        )
        .unwrap();
    assert_eq!(command.len(), 2);

    let results = command.execute().await.unwrap();
    assert_eq!(db.transaction_count(), 1);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].count, Some(1));

    let rows = results[1].rows.as_ref().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("options").and_then(Value::to_string_map),
        Some(string_map(&[("b", "2")]))
    );
}

#[tokio::test]
async fn test_extend_rejects_another_client() {
    let (nb, _) = northbound(&[]);
    let other = FakeOvsdb::new(NB_DATABASE, [NB_GLOBAL]);

    let first = nb.client([NB_GLOBAL]).select(NB_GLOBAL, vec![], None).unwrap();
    let second = other.client([NB_GLOBAL]).select(NB_GLOBAL, vec![], None).unwrap();

    assert!(matches!(
        first.extend(second),
        Err(OvsdbError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_rejected_transaction_applies_nothing() {
    let (db, uuid) = northbound(&[("a", "1")]);
    let client = db.client([NB_GLOBAL]);

    // The second operation uses a mutator the database rejects.
    let command = client
        .update(NB_GLOBAL, vec![Condition::uuid_eq(uuid)], options_row(&[("a", "2")]))
        .unwrap()
        .extend(
            client
                .mutate(
                    NB_GLOBAL,
                    vec![],
                    vec![Mutation::new("nb_cfg", Mutator::Multiply, Atom::Integer(2))],
                )
                .unwrap(),
        )
        .unwrap();

    let err = command.execute().await.unwrap_err();
    assert!(matches!(err, OvsdbError::TransactionFailed { index: 1, .. }));
    assert!(err.is_retryable());
    assert_eq!(
        db.map_column(NB_GLOBAL, "options").unwrap(),
        string_map(&[("a", "1")])
    );
}

#[tokio::test]
async fn test_transport_failure_is_not_retried() {
    let (db, _) = northbound(&[]);
    let client = db.client([NB_GLOBAL]);
    db.set_unavailable(true);

    let err = client
        .select(NB_GLOBAL, vec![], None)
        .unwrap()
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, OvsdbError::Transport(_)));

    assert_eq!(db.attempt_count(), 1);
    assert_eq!(db.transaction_count(), 0);
}

#[tokio::test]
async fn test_observer_receives_named_samples() {
    let (db, _) = northbound(&[]);
    let observer = Arc::new(RecordingObserver::default());
    let client = db.client([NB_GLOBAL]).observed_by(observer.clone());

    client
        .select(NB_GLOBAL, vec![], None)
        .unwrap()
        .execute()
        .await
        .unwrap();

    db.fail_next_transaction("timed out");
    let _ = client
        .select(NB_GLOBAL, vec![], None)
        .unwrap()
        .named("probe")
        .execute()
        .await;

    client.command().named("empty").execute().await.unwrap();

    assert_eq!(
        *observer.samples.lock(),
        vec![("transact".to_string(), true), ("probe".to_string(), false)]
    );
}

#[tokio::test]
async fn test_execution_does_not_touch_cache() {
    let (db, _) = northbound(&[]);
    let client = db.client([NB_GLOBAL]);
    assert_eq!(client.cache().row_count(NB_GLOBAL).unwrap(), 1);

    client
        .insert(NB_GLOBAL, global_row(&[]))
        .unwrap()
        .execute()
        .await
        .unwrap();
    assert_eq!(db.rows(NB_GLOBAL).len(), 2);
    assert_eq!(client.cache().row_count(NB_GLOBAL).unwrap(), 1);

    let feed = SnapshotFeed::new(client.clone(), Duration::from_secs(5));
    assert_eq!(feed.refresh().await.unwrap(), 2);
    assert_eq!(client.cache().row_count(NB_GLOBAL).unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_feed_stops_on_cancel() {
    let db = FakeOvsdb::new(NB_DATABASE, [NB_GLOBAL]);
    let client = db.client([NB_GLOBAL]);
    let cancel = CancellationToken::new();

    let handle = SnapshotFeed::new(client.clone(), Duration::from_secs(5)).spawn(cancel.clone());

    tokio::time::sleep(Duration::from_secs(1)).await;
    db.insert_row(NB_GLOBAL, global_row(&[]));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(client.cache().row_count(NB_GLOBAL).unwrap(), 1);

    cancel.cancel();
    handle.await.unwrap();
    let count = db.transaction_count();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(db.transaction_count(), count);
}

#[tokio::test]
async fn test_snapshot_feed_refreshes_all_tables_together() {
    let db = FakeOvsdb::new(NB_DATABASE, [NB_GLOBAL, "Logical_Switch"]);
    db.insert_row(NB_GLOBAL, global_row(&[]));
    db.insert_row("Logical_Switch", Columns::new());
    db.insert_row("Logical_Switch", Columns::new());
    let cache = Arc::new(RowCache::new([NB_GLOBAL, "Logical_Switch"]));
    let client = ovsdb_client::OvsdbClient::new(NB_DATABASE, cache, db.clone());

    let feed = SnapshotFeed::new(client.clone(), Duration::from_secs(5));
    assert_eq!(feed.refresh().await.unwrap(), 3);
    assert_eq!(db.transaction_count(), 1);
    assert_eq!(client.cache().row_count(NB_GLOBAL).unwrap(), 1);
    assert_eq!(client.cache().row_count("Logical_Switch").unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_feed_with_zero_interval_exits() {
    let (db, _) = northbound(&[]);
    let client = db.client([NB_GLOBAL]);

    SnapshotFeed::new(client, Duration::ZERO)
        .spawn(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(db.attempt_count(), 0);
}

#[test]
fn test_readers_never_see_partial_batches() {
    let cache = Arc::new(RowCache::new(["NB_Global"]));
    let rows: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();

    let generation = |n: i64| {
        let mut columns = Columns::new();
        columns.insert("nb_cfg".to_string(), Value::Atom(Atom::Integer(n)));
        columns
    };
    let batch = |n: i64, insert: bool| {
        rows.iter().fold(TableUpdates::new(), |updates, uuid| {
            if insert {
                updates.insert("NB_Global", *uuid, generation(n))
            } else {
                updates.modify("NB_Global", *uuid, generation(n))
            }
        })
    };
    cache.apply(&batch(0, true));

    let batches: Vec<TableUpdates> = (1..=1000).map(|n| batch(n, false)).collect();
    let writer = {
        let cache = Arc::clone(&cache);
        std::thread::spawn(move || {
            for updates in &batches {
                cache.apply(updates);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let generations: Vec<_> = cache
                        .rows("NB_Global")
                        .unwrap()
                        .iter()
                        .map(|row| row.get("nb_cfg").and_then(|v| v.as_atom()?.as_i64()))
                        .collect();
                    assert_eq!(generations.len(), 8);
                    assert!(generations.windows(2).all(|w| w[0] == w[1]));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    for row in cache.rows("NB_Global").unwrap() {
        assert_eq!(row.get("nb_cfg"), Some(&Value::Atom(Atom::Integer(1000))));
    }
}
