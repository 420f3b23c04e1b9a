use std::sync::Arc;
use std::time::Duration;

use engine::{Engine, EngineOptions, MutationSnapshot, MutationStatus};
use serde_json::json;
use store::MemoryStore;
use tokio::sync::mpsc;
use tokio::test;

enum Event {
    Success(MutationSnapshot),
    Error(MutationSnapshot, String),
}

fn engine_with_channel(max_retries: u32) -> (Engine, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let tx_success = tx.clone();
    let options = EngineOptions {
        max_retries,
        on_mutation_success: Arc::new(move |snapshot| {
            let _ = tx_success.send(Event::Success(snapshot));
        }),
        on_mutation_error: Arc::new(move |snapshot, failure| {
            let _ = tx.send(Event::Error(snapshot, failure.to_string()));
        }),
        ..Default::default()
    };
    (Engine::new(options), rx)
}

async fn expect_success(events: &mut mpsc::UnboundedReceiver<Event>) -> MutationSnapshot {
    match events.recv().await.expect("channel closed before an event arrived") {
        Event::Success(snapshot) => snapshot,
        Event::Error(_, reason) => panic!("expected success, got error: {reason}"),
    }
}

async fn expect_error(events: &mut mpsc::UnboundedReceiver<Event>) -> (MutationSnapshot, String) {
    match events.recv().await.expect("channel closed before an event arrived") {
        Event::Error(snapshot, reason) => (snapshot, reason),
        Event::Success(_) => panic!("expected error, got success"),
    }
}

fn initial_board() -> serde_json::Value {
    json!({"tasks": {"t1": {"title": "A", "status": "todo"}}})
}

/// S1 — success path.
#[test]
async fn commit_resolves_and_updates_store() -> anyhow::Result<()> {
    let store = MemoryStore::new(initial_board());
    let (engine, mut events) = engine_with_channel(0);

    let mut tx = engine.create_transaction("rename", Some(store.clone()));
    tx.set_default(|v| v["tasks"]["t1"]["title"] = json!("B"))?;
    tx.assign_mutation(|| async { anyhow::Ok(()) });
    tx.commit()?;

    let snapshot = expect_success(&mut events).await;
    assert_eq!(snapshot.status, MutationStatus::Success);

    assert_eq!(
        store.read(),
        json!({"tasks": {"t1": {"title": "B", "status": "todo"}}})
    );
    assert_eq!(engine.queue().history().len(), 1);
    assert!(!engine.queue().has_pending());
    Ok(())
}

/// S2 — single failure.
#[test]
async fn rejected_remote_rolls_back_the_store() -> anyhow::Result<()> {
    let store = MemoryStore::new(initial_board());
    let (engine, mut events) = engine_with_channel(0);

    let mut tx = engine.create_transaction("rename", Some(store.clone()));
    tx.set_default(|v| v["tasks"]["t1"]["title"] = json!("B"))?;
    tx.assign_mutation(|| async { anyhow::bail!("E") });
    tx.commit()?;

    let (snapshot, reason) = expect_error(&mut events).await;
    assert_eq!(snapshot.status, MutationStatus::RolledBack);
    assert!(reason.contains('E'));

    assert_eq!(store.read(), initial_board());
    assert!(!engine.queue().has_pending());
    let history = engine.queue().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, MutationStatus::RolledBack);
    Ok(())
}

/// S3 — concurrent, non-conflicting mutations: one fails, the other sticks.
#[test]
async fn non_conflicting_mutations_resolve_independently() -> anyhow::Result<()> {
    let board = json!({
        "tasks": {
            "t1": {"title": "A", "status": "todo"},
            "t2": {"title": "X", "status": "todo"},
        }
    });
    let store = MemoryStore::new(board);
    let (engine, mut events) = engine_with_channel(0);

    let mut m1 = engine.create_transaction("edit-t1", Some(store.clone()));
    m1.set_default(|v| v["tasks"]["t1"]["title"] = json!("B"))?;
    m1.assign_mutation(|| async { anyhow::bail!("E") });
    m1.commit()?;

    let mut m2 = engine.create_transaction("edit-t2", Some(store.clone()));
    m2.set_default(|v| v["tasks"]["t2"]["title"] = json!("Y"))?;
    m2.assign_mutation(|| async { anyhow::Ok(()) });
    m2.commit()?;

    let mut saw_success = false;
    let mut saw_error = false;
    for _ in 0..2 {
        match events.recv().await.expect("event") {
            Event::Success(snapshot) => {
                assert_eq!(snapshot.status, MutationStatus::Success);
                saw_success = true;
            }
            Event::Error(snapshot, _) => {
                assert_eq!(snapshot.status, MutationStatus::RolledBack);
                saw_error = true;
            }
        }
    }
    assert!(saw_success && saw_error);

    assert_eq!(
        store.read(),
        json!({
            "tasks": {
                "t1": {"title": "A", "status": "todo"},
                "t2": {"title": "Y", "status": "todo"},
            }
        })
    );
    assert_eq!(engine.queue().history().len(), 2);
    Ok(())
}

/// S4 — concurrent, conflicting mutations; the later one fails and the
/// earlier one's patches are redone on top of the reconciled state.
#[test]
async fn conflicting_mutations_rebase_the_survivor() -> anyhow::Result<()> {
    let store = MemoryStore::new(initial_board());
    let (engine, mut events) = engine_with_channel(0);

    // m1 resolves, but only after a delay, so it is still live when m2 fails.
    let mut m1 = engine.create_transaction("m1", Some(store.clone()));
    m1.set_default(|v| v["tasks"]["t1"]["title"] = json!("from-m1"))?;
    m1.assign_mutation(|| async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        anyhow::Ok(())
    });
    m1.commit()?;

    let mut m2 = engine.create_transaction("m2", Some(store.clone()));
    m2.set_default(|v| v["tasks"]["t1"]["title"] = json!("from-m2"))?;
    m2.assign_mutation(|| async { anyhow::bail!("E") });
    m2.commit()?;

    let (err_snapshot, _) = expect_error(&mut events).await;
    assert_eq!(err_snapshot.status, MutationStatus::RolledBack);
    // Right after rollback, m1's patches have been redone.
    assert_eq!(store.read()["tasks"]["t1"]["title"], json!("from-m1"));

    let ok_snapshot = expect_success(&mut events).await;
    assert_eq!(ok_snapshot.status, MutationStatus::Success);

    assert_eq!(store.read()["tasks"]["t1"]["title"], json!("from-m1"));
    Ok(())
}

/// S5 — dependent cascade: m2 depends on state only m1 introduced; when m1
/// is rolled back, m2 cannot be rebased and is swept out too.
#[test]
async fn dependent_mutation_cascades_into_rollback() -> anyhow::Result<()> {
    let store = MemoryStore::new(json!({"tasks": {}}));
    let (engine, mut events) = engine_with_channel(0);

    let mut m1 = engine.create_transaction("add-t3", Some(store.clone()));
    m1.set_default(|v| v["tasks"]["t3"] = json!({"title": "C"}))?;
    m1.assign_mutation(|| async { anyhow::bail!("E") });
    m1.commit()?;

    let mut m2 = engine.create_transaction("edit-t3", Some(store.clone()));
    m2.set_default(|v| v["tasks"]["t3"]["title"] = json!("D"))?;
    m2.assign_mutation(|| async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        anyhow::Ok(())
    });
    m2.commit()?;

    let mut rolled_back = 0;
    for _ in 0..2 {
        let (snapshot, _) = expect_error(&mut events).await;
        assert_eq!(snapshot.status, MutationStatus::RolledBack);
        rolled_back += 1;
    }
    assert_eq!(rolled_back, 2);

    assert_eq!(store.read(), json!({"tasks": {}}));
    assert_eq!(engine.queue().history().len(), 2);
    Ok(())
}

/// S6 — cross-store atomicity: a failure rolls both stores back together.
#[test]
async fn cross_store_mutation_rolls_back_every_store() -> anyhow::Result<()> {
    let store_a = MemoryStore::new(json!({"x": 0}));
    let store_b = MemoryStore::new(json!({"y": 0}));
    let (engine, mut events) = engine_with_channel(0);

    let mut tx = engine.create_transaction("cross-store", None);
    tx.set(store_a.clone(), |v| v["x"] = json!(1))?;
    tx.set(store_b.clone(), |v| v["y"] = json!(2))?;
    tx.assign_mutation(|| async { anyhow::bail!("E") });
    tx.commit()?;

    let (snapshot, _) = expect_error(&mut events).await;
    assert_eq!(snapshot.status, MutationStatus::RolledBack);

    assert_eq!(store_a.read(), json!({"x": 0}));
    assert_eq!(store_b.read(), json!({"y": 0}));
    Ok(())
}

/// S7 — a dependent that spans both of its own stores must be rolled back on
/// every one of them together, even when its redo would have succeeded
/// independently on one of those stores. Regression test for a rollback that
/// used to write each store as soon as it was reconciled, before the rest of
/// the failed mutation's stores were known to doom a dependent.
#[test]
async fn dependent_spanning_two_stores_is_rolled_back_on_both() -> anyhow::Result<()> {
    let store_a = MemoryStore::new(json!({"tasks": {}}));
    let store_b = MemoryStore::new(json!({"tasks": {}}));
    let (engine, mut events) = engine_with_channel(0);

    // m1 touches both stores but has nothing to do with m2's edit on store A;
    // on store B it creates the "t3" entry m2 depends on.
    let mut m1 = engine.create_transaction("m1", None);
    m1.set(store_a.clone(), |v| v["tasks"]["shared"] = json!("unrelated"))?;
    m1.set(store_b.clone(), |v| v["tasks"]["t3"] = json!({"title": "C"}))?;
    m1.assign_mutation(|| async { anyhow::bail!("E") });
    m1.commit()?;

    // m2's edit on store A stands on its own; its edit on store B depends on
    // the "t3" entry only m1 introduced.
    let mut m2 = engine.create_transaction("m2", None);
    m2.set(store_a.clone(), |v| v["tasks"]["m2_marker"] = json!("from-m2"))?;
    m2.set(store_b.clone(), |v| v["tasks"]["t3"]["title"] = json!("D"))?;
    m2.assign_mutation(|| async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        anyhow::Ok(())
    });
    m2.commit()?;

    let mut rolled_back = 0;
    for _ in 0..2 {
        let (snapshot, _) = expect_error(&mut events).await;
        assert_eq!(snapshot.status, MutationStatus::RolledBack);
        rolled_back += 1;
    }
    assert_eq!(rolled_back, 2);

    assert_eq!(store_a.read(), json!({"tasks": {}}));
    assert_eq!(store_b.read(), json!({"tasks": {}}));
    Ok(())
}
