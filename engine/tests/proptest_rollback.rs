use std::sync::Arc;

use engine::{Engine, EngineOptions};
use proptest::prelude::*;
use serde_json::{Value, json};
use store::MemoryStore;
use tokio::sync::mpsc;

fn arb_writes() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(0i64..1000, 1..6)
}

/// Runs a single mutation that stages `writes` in sequence against a fresh
/// store, rejects it, and returns the store's value once the rollback has
/// been applied.
fn rolled_back_value(original: Value, writes: Vec<i64>) -> Value {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    runtime.block_on(async move {
        let store = MemoryStore::new(original);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let options = EngineOptions {
            on_mutation_error: Arc::new(move |snapshot, _| {
                let _ = tx.send(snapshot);
            }),
            ..Default::default()
        };
        let engine = Engine::new(options);

        let mut txn = engine.create_transaction("prop-rollback", Some(store.clone()));
        for w in writes {
            txn.set_default(move |v| v["counter"] = json!(w))
                .expect("open transaction accepts writes");
        }
        txn.assign_mutation(|| async { anyhow::bail!("rejected") });
        txn.commit().expect("non-empty transaction with a remote commits");

        rx.recv().await.expect("rollback event fires");
        store.read()
    })
}

proptest! {
    /// Invariant 2, property form: no matter how many writes a failing
    /// mutation stages against a single store before commit, a lone
    /// rollback restores the store to exactly its pre-mutation value.
    #[test]
    fn lone_failure_restores_arbitrary_write_sequences(start in 0i64..1000, writes in arb_writes()) {
        let original = json!({"counter": start});
        let restored = rolled_back_value(original.clone(), writes);
        prop_assert_eq!(restored, original);
    }
}
