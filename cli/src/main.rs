mod cli;

use std::time::Duration;

use clap::Parser;
use cli::Cli;
use engine::{Engine, EngineOptions, MutationFailure, MutationSnapshot};
use serde_json::Value;
use std::sync::Arc;
use store::MemoryStore;
use tracing::info;

/// Walks `path` (dot-separated) from `root`, creating missing object keys
/// along the way, and overwrites whatever sits at the end with `value`.
fn set_at_path(root: &mut Value, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current[segment] = value;
            return;
        }
        current = &mut current[segment];
    }
}

fn on_queue_change(snapshots: Vec<MutationSnapshot>) {
    info!(count = snapshots.len(), "queue changed");
}

fn on_mutation_success(snapshot: MutationSnapshot) {
    println!("mutation {} succeeded", snapshot.id);
}

fn on_mutation_error(snapshot: MutationSnapshot, failure: MutationFailure) {
    println!("mutation {} rolled back: {failure}", snapshot.id);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::init_tracing("cli");

    let cli = Cli::parse();
    let initial: Value = serde_json::from_str(&cli.initial)?;
    let value: Value = serde_json::from_str(&cli.value)?;

    println!("initial: {initial}");
    let store = MemoryStore::new(initial);

    let options = EngineOptions {
        max_retries: cli.max_retries,
        on_mutation_success: Arc::new(on_mutation_success),
        on_mutation_error: Arc::new(on_mutation_error),
        on_queue_change: Arc::new(on_queue_change),
    };
    let engine = Engine::new(options);

    let path = cli.path.clone();
    let mut tx = engine.create_transaction("cli-demo", Some(store.clone()));
    tx.set_default(move |v| set_at_path(v, &path, value))?;

    let should_fail = cli.fail;
    tx.assign_mutation(move || async move {
        if should_fail {
            anyhow::bail!("demo remote rejected the mutation");
        }
        anyhow::Ok(())
    });
    tx.commit()?;

    println!("optimistic: {}", store.read());

    while engine.queue().has_pending() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!("final: {}", store.read());
    Ok(())
}
