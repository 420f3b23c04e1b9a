use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use patch::{PatchApplyError, apply_patches};
use serde_json::Value;
use store::{Store, StoreId};
use tracing::{info, instrument, warn};

use crate::engine::EngineOptions;
use crate::error::MutationFailure;
use crate::ids::MutationId;
use crate::mutation::{Mutation, MutationSnapshot, MutationStatus};
use crate::remote::RemoteFn;

/// How many retired mutations (succeeded or rolled back) the queue keeps
/// around for inspection. Oldest entries fall off once full.
const HISTORY_CAPACITY: usize = 20;

struct QueueState {
    live: Vec<Mutation>,
    history: VecDeque<MutationSnapshot>,
    stores: HashMap<StoreId, Store>,
}

impl QueueState {
    fn push_history(&mut self, snapshot: MutationSnapshot) {
        self.history.push_front(snapshot);
        self.history.truncate(HISTORY_CAPACITY);
    }

    fn snapshots(&self) -> Vec<MutationSnapshot> {
        let mut out: Vec<_> = self.live.iter().map(Mutation::snapshot).collect();
        out.extend(self.history.iter().cloned());
        out
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    options: EngineOptions,
}

/// The live queue of in-flight optimistic mutations (§4.D), shared between
/// every [`crate::Transaction`] a given [`crate::Engine`] creates and every
/// dispatch task spawned for them.
///
/// Cloning a `MutationQueue` clones the `Arc`: all clones see the same
/// state, which is exactly what lets dispatch tasks call back into it.
#[derive(Clone)]
pub struct MutationQueue {
    inner: Arc<QueueInner>,
}

enum DispatchOutcome {
    Ignored,
    Success(MutationSnapshot),
    Retry,
    RolledBack {
        failures: Vec<(MutationSnapshot, MutationFailure)>,
    },
}

impl MutationQueue {
    pub(crate) fn new(options: EngineOptions) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    live: Vec::new(),
                    history: VecDeque::new(),
                    stores: HashMap::new(),
                }),
                options,
            }),
        }
    }

    /// True while any mutation is pending or in flight.
    pub fn has_pending(&self) -> bool {
        !self.inner.state.lock().live.is_empty()
    }

    /// Drops every live and historical mutation without rolling anything
    /// back. Dispatch tasks already in flight keep running; their results
    /// are ignored when they land (§9).
    pub fn clear(&self) {
        {
            let mut state = self.inner.state.lock();
            state.live.clear();
            state.history.clear();
        }
        self.notify();
    }

    /// A snapshot of every live mutation, newest enqueued last.
    pub fn live(&self) -> Vec<MutationSnapshot> {
        self.inner.state.lock().live.iter().map(Mutation::snapshot).collect()
    }

    /// Retired mutations, most recent first, capped at [`HISTORY_CAPACITY`].
    pub fn history(&self) -> Vec<MutationSnapshot> {
        self.inner.state.lock().history.iter().cloned().collect()
    }

    pub(crate) fn register_store(&self, store: Store) {
        self.inner.state.lock().stores.entry(store.id()).or_insert(store);
    }

    #[instrument(skip(self, mutation), fields(mutation_id = %mutation.id()))]
    pub(crate) fn enqueue(&self, mutation: Mutation) {
        {
            self.inner.state.lock().live.push(mutation);
        }
        self.notify();
        self.schedule_dispatch();
    }

    fn notify(&self) {
        let snapshots = self.inner.state.lock().snapshots();
        (self.inner.options.on_queue_change)(snapshots);
    }

    fn schedule_dispatch(&self) {
        let to_dispatch: Vec<(MutationId, RemoteFn)> = {
            let mut state = self.inner.state.lock();
            state
                .live
                .iter_mut()
                .filter(|m| m.status == MutationStatus::Pending)
                .map(|m| {
                    m.status = MutationStatus::InFlight;
                    (m.id(), m.remote.clone())
                })
                .collect()
        };

        for (id, remote) in to_dispatch {
            let queue = self.clone();
            tokio::spawn(async move {
                let result = remote().await;
                queue.on_remote_result(id, result).await;
            });
        }
    }

    #[instrument(skip(self, result), fields(mutation_id = %id))]
    async fn on_remote_result(&self, id: MutationId, result: anyhow::Result<()>) {
        let outcome = {
            let mut state = self.inner.state.lock();
            match state.live.iter().position(|m| m.id() == id) {
                None => DispatchOutcome::Ignored,
                Some(idx) => match result {
                    Ok(()) => {
                        let mut mutation = state.live.remove(idx);
                        mutation.status = MutationStatus::Success;
                        let snapshot = mutation.snapshot();
                        state.push_history(snapshot.clone());
                        DispatchOutcome::Success(snapshot)
                    }
                    Err(err) => {
                        if state.live[idx].retry_count < state.live[idx].max_retries {
                            state.live[idx].retry_count += 1;
                            state.live[idx].status = MutationStatus::Pending;
                            DispatchOutcome::Retry
                        } else {
                            state.live[idx].status = MutationStatus::Failed;
                            let failures = perform_rollback(&mut state, idx, err);
                            DispatchOutcome::RolledBack { failures }
                        }
                    }
                },
            }
        };

        match outcome {
            DispatchOutcome::Ignored => {
                warn!("remote result arrived for a mutation no longer in the queue; ignoring");
            }
            DispatchOutcome::Success(snapshot) => {
                info!(mutation_id = %snapshot.id, "mutation succeeded");
                (self.inner.options.on_mutation_success)(snapshot);
                self.notify();
                self.schedule_dispatch();
            }
            DispatchOutcome::Retry => {
                self.notify();
                self.schedule_dispatch();
            }
            DispatchOutcome::RolledBack { failures } => {
                for (snapshot, failure) in failures {
                    warn!(mutation_id = %snapshot.id, %failure, "mutation rolled back");
                    (self.inner.options.on_mutation_error)(snapshot, failure);
                }
                self.notify();
                self.schedule_dispatch();
            }
        }
    }
}

/// Unwinds the mutation at `failed_idx` (marked `failed` by the caller) and
/// rebases every other live mutation on top of the reconciled state, per
/// §4.D steps 1-5:
///
/// 1. `R` = every other live mutation.
/// 2. For every store touched by the failed mutation or any mutation in `R`:
/// 3. Starting from the store's current value, undo `R` newest-first, then
///    undo the failed mutation, then redo `R` oldest-first. A redo that
///    raises [`PatchApplyError`] marks that survivor `failed` too — it
///    depended on state the failed mutation had written. Because a
///    survivor's patches can span more than one of these stores, nothing is
///    actually written back until a full round over every store turns up no
///    new failures; a round that does is re-run with the newly failed
///    survivor's redo skipped everywhere, so its delta is either restored on
///    every store it touched or none of them.
/// 4. Every mutation now marked `failed` (the original plus any dependents)
///    is swept out of the live queue and appended to history as
///    `rolled-back`.
/// 5. Everything else in `R` keeps its `pending`/`in-flight` status,
///    unaffected.
fn perform_rollback(
    state: &mut QueueState,
    failed_idx: usize,
    error: anyhow::Error,
) -> Vec<(MutationSnapshot, MutationFailure)> {
    let failed = state.live.remove(failed_idx);
    let failed_id = failed.id();

    let mut newest_first: Vec<usize> = (0..state.live.len()).collect();
    newest_first.sort_by_key(|&i| std::cmp::Reverse(state.live[i].created_at));

    let mut store_ids: Vec<StoreId> = failed.store_patches.keys().copied().collect();
    for &i in &newest_first {
        for sid in state.live[i].store_patches.keys() {
            if !store_ids.contains(sid) {
                store_ids.push(*sid);
            }
        }
    }

    // A survivor's redo can succeed against one of the failed mutation's
    // stores and only fail against another — but its delta has to land on
    // every store it touched or none of them (§4.D step 3d treats a
    // dependent as failed, not "failed on some stores"). So nothing gets
    // written until one full round over every store agrees on exactly which
    // survivors are unrecoverable; a round that turns up a new failure is
    // discarded and redone with that survivor excluded everywhere.
    let mut dependent_ids: HashSet<MutationId> = HashSet::new();
    let mut dependent_errors: HashMap<MutationId, PatchApplyError> = HashMap::new();

    let writes: Vec<(Store, Value)> = loop {
        let mut found_new = false;
        let mut round_writes = Vec::with_capacity(store_ids.len());

        for sid in &store_ids {
            let Some(store) = state.stores.get(sid).cloned() else {
                continue;
            };
            let mut value = store.read();

            for &i in &newest_first {
                if let Some(sp) = state.live[i].store_patches.get(sid) {
                    value = apply_patches(&value, &sp.inverse)
                        .expect("undoing a live mutation's own previously-applied patches cannot fail");
                }
            }

            if let Some(sp) = failed.store_patches.get(sid) {
                value = apply_patches(&value, &sp.inverse)
                    .expect("undoing the failed mutation's own previously-applied patches cannot fail");
            }

            for &i in newest_first.iter().rev() {
                let mutation_id = state.live[i].id();
                if dependent_ids.contains(&mutation_id) {
                    continue;
                }
                if let Some(sp) = state.live[i].store_patches.get(sid) {
                    match apply_patches(&value, &sp.forward) {
                        Ok(v) => value = v,
                        Err(source) => {
                            dependent_errors.insert(mutation_id, source);
                            dependent_ids.insert(mutation_id);
                            found_new = true;
                        }
                    }
                }
            }

            round_writes.push((store, value));
        }

        if !found_new {
            break round_writes;
        }
    };

    for (store, value) in writes {
        store.write(value);
    }

    for &i in &newest_first {
        if dependent_ids.contains(&state.live[i].id()) {
            state.live[i].status = MutationStatus::Failed;
        }
    }

    let mut failures = Vec::with_capacity(1 + dependent_errors.len());
    let mut failed_snapshot = failed.snapshot();
    failed_snapshot.status = MutationStatus::RolledBack;
    state.push_history(failed_snapshot.clone());
    failures.push((failed_snapshot, MutationFailure::Remote(error)));

    let mut i = 0;
    while i < state.live.len() {
        if state.live[i].status != MutationStatus::Failed {
            i += 1;
            continue;
        }
        let mutation = state.live.remove(i);
        let source = dependent_errors
            .remove(&mutation.id())
            .expect("status only becomes Failed alongside a recorded patch-apply error");
        let mut snapshot = mutation.snapshot();
        snapshot.status = MutationStatus::RolledBack;
        state.push_history(snapshot.clone());
        failures.push((
            snapshot,
            MutationFailure::DependentRollback {
                cause: failed_id,
                source,
            },
        ));
    }

    failures
}
