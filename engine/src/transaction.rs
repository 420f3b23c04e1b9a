use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use store::{Store, StoreId};
use tracing::{instrument, warn};

use crate::error::TransactionError;
use crate::ids::MutationId;
use crate::mutation::{Mutation, StorePatchSet};
use crate::queue::MutationQueue;
use crate::remote::RemoteFn;

struct StagedStore {
    store: Store,
    /// Full merged forward/inverse sequence, in stage order — what ends up
    /// in the mutation record regardless of how each stage was flushed.
    forward: Vec<patch::Patch>,
    inverse: Vec<patch::Patch>,
    /// Suffix of `forward` not yet written through to the store. Non-empty
    /// only while an open `flush: false` chain exists on this store.
    pending_forward: Vec<patch::Patch>,
    /// Cached result of applying `pending_forward` to the store's value;
    /// mirrors `pending_forward`'s emptiness.
    working_value: Option<Value>,
}

/// Builds one mutation: a set of staged writes across one or more stores,
/// bound to the remote call that must succeed for them to be kept (§4.C).
///
/// Writes `set`/`set_deferred` make against a store are visible to readers of
/// that store immediately for `set`, and only once `commit` flushes them for
/// `set_deferred`. Either way the mutation is not queued — and the remote
/// call not fired — until `commit` runs.
pub struct Transaction {
    queue: MutationQueue,
    label: String,
    default_store: Option<Store>,
    staged: HashMap<StoreId, StagedStore>,
    stage_order: Vec<StoreId>,
    remote: Option<RemoteFn>,
    max_retries: u32,
    closed: bool,
}

impl Transaction {
    pub(crate) fn new(
        queue: MutationQueue,
        label: String,
        default_store: Option<Store>,
        max_retries: u32,
    ) -> Self {
        Self {
            queue,
            label,
            default_store,
            staged: HashMap::new(),
            stage_order: Vec::new(),
            remote: None,
            max_retries,
            closed: false,
        }
    }

    /// Stages a write against `store`, applied immediately.
    pub fn set<F>(&mut self, store: Store, recipe: F) -> Result<(), TransactionError>
    where
        F: FnOnce(&mut Value) + Send + 'static,
    {
        self.set_with_options(store, recipe, true)
    }

    /// Stages a write against the transaction's default store (see
    /// [`crate::Engine::create_transaction`]). Errors if none was bound.
    pub fn set_default<F>(&mut self, recipe: F) -> Result<(), TransactionError>
    where
        F: FnOnce(&mut Value) + Send + 'static,
    {
        let store = self
            .default_store
            .clone()
            .ok_or(TransactionError::NoDefaultStore)?;
        self.set(store, recipe)
    }

    /// Stages a write against `store` without writing it through until
    /// `commit`. Later `set`/`set_default` calls on the same store still see
    /// this chain's pending value.
    pub fn set_deferred<F>(&mut self, store: Store, recipe: F) -> Result<(), TransactionError>
    where
        F: FnOnce(&mut Value) + Send + 'static,
    {
        self.set_with_options(store, recipe, false)
    }

    fn set_with_options<F>(
        &mut self,
        store: Store,
        recipe: F,
        flush: bool,
    ) -> Result<(), TransactionError>
    where
        F: FnOnce(&mut Value) + Send + 'static,
    {
        if self.closed {
            return Err(TransactionError::ClosedTransaction);
        }

        let id = store.id();
        let base = match self.staged.get(&id) {
            Some(staged) => staged.working_value.clone().unwrap_or_else(|| store.read()),
            None => store.read(),
        };

        let (next, forward, inverse) = patch::produce_with_patches(&base, recipe);

        if forward.is_empty() {
            // A no-op recipe stages nothing: nothing to merge, nothing to flush.
            return Ok(());
        }

        if !self.staged.contains_key(&id) {
            self.stage_order.push(id);
            self.staged.insert(
                id,
                StagedStore {
                    store: store.clone(),
                    forward: Vec::new(),
                    inverse: Vec::new(),
                    pending_forward: Vec::new(),
                    working_value: None,
                },
            );
        }
        let entry = self.staged.get_mut(&id).expect("just inserted above");
        entry.forward.extend(forward.clone());
        // Undo order is last-applied-first: this call's inverse must run
        // before any earlier call's inverse on the same store.
        let mut merged_inverse = inverse;
        merged_inverse.extend(std::mem::take(&mut entry.inverse));
        entry.inverse = merged_inverse;

        if flush {
            // `next` already reflects the store's live value plus any still-
            // pending deferred stages plus this call, so it is safe to write
            // through directly.
            store.write(next);
            entry.pending_forward.clear();
            entry.working_value = None;
        } else {
            entry.pending_forward.extend(forward);
            entry.working_value = Some(next);
        }

        Ok(())
    }

    /// Binds the remote side-effect this transaction's patches stand in for.
    /// Called again on retry (§5), never polled after it resolves.
    pub fn assign_mutation<F, Fut>(&mut self, remote: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.remote = Some(Arc::new(move || Box::pin(remote())));
        self
    }

    /// Flushes any deferred stages, builds the mutation record, and enqueues
    /// it for dispatch. Calling `commit` again on an already-closed
    /// transaction is a no-op, logged as a warning, per §6.
    #[instrument(skip(self), fields(label = %self.label))]
    pub fn commit(&mut self) -> Result<Option<MutationId>, TransactionError> {
        if self.closed {
            warn!("commit called on an already-committed transaction; ignoring");
            return Ok(None);
        }

        for id in &self.stage_order {
            let entry = self.staged.get_mut(id).expect("stage_order tracks staged keys");
            entry.working_value = None;
            if !entry.pending_forward.is_empty() {
                let current = entry.store.read();
                let reconciled = patch::apply_patches(&current, &entry.pending_forward)?;
                entry.store.write(reconciled);
                entry.pending_forward.clear();
            }
        }

        if self.staged.is_empty() {
            return Err(TransactionError::EmptyTransaction);
        }

        let remote = self.remote.clone().ok_or(TransactionError::NoMutation)?;

        let mut store_patches = HashMap::new();
        for id in &self.stage_order {
            let entry = self.staged.get(id).expect("stage_order tracks staged keys");
            self.queue.register_store(entry.store.clone());
            store_patches.insert(
                *id,
                StorePatchSet {
                    forward: entry.forward.clone(),
                    inverse: entry.inverse.clone(),
                },
            );
        }

        let mutation = Mutation::new(Some(self.label.clone()), store_patches, remote, self.max_retries);
        let id = mutation.id();
        self.closed = true;
        self.queue.enqueue(mutation);
        Ok(Some(id))
    }
}
