use std::sync::Arc;

use common::CorrelationId;
use store::Store;
use tracing::info;

use crate::error::MutationFailure;
use crate::mutation::MutationSnapshot;
use crate::queue::MutationQueue;
use crate::transaction::Transaction;

pub type OnMutationError = Arc<dyn Fn(MutationSnapshot, MutationFailure) + Send + Sync>;
pub type OnMutationSuccess = Arc<dyn Fn(MutationSnapshot) + Send + Sync>;
pub type OnQueueChange = Arc<dyn Fn(Vec<MutationSnapshot>) + Send + Sync>;

/// Engine-wide configuration: retry policy and the callbacks a UI layer
/// hooks to stay in sync with queue state (§6).
#[derive(Clone)]
pub struct EngineOptions {
    /// How many times a failed remote call is retried before the mutation
    /// (and any dependents) is rolled back. `0` disables retries.
    pub max_retries: u32,
    pub on_mutation_error: OnMutationError,
    pub on_mutation_success: OnMutationSuccess,
    pub on_queue_change: OnQueueChange,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_retries: 0,
            on_mutation_error: Arc::new(|_, _| {}),
            on_mutation_success: Arc::new(|_| {}),
            on_queue_change: Arc::new(|_| {}),
        }
    }
}

/// Entry point of the optimistic mutation engine: builds transactions and
/// owns the queue that dispatches, retries, and rolls them back.
pub struct Engine {
    queue: MutationQueue,
    max_retries: u32,
    correlation_id: CorrelationId,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let max_retries = options.max_retries;
        let correlation_id = CorrelationId::default();
        info!(%correlation_id, max_retries, "engine created");
        Self {
            queue: MutationQueue::new(options),
            max_retries,
            correlation_id,
        }
    }

    /// Opens a new transaction. `default_store` lets callers use
    /// `Transaction::set_default` instead of naming a store on every call.
    pub fn create_transaction(
        &self,
        label: impl Into<String>,
        default_store: Option<Store>,
    ) -> Transaction {
        Transaction::new(self.queue.clone(), label.into(), default_store, self.max_retries)
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}
