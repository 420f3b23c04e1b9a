//! Client-side optimistic mutation engine (components C + D): a transaction
//! builder that stages patches against one or more stores, and a mutation
//! queue that dispatches the bound remote calls, retries them, and rolls a
//! failure — plus anything that turns out to depend on it — back out.

mod engine;
mod error;
mod ids;
mod mutation;
mod queue;
mod remote;
mod transaction;

pub use engine::{Engine, EngineOptions, OnMutationError, OnMutationSuccess, OnQueueChange};
pub use error::{MutationFailure, TransactionError};
pub use ids::{MutationId, Timestamp};
pub use mutation::{MutationSnapshot, MutationStatus, StorePatchSet};
pub use queue::MutationQueue;
pub use remote::{RemoteFn, RemoteFuture};
pub use transaction::Transaction;
