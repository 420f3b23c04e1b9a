use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A pending remote side-effect.
pub type RemoteFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The remote side-effect bound to a transaction via `assign_mutation`.
///
/// Represented as a factory rather than a one-shot future because retries
/// (§5) call it again, and a `Future` cannot be polled after it resolves.
pub type RemoteFn = Arc<dyn Fn() -> RemoteFuture + Send + Sync>;
