use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CORRELATION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque tag threaded through one engine instance's log events.
///
/// Unlike a UUID, `CorrelationId` is a per-process monotonic counter: the
/// engine never needs these to be globally unique, only to distinguish
/// concurrently-running engine instances within one process's logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Allocates the next correlation id.
    pub fn next() -> Self {
        Self(NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine-{}", self.0)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::next()
    }
}
