use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MUTATION_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TIMESTAMP: AtomicU64 = AtomicU64::new(1);

/// Identity of a queued mutation. Monotonic for the lifetime of the process,
/// so ordering two ids by value also orders them by enqueue order.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(u64);

impl MutationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_MUTATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mutation-{}", self.0)
    }
}

/// A mutation's creation order, independent of its id. Kept as its own type
/// rather than reusing `MutationId` because the rollback algorithm (§4.D)
/// talks about "newest first" in terms of creation time, and a future
/// revision of id allocation (e.g. recycling) should not be able to change
/// rollback ordering silently.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(u64);

impl Timestamp {
    pub(crate) fn next() -> Self {
        Self(NEXT_TIMESTAMP.fetch_add(1, Ordering::Relaxed))
    }
}
