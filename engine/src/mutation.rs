use std::collections::{HashMap, HashSet};

use patch::{Patch, extract_affected_paths};
use store::StoreId;

use crate::ids::{MutationId, Timestamp};
use crate::remote::RemoteFn;

/// Where a mutation sits in its lifecycle (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    InFlight,
    Success,
    Failed,
    RolledBack,
}

/// The forward and inverse patch sequences a mutation staged against one
/// store, in application order.
#[derive(Debug, Clone)]
pub struct StorePatchSet {
    pub forward: Vec<Patch>,
    pub inverse: Vec<Patch>,
}

/// A committed, queued mutation: a bundle of per-store patches plus the
/// remote side-effect that must succeed for them to stick.
///
/// Not exported from the crate root — callers observe mutations only through
/// [`MutationSnapshot`].
pub(crate) struct Mutation {
    pub(crate) id: MutationId,
    pub(crate) created_at: Timestamp,
    pub(crate) status: MutationStatus,
    pub(crate) label: Option<String>,
    pub(crate) store_patches: HashMap<StoreId, StorePatchSet>,
    pub(crate) affected_paths: HashSet<String>,
    pub(crate) remote: RemoteFn,
    pub(crate) retry_count: u32,
    pub(crate) max_retries: u32,
}

impl Mutation {
    pub(crate) fn new(
        label: Option<String>,
        store_patches: HashMap<StoreId, StorePatchSet>,
        remote: RemoteFn,
        max_retries: u32,
    ) -> Self {
        let affected_paths = extract_affected_paths(
            store_patches
                .values()
                .flat_map(|sp| sp.forward.iter().map(|p| p.path())),
        );
        Self {
            id: MutationId::next(),
            created_at: Timestamp::next(),
            status: MutationStatus::Pending,
            label,
            store_patches,
            affected_paths,
            remote,
            retry_count: 0,
            max_retries,
        }
    }

    pub(crate) fn id(&self) -> MutationId {
        self.id
    }

    pub(crate) fn snapshot(&self) -> MutationSnapshot {
        MutationSnapshot {
            id: self.id,
            created_at: self.created_at,
            status: self.status,
            label: self.label.clone(),
            patch_count: self.store_patches.values().map(|sp| sp.forward.len()).sum(),
            affected_paths: self.affected_paths.clone(),
            retry_count: self.retry_count,
        }
    }
}

/// A read-only view of a mutation at a point in time, handed to the
/// `on_queue_change`/`on_mutation_success`/`on_mutation_error` callbacks and
/// kept (bounded) in queue history.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationSnapshot {
    pub id: MutationId,
    pub created_at: Timestamp,
    pub status: MutationStatus,
    pub label: Option<String>,
    pub patch_count: usize,
    pub affected_paths: HashSet<String>,
    pub retry_count: u32,
}
