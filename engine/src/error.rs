use patch::PatchApplyError;
use thiserror::Error;

use crate::ids::MutationId;

/// Errors raised synchronously by [`crate::Transaction`] methods.
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction is already committed")]
    ClosedTransaction,
    #[error("no default store bound to this transaction")]
    NoDefaultStore,
    #[error("commit called with no staged writes")]
    EmptyTransaction,
    #[error("commit called without a remote function assigned")]
    NoMutation,
    #[error("a deferred stage no longer applies to the store's current value: {0}")]
    Conflict(#[from] PatchApplyError),
}

/// Why a mutation ended in `failed`/`rolled-back`, delivered to
/// `on_mutation_error`.
#[derive(Debug)]
pub enum MutationFailure {
    /// The assigned remote function returned an error on every attempt.
    Remote(anyhow::Error),
    /// This mutation survived its own remote call but was unwound because an
    /// earlier mutation in the same store(s) failed and this mutation's
    /// patches no longer apply to the reconciled state (§4.D step 3d).
    DependentRollback {
        cause: MutationId,
        source: PatchApplyError,
    },
}

impl std::fmt::Display for MutationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationFailure::Remote(err) => write!(f, "remote rejection: {err}"),
            MutationFailure::DependentRollback { cause, source } => {
                write!(f, "rolled back as a dependent of {cause}: {source}")
            }
        }
    }
}

impl std::error::Error for MutationFailure {}
