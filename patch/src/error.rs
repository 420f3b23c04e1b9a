use thiserror::Error;

use crate::path::PathSegment;

/// Structural mismatch encountered while applying a patch sequence.
///
/// Surfaced during ordinary `apply_patches` calls and, during rollback, as a
/// "dependent mutation rolled back" signal when a survivor's forward patches
/// no longer fit the reconciled state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchApplyError {
    #[error("path {path:?} does not exist")]
    PathNotFound { path: Vec<PathSegment> },

    #[error("path {path:?} expected a {expected}, found a {found}")]
    ShapeMismatch {
        path: Vec<PathSegment>,
        expected: &'static str,
        found: &'static str,
    },

    #[error("array index {index} out of bounds (len {len}) at path {path:?}")]
    IndexOutOfBounds {
        path: Vec<PathSegment>,
        index: usize,
        len: usize,
    },
}
