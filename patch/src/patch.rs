use serde_json::Value;

use crate::path::PathSegment;

/// A structural edit on a JSON-shaped tree, as produced by
/// [`crate::produce_with_patches`] or [`crate::apply_patches`]'s counterpart,
/// `diff_values`.
#[derive(Clone, Debug, PartialEq)]
pub enum Patch {
    /// Inserts `value` at `path`. For an object this introduces a new key;
    /// for an array this inserts an element, shifting later indices right.
    Add { path: Vec<PathSegment>, value: Value },
    /// Removes whatever sits at `path`.
    Remove { path: Vec<PathSegment> },
    /// Overwrites whatever sits at `path` with `value`.
    Replace { path: Vec<PathSegment>, value: Value },
}

impl Patch {
    pub fn path(&self) -> &[PathSegment] {
        match self {
            Patch::Add { path, .. } => path,
            Patch::Remove { path } => path,
            Patch::Replace { path, .. } => path,
        }
    }
}
