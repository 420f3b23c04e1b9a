//! Structural deltas ("patches") over JSON-shaped state, and the path
//! utilities that let a mutation queue reason about which entities a batch
//! of patches touches.

mod error;
mod patch;
mod path;
mod produce;

pub use error::PatchApplyError;
pub use patch::Patch;
pub use path::{PathSegment, entity_path, extract_affected_paths, has_path_conflict};
pub use produce::{apply_patches, diff_values, produce_with_patches};
