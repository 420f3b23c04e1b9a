use std::sync::Arc;

use patch::Patch;
use serde_json::Value;

use crate::id::StoreId;

/// A named, mutable JSON-shaped state container.
///
/// `write` must be atomic with respect to concurrent `read`s from the
/// perspective of the engine's single cooperative scheduler (§5): no reader
/// may observe a value that is neither the pre- nor the post-write value.
/// Implementations may wrap any container that supports these three
/// primitives — an in-memory cell ([`crate::MemoryStore`]), a UI framework's
/// reactive signal, a cache fronting a database, and so on.
pub trait StoreAdapter: Send + Sync {
    /// This store's identity. Stable for the adapter's lifetime.
    fn id(&self) -> StoreId;

    /// Reads the current value.
    fn read(&self) -> Value;

    /// Writes a whole new value, replacing whatever was there.
    fn write(&self, next: Value);

    /// Runs `recipe` against a mutable clone of the current value and
    /// atomically swaps it in, returning the new value plus the forward and
    /// inverse patch sequences that describe the change (per
    /// [`patch::produce_with_patches`]).
    fn produce_with_patches(
        &self,
        recipe: Box<dyn FnOnce(&mut Value) + Send + '_>,
    ) -> (Value, Vec<Patch>, Vec<Patch>);
}

/// A `Store` handle, as passed around by `Transaction` and `MutationQueue`.
///
/// Cloning a `Store` clones the `Arc`, not the underlying state: all clones
/// refer to the same store identity.
pub type Store = Arc<dyn StoreAdapter>;
