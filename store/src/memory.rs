use std::sync::Arc;

use parking_lot::RwLock;
use patch::{Patch, produce_with_patches};
use serde_json::Value;

use crate::adapter::{Store, StoreAdapter};
use crate::id::StoreId;

/// The reference [`StoreAdapter`] implementation: a JSON value behind a
/// `parking_lot::RwLock`, held in memory for the lifetime of the process.
///
/// This is the adapter the engine's own tests and demo CLI use; application
/// code that already owns a reactive store only needs to implement
/// [`StoreAdapter`] against it, not replace it with this type.
pub struct MemoryStore {
    id: StoreId,
    value: RwLock<Value>,
}

impl MemoryStore {
    /// Builds a new store seeded with `initial`, returned pre-wrapped as the
    /// `Store` handle type the rest of the engine expects.
    pub fn new(initial: Value) -> Store {
        Arc::new(Self {
            id: StoreId::next(),
            value: RwLock::new(initial),
        })
    }
}

impl StoreAdapter for MemoryStore {
    fn id(&self) -> StoreId {
        self.id
    }

    fn read(&self) -> Value {
        self.value.read().clone()
    }

    fn write(&self, next: Value) {
        *self.value.write() = next;
    }

    fn produce_with_patches(
        &self,
        recipe: Box<dyn FnOnce(&mut Value) + Send + '_>,
    ) -> (Value, Vec<Patch>, Vec<Patch>) {
        let mut guard = self.value.write();
        let (next, patches, inverse) = produce_with_patches(&guard, recipe);
        *guard = next.clone();
        (next, patches, inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn produce_with_patches_updates_store_in_place() {
        let store = MemoryStore::new(json!({"tasks": {"t1": {"title": "A"}}}));
        let (next, patches, _inverse) = store.produce_with_patches(Box::new(|v| {
            v["tasks"]["t1"]["title"] = json!("B");
        }));
        assert_eq!(next["tasks"]["t1"]["title"], json!("B"));
        assert_eq!(store.read(), next);
        assert_eq!(patches.len(), 1);
    }

    #[test]
    fn two_stores_have_distinct_identity() {
        let a = MemoryStore::new(json!({}));
        let b = MemoryStore::new(json!({}));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn write_replaces_whole_value() {
        let store = MemoryStore::new(json!({"a": 1}));
        store.write(json!({"b": 2}));
        assert_eq!(store.read(), json!({"b": 2}));
    }
}
