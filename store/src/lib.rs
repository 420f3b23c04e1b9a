//! Store adapter abstraction (component B): a named, mutable JSON-shaped
//! state container with read/write/produce-with-patches primitives.

mod adapter;
mod id;
mod memory;

pub use adapter::{Store, StoreAdapter};
pub use id::StoreId;
pub use memory::MemoryStore;
