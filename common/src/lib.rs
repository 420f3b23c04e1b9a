//! Shared, non-domain scaffolding used by every crate in the workspace:
//! tracing subscriber setup and a correlation id threaded through engine
//! instances so their log events can be told apart.

pub mod logger;

pub use logger::{CorrelationId, init_tracing};
