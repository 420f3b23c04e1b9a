mod correlation_id;
mod init;

pub use correlation_id::CorrelationId;
pub use init::init_tracing;
