//! Ambient internal diagnostics for this crate itself — thread pool
//! shutdown warnings, allocator leak reports, appender failures — go
//! through `tracing`, independent of the hand-rolled `logging` module
//! that host applications configure (spec §4.6 is a deliverable, not
//! a replacement for our own instrumentation).

mod init_tracing;
mod tracing_config;

pub use init_tracing::{init_tracing, try_create_layers};
pub use tracing_config::{TracingConfig, TracingScope, WriterConfig};
