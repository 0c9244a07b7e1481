//! Named sinks log records are written to (spec §4.6.4). Four kinds share
//! one trait; async buffering is factored into [`async_writer`] so each
//! concrete appender only has to implement the synchronous write path.

pub mod async_writer;
pub mod console;
pub mod file;
pub mod rolling_file;
pub mod socket;

use crate::common::CmResult;
use crate::logging::pattern::FormatInput;

/// Sink interface every appender kind implements (spec §3 "Appender").
/// Each concrete appender owns its own compiled pattern and renders the
/// record itself — patterns are per-appender, not per-logger (spec §3
/// "Appender... Internally owns: compiled pattern").
pub trait Appender: Send + Sync {
    fn append(&self, input: &FormatInput<'_>) -> CmResult<()>;

    fn flush(&self) -> CmResult<()>;

    /// Switches the appender into async mode with the given buffer size
    /// (spec §4.6.4); appenders that don't support async (none currently)
    /// would no-op here.
    fn set_async(&self, buffer_size: usize);

    fn destroy(&self);

    fn name(&self) -> &str;
}

pub use console::ConsoleAppender;
pub use file::FileAppender;
pub use rolling_file::{RollTerm, RollingFileAppender};
pub use socket::SocketAppender;

/// Per-level bucket of appenders a [`crate::logging::logger::ConfLogger`]
/// dispatches to (spec §4.6.3).
pub type AppenderList = Vec<std::sync::Arc<dyn Appender>>;
