//! Structured logger: levels, pattern compiler/formatter, appenders, the
//! `ConfLogger`/`Logger` dispatch hierarchy, and JSON configuration
//! loading (spec §3, §4.6).

pub mod appender;
pub mod config;
pub mod level;
pub mod logger;
pub mod pattern;

pub use appender::{Appender, AppenderList, ConsoleAppender, FileAppender, RollTerm, RollingFileAppender, SocketAppender};
pub use config::{load_from_env, load_from_path, LogConfiguration};
pub use level::Level;
pub use logger::{ConfLogger, Logger};
pub use pattern::{FormatInput, Pattern, DEFAULT_PATTERN};
