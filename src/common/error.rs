use std::path::PathBuf;

/// Type alias used throughout the crate for calls that fail with a
/// documented, recoverable reason. Mirrors the library's own distinction
/// (see spec §7) between local, value-returned failures and process-fatal
/// ones (those panic instead of returning `CmError`).
pub type CmResult<T> = Result<T, CmError>;

/// Recoverable errors surfaced by constructors and configuration loading.
///
/// Fatal conditions (guard-byte corruption, double free, an allocation the
/// tracker never saw) are *not* represented here: they are logged and then
/// panic, per spec §7's "process asserts".
#[derive(Debug, thiserror::Error)]
pub enum CmError {
    #[error("lock poisoned")]
    LockPoisoned,

    #[error("allocator request of {requested} bytes exceeds the maximum size class (2^44)")]
    AllocatorLimitExceeded { requested: usize },

    #[error("failed to parse log configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("log configuration {path} references unknown appender {name:?}")]
    UnknownAppender { path: PathBuf, name: String },

    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),

    #[error("unknown log level {0:?}")]
    UnknownLevel(String),

    #[error("invalid log pattern: {0}")]
    PatternCompile(String),

    #[error("invalid log configuration {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl<T> From<std::sync::PoisonError<T>> for CmError {
    fn from(_: std::sync::PoisonError<T>) -> Self { CmError::LockPoisoned }
}
