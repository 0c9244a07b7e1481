use tracing_core::LevelFilter;

/// Where to send our own diagnostic events.
#[derive(Debug, Clone)]
pub enum WriterConfig {
    Stdout,
    Stderr,
    File(String),
    StdoutAndFile(String),
}

/// Whether the subscriber this installs is process-global or scoped to the
/// calling thread (tests want the latter, so parallel test threads don't
/// fight over one global dispatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingScope {
    Global,
    ThreadLocal,
}

#[derive(Debug)]
pub struct TracingConfig {
    pub writer_config: WriterConfig,
    pub level_filter: LevelFilter,
    pub scope: TracingScope,
}

impl TracingConfig {
    pub fn new_stdout(level_filter: LevelFilter) -> Self {
        Self { writer_config: WriterConfig::Stdout, level_filter, scope: TracingScope::Global }
    }

    pub fn new_file(path: impl Into<String>, level_filter: LevelFilter) -> Self {
        Self {
            writer_config: WriterConfig::File(path.into()),
            level_filter,
            scope: TracingScope::Global,
        }
    }

    pub fn with_scope(mut self, scope: TracingScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn get_writer_config(&self) -> WriterConfig {
        self.writer_config.clone()
    }

    pub fn get_level_filter(&self) -> LevelFilter {
        self.level_filter
    }
}
