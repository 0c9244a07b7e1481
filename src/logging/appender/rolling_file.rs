use super::async_writer::AsyncWriter;
use super::Appender;
use crate::common::CmResult;
use crate::logging::pattern::{FormatInput, Pattern};
use chrono::{DateTime, Datelike, Local, Timelike};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Rollover granularity (spec §6 `rollterm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollTerm {
    Year,
    Month,
    Date,
    Hour,
    Minute,
}

impl RollTerm {
    /// The field(s) compared between the last write's timestamp and now.
    /// Rollover triggers when *this field alone* differs — not the full
    /// timestamp (Design Notes §9, preserved deliberately: two writes 59 s
    /// apart can or cannot roll depending which side of the boundary they
    /// land on).
    fn granularity_key(self, t: DateTime<Local>) -> (i32, u32, u32, u32) {
        match self {
            RollTerm::Year => (t.year(), 0, 0, 0),
            RollTerm::Month => (t.year(), t.month(), 0, 0),
            RollTerm::Date => (t.year(), t.month(), t.day(), 0),
            RollTerm::Hour => (t.year(), t.month(), t.day(), t.hour()),
            RollTerm::Minute => (t.year(), t.month(), t.day(), t.hour() * 60 + t.minute()),
        }
    }

    pub fn default_file_pattern(self, filename: &str) -> String {
        match self {
            RollTerm::Year => format!("{filename}.%Y"),
            RollTerm::Month => format!("{filename}.%Y-%m"),
            RollTerm::Date => format!("{filename}.%Y-%m-%d"),
            RollTerm::Hour => format!("{filename}.%Y-%m-%d_%H"),
            RollTerm::Minute => format!("{filename}.%Y-%m-%d_%H%M"),
        }
    }
}

struct RollState {
    last_write: DateTime<Local>,
}

/// Owns the path/pattern and the mutable roll state; held behind an `Arc`
/// so async-writer sink closures can clone a handle instead of borrowing
/// `self` for longer than the method call that spawns them.
struct Inner {
    path: PathBuf,
    roll_term: RollTerm,
    file_pattern: String,
    state: Mutex<RollState>,
}

impl Inner {
    fn write_checked(&self, rendered: &str) -> CmResult<()> {
        let now = Local::now();
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if self.roll_term.granularity_key(state.last_write) != self.roll_term.granularity_key(now) {
                self.roll(state.last_write)?;
            }
            state.last_write = now;
        }
        self.write_append(rendered)
    }

    fn write_append(&self, rendered: &str) -> CmResult<()> {
        match std::fs::OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(mut f) => {
                f.write_all(rendered.as_bytes())?;
                Ok(())
            }
            Err(_) => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut f = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
                f.write_all(rendered.as_bytes())?;
                Ok(())
            }
        }
    }

    /// Renames the current file to its roll target, uniquified with
    /// `-0`, `-1`, … if that target already exists (spec §4.6.4 kind 3).
    fn roll(&self, at: DateTime<Local>) -> CmResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let base = at.format(&self.file_pattern).to_string();
        let mut target = PathBuf::from(&base);
        let mut suffix = 0u32;
        while target.exists() {
            target = PathBuf::from(format!("{base}-{suffix}"));
            suffix += 1;
        }
        std::fs::rename(&self.path, &target)?;
        Ok(())
    }
}

/// Primary path plus rollover granularity and roll-name pattern (spec
/// §4.6.4 kind 3).
pub struct RollingFileAppender {
    name: String,
    pattern: Pattern,
    inner: Arc<Inner>,
    async_writer: Mutex<Option<Arc<AsyncWriter>>>,
}

impl RollingFileAppender {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        roll_term: RollTerm,
        file_pattern: Option<String>,
    ) -> Arc<Self> {
        Self::with_pattern(
            name,
            path,
            roll_term,
            file_pattern,
            Pattern::compile(crate::logging::pattern::DEFAULT_PATTERN).expect("default pattern always compiles"),
        )
    }

    pub fn with_pattern(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        roll_term: RollTerm,
        file_pattern: Option<String>,
        pattern: Pattern,
    ) -> Arc<Self> {
        let path = path.into();
        let file_pattern =
            file_pattern.unwrap_or_else(|| roll_term.default_file_pattern(&path.to_string_lossy()));
        Arc::new(Self {
            name: name.into(),
            pattern,
            inner: Arc::new(Inner {
                path,
                roll_term,
                file_pattern,
                state: Mutex::new(RollState { last_write: Local::now() }),
            }),
            async_writer: Mutex::new(None),
        })
    }

    fn sink(&self) -> Arc<dyn Fn(&str) -> CmResult<()> + Send + Sync> {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |rendered: &str| inner.write_checked(rendered))
    }

    #[cfg(test)]
    fn write_checked(&self, rendered: &str) -> CmResult<()> {
        self.inner.write_checked(rendered)
    }

    #[cfg(test)]
    fn state(&self) -> &Mutex<RollState> {
        &self.inner.state
    }
}

impl Appender for RollingFileAppender {
    fn append(&self, input: &FormatInput<'_>) -> CmResult<()> {
        let rendered = self.pattern.render(input);
        if let Some(writer) = self.async_writer.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let writer = Arc::clone(writer);
            return writer.push(rendered, self.sink().as_ref());
        }
        self.inner.write_checked(&rendered)
    }

    fn flush(&self) -> CmResult<()> {
        Ok(())
    }

    fn set_async(&self, buffer_size: usize) {
        let writer = AsyncWriter::new(buffer_size);
        writer.start(&self.name, self.sink());
        *self.async_writer.lock().unwrap_or_else(|e| e.into_inner()) = Some(writer);
    }

    fn destroy(&self) {
        if let Some(writer) = self.async_writer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            writer.destroy(self.sink().as_ref());
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolls_when_the_granularity_field_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let appender = RollingFileAppender::new("rolling", &path, RollTerm::Minute, None);

        appender.write_checked("first\n").unwrap();
        {
            let mut state = appender.state().lock().unwrap();
            state.last_write -= chrono::Duration::minutes(1);
        }
        appender.write_checked("second\n").unwrap();

        let siblings: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(siblings.len() >= 2, "expected a rolled archive file alongside app.log");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn no_roll_when_writes_land_in_the_same_granularity_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let appender = RollingFileAppender::new("rolling", &path, RollTerm::Minute, None);

        appender.write_checked("first\n").unwrap();
        appender.write_checked("second\n").unwrap();

        let siblings: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(siblings.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
