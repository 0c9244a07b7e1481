use super::async_writer::AsyncWriter;
use super::Appender;
use crate::common::CmResult;
use crate::logging::pattern::{FormatInput, Pattern};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Appends to a fixed path. On first failure, creates the parent
/// directory and retries once (spec §4.6.4 kind 2, §7 "Filesystem error").
pub struct FileAppender {
    name: String,
    path: PathBuf,
    pattern: Pattern,
    mutex: Mutex<()>,
    async_writer: Mutex<Option<Arc<AsyncWriter>>>,
}

impl FileAppender {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Arc<Self> {
        Self::with_pattern(
            name,
            path,
            Pattern::compile(crate::logging::pattern::DEFAULT_PATTERN).expect("default pattern always compiles"),
        )
    }

    pub fn with_pattern(name: impl Into<String>, path: impl Into<PathBuf>, pattern: Pattern) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            path: path.into(),
            pattern,
            mutex: Mutex::new(()),
            async_writer: Mutex::new(None),
        })
    }

    fn sink(&self) -> Arc<dyn Fn(&str) -> CmResult<()> + Send + Sync> {
        let path = self.path.clone();
        Arc::new(move |rendered: &str| write_append(&path, rendered))
    }
}

fn write_append(path: &std::path::Path, rendered: &str) -> CmResult<()> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut f) => {
            f.write_all(rendered.as_bytes())?;
            Ok(())
        }
        Err(_) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut f = OpenOptions::new().create(true).append(true).open(path)?;
            f.write_all(rendered.as_bytes())?;
            Ok(())
        }
    }
}

impl Appender for FileAppender {
    fn append(&self, input: &FormatInput<'_>) -> CmResult<()> {
        let rendered = self.pattern.render(input);
        if let Some(writer) = self.async_writer.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let writer = Arc::clone(writer);
            return writer.push(rendered, self.sink().as_ref());
        }
        let _guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        (self.sink())(&rendered)
    }

    fn flush(&self) -> CmResult<()> {
        if let Some(writer) = self.async_writer.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let writer = Arc::clone(writer);
            return writer.flush(self.sink().as_ref());
        }
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
    use crate::logging::level::Level;

    fn input(message: &str) -> FormatInput<'_> {
        FormatInput { logger_name: "x", level: Level::Info, file: "f.rs", line: 1, message, stack: None }
    }

    #[test]
    fn creates_parent_directory_on_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.log");
        let appender = FileAppender::with_pattern("file", &path, Pattern::compile("%m%n").unwrap());
        appender.append(&input("line one")).unwrap();
        appender.append(&input("line two")).unwrap();
        appender.destroy();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "line one\nline two\n");
    }
}
