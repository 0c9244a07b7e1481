use super::async_writer::AsyncWriter;
use super::Appender;
use crate::common::CmResult;
use crate::logging::pattern::{FormatInput, Pattern};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Writes to stdout or stderr, flushing after each synchronous write
/// (spec §4.6.4 kind 1).
pub struct ConsoleAppender {
    name: String,
    use_stderr: bool,
    pattern: Pattern,
    mutex: Mutex<()>,
    async_writer: Mutex<Option<Arc<AsyncWriter>>>,
}

impl ConsoleAppender {
    pub fn new(name: impl Into<String>, use_stderr: bool) -> Arc<Self> {
        Self::with_pattern(name, use_stderr, Pattern::compile(crate::logging::pattern::DEFAULT_PATTERN).expect("default pattern always compiles"))
    }

    pub fn with_pattern(name: impl Into<String>, use_stderr: bool, pattern: Pattern) -> Arc<Self> {
        Arc::new(Self { name: name.into(), use_stderr, pattern, mutex: Mutex::new(()), async_writer: Mutex::new(None) })
    }

    fn sink(&self) -> Arc<dyn Fn(&str) -> CmResult<()> + Send + Sync> {
        let use_stderr = self.use_stderr;
        Arc::new(move |rendered: &str| {
            if use_stderr {
                let mut stderr = std::io::stderr();
                write!(stderr, "{rendered}")?;
                stderr.flush()?;
            } else {
                let mut stdout = std::io::stdout();
                write!(stdout, "{rendered}")?;
                stdout.flush()?;
            }
            Ok(())
        })
    }
}

impl Appender for ConsoleAppender {
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

    fn sample_input() -> FormatInput<'static> {
        FormatInput { logger_name: "x", level: Level::Info, file: "f.rs", line: 1, message: "hello", stack: None }
    }

    #[test]
    fn sync_append_does_not_panic_on_stdout() {
        let appender = ConsoleAppender::new("console", false);
        appender.append(&sample_input()).unwrap();
        appender.flush().unwrap();
        appender.destroy();
    }
}
