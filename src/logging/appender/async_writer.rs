use crate::common::CmResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Double-buffered async write pipeline shared by every appender kind
/// (spec §4.6.4). `buffer` accumulates new records; `flush` moves them
/// wholesale into its own list and drains that list to the sink, so a
/// slow sink never blocks callers appending concurrently.
pub struct AsyncWriter {
    buffer: Mutex<Vec<String>>,
    buffer_size: usize,
    running: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncWriter {
    pub fn new(buffer_size: usize) -> Arc<Self> {
        Arc::new(Self {
            buffer: Mutex::new(Vec::new()),
            buffer_size: buffer_size.max(10),
            running: AtomicBool::new(true),
            thread: Mutex::new(None),
        })
    }

    /// Spawns the `<appender>-AsyncWriter` thread, waking every 100 ms to
    /// flush (spec §4.6.4).
    pub fn start(self: &Arc<Self>, appender_name: &str, sink: Arc<dyn Fn(&str) -> CmResult<()> + Send + Sync>) {
        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(format!("{appender_name}-AsyncWriter"))
            .spawn(move || {
                while this.running.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(100));
                    let _ = this.flush(&sink);
                }
                let _ = this.flush(&sink);
            })
            .expect("failed to spawn async appender writer");
        *self.thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Pushes a rendered record; flushes inline if the buffer just hit
    /// `buffer_size` (spec §4.6.4).
    pub fn push(&self, rendered: String, sink: &(dyn Fn(&str) -> CmResult<()> + Send + Sync)) -> CmResult<()> {
        let should_flush = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            buffer.push(rendered);
            buffer.len() >= self.buffer_size
        };
        if should_flush {
            self.flush(sink)?;
        }
        Ok(())
    }

    pub fn flush(&self, sink: &(dyn Fn(&str) -> CmResult<()> + Send + Sync)) -> CmResult<()> {
        let drained = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *buffer)
        };
        for record in drained {
            sink(&record)?;
        }
        Ok(())
    }

    /// Stops the writer thread and drains anything still buffered.
    pub fn destroy(&self, sink: &(dyn Fn(&str) -> CmResult<()> + Send + Sync)) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = handle.join();
        }
        let _ = self.flush(sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn destroy_drains_whatever_remains_buffered() {
        let writer = AsyncWriter::new(100);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: Arc<dyn Fn(&str) -> CmResult<()> + Send + Sync> =
            Arc::new(move |s: &str| {
                seen_clone.lock().unwrap().push(s.to_string());
                Ok(())
            });

        for i in 0..5 {
            writer.push(format!("record-{i}"), sink.as_ref()).unwrap();
        }
        writer.destroy(sink.as_ref());

        assert_eq!(seen.lock().unwrap().len(), 5);
    }

    #[test]
    fn inline_flush_triggers_once_buffer_size_is_reached() {
        let writer = AsyncWriter::new(10);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let sink: Arc<dyn Fn(&str) -> CmResult<()> + Send + Sync> =
            Arc::new(move |_: &str| {
                count_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        for i in 0..10 {
            writer.push(format!("record-{i}"), sink.as_ref()).unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 10);
        writer.destroy(sink.as_ref());
    }
}
