use super::registry::{self, ThreadDescriptor};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A thread that has been built but not yet started (spec §4.3:
/// "`CreateThread(fn, arg, name?)` returns a handle but does not start the
/// OS thread until `Start` is called").
pub struct CmThread<T> {
    name: Option<String>,
    func: Box<dyn FnOnce() -> T + Send>,
}

/// A thread that has been started; `join` blocks for its result.
pub struct RunningCmThread<T> {
    join_handle: JoinHandle<T>,
}

impl<T: Send + 'static> CmThread<T> {
    pub fn new<F>(name: Option<impl Into<String>>, func: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self { name: name.map(Into::into), func: Box::new(func) }
    }

    /// Spawns the OS thread. The trampoline registers the descriptor
    /// (assigning `Thread-<id>` if no name was given), runs the user
    /// function, then deregisters before returning (spec §4.3).
    pub fn start(self) -> RunningCmThread<T> {
        let name = self.name;
        let func = self.func;
        let mut builder = std::thread::Builder::new();
        if let Some(name) = name.clone() {
            builder = builder.name(name);
        }
        let join_handle = builder
            .spawn(move || {
                let descriptor = registry::register(name);
                let result = func();
                registry::deregister(descriptor.os_id);
                result
            })
            .expect("failed to spawn OS thread");
        RunningCmThread { join_handle }
    }
}

impl<T> RunningCmThread<T> {
    /// Blocks until the OS thread ends, returning its captured result
    /// (spec §4.3: "`Join` blocks until the OS thread ends ... and returns
    /// the captured value").
    pub fn join(self) -> T {
        self.join_handle.join().expect("thread panicked")
    }
}

/// Resolves the calling thread's descriptor via the registry, or `None`
/// if it was never registered through [`CmThread::start`] (spec §4.3
/// `SelfId`/`Self`).
pub fn current() -> Option<Arc<ThreadDescriptor>> { registry::current_descriptor() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_join_returns_captured_value() {
        let t = CmThread::new(Some("worker"), || 21 * 2);
        let handle = t.start();
        assert_eq!(handle.join(), 42);
    }

    #[test]
    fn unnamed_thread_gets_generated_name() {
        let (tx, rx) = std::sync::mpsc::channel();
        let t = CmThread::new(None::<String>, move || {
            let name = current().map(|d| d.name.clone());
            tx.send(name).unwrap();
        });
        t.start().join();
        let name = rx.recv().unwrap().unwrap();
        assert!(name.starts_with("Thread-"));
    }
}
