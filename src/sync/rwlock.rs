use super::condition::{Condition, ConditionKind};
use super::mutex::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::Mutex;

/// A recursive read/write lock composed exactly the way spec §4.2
/// prescribes: a read-count mutex, a writer mutex, and a manual-reset "no
/// readers" condition. This makes writers starve only while readers
/// continuously chain, and readers block on writers — `std::sync::RwLock`
/// does not guarantee either property, so it isn't used here.
pub struct ReentrantRwLock {
    writer: ReentrantMutex,
    rdcount: Mutex<u64>,
    no_readers: Condition,
}

pub struct ReadGuard<'a> {
    lock: &'a ReentrantRwLock,
}

/// Holding the writer-mutex guard is the write lock: dropping it releases
/// the recursive hold the normal way, no separate bookkeeping needed.
pub struct WriteGuard<'a> {
    _writer_guard: ReentrantMutexGuard<'a>,
}

impl Default for ReentrantRwLock {
    fn default() -> Self { Self::new() }
}

impl ReentrantRwLock {
    pub fn new() -> Self {
        let no_readers = Condition::new(ConditionKind::Manual);
        no_readers.set(); // vacuously true: zero readers at construction.
        Self { writer: ReentrantMutex::new(), rdcount: Mutex::new(0), no_readers }
    }

    /// Read lock: take writer mutex -> take rdcount mutex -> if rdcount
    /// transitions 0->1, reset "no readers" -> rdcount++ -> release both.
    pub fn read(&self) -> ReadGuard<'_> {
        let writer_guard = self.writer.lock();
        let mut count = self.rdcount.lock().unwrap_or_else(|e| e.into_inner());
        if *count == 0 {
            self.no_readers.reset();
        }
        *count += 1;
        drop(count);
        drop(writer_guard);
        ReadGuard { lock: self }
    }

    /// Read unlock: take rdcount mutex -> rdcount-- -> if it reached 0, set
    /// "no readers" -> release.
    fn unlock_read(&self) {
        let mut count = self.rdcount.lock().unwrap_or_else(|e| e.into_inner());
        *count -= 1;
        if *count == 0 {
            self.no_readers.set();
        }
    }

    /// Write lock: take writer mutex -> wait for "no readers".
    pub fn write(&self) -> WriteGuard<'_> {
        let writer_guard = self.writer.lock();
        self.no_readers.wait();
        WriteGuard { _writer_guard: writer_guard }
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) { self.lock.unlock_read(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn multiple_readers_hold_simultaneously() {
        let lock = Arc::new(ReentrantRwLock::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let concurrent = Arc::clone(&concurrent);
                let max_seen = Arc::clone(&max_seen);
                std::thread::spawn(move || {
                    let _g = lock.read();
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn writer_excludes_readers_and_other_writers() {
        let lock = Arc::new(ReentrantRwLock::new());
        let active_writers = Arc::new(AtomicUsize::new(0));
        let saw_overlap = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let active_writers = Arc::clone(&active_writers);
                let saw_overlap = Arc::clone(&saw_overlap);
                std::thread::spawn(move || {
                    let _g = lock.write();
                    if active_writers.fetch_add(1, Ordering::SeqCst) > 0 {
                        saw_overlap.store(true, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_millis(20));
                    active_writers.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(!saw_overlap.load(Ordering::SeqCst));
    }
}
