use crate::sync::{Condition, ConditionKind, Semaphore};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed or auto-growing worker pool fed by a FIFO job queue gated by a
/// counting semaphore (spec §3 "Thread pool", §4.4).
///
/// Shared-resource policy: `jobs` is governed by `jobs` mutex; `idle_count`
/// / `pool_size` are governed by `counts`; `feed` metering and `idle`
/// wake-up are independent primitives, never locked while `jobs` or
/// `counts` is held.
pub struct ThreadPool {
    #[allow(dead_code)]
    name: String,
    inner: Arc<Inner>,
    workers: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

struct Inner {
    jobs: Mutex<VecDeque<Job>>,
    feed: Semaphore,
    counts: Mutex<Counts>,
    idle: Condition,
    running: std::sync::atomic::AtomicBool,
    auto_grow: bool,
    next_worker_id: std::sync::atomic::AtomicUsize,
    name: String,
}

struct Counts {
    idle_count: usize,
    pool_size: usize,
}

impl ThreadPool {
    /// `size <= 0` means "start with one thread and grow on demand" (spec
    /// §4.4).
    pub fn new(name: impl Into<String>, size: i64) -> Self {
        let name = name.into();
        let (initial, auto_grow) = if size <= 0 { (1, true) } else { (size as usize, false) };

        let inner = Arc::new(Inner {
            jobs: Mutex::new(VecDeque::new()),
            feed: Semaphore::new(0),
            counts: Mutex::new(Counts { idle_count: initial, pool_size: initial }),
            idle: Condition::new(ConditionKind::Manual),
            running: std::sync::atomic::AtomicBool::new(true),
            auto_grow,
            next_worker_id: std::sync::atomic::AtomicUsize::new(0),
            name: name.clone(),
        });
        inner.idle.set();

        let mut workers = Vec::with_capacity(initial);
        for _ in 0..initial {
            workers.push(spawn_worker(Arc::clone(&inner)));
        }

        Self { name, inner, workers: Mutex::new(workers) }
    }

    /// Resets the idle condition, pushes the job, decrements `idle_count`,
    /// releases the feed semaphore once. If auto-grow is enabled and
    /// `idle_count` just hit 0, spawns one more worker (spec §4.4).
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.idle.reset();
        self.inner.jobs.lock().unwrap_or_else(|e| e.into_inner()).push_back(Box::new(job));

        let should_grow = {
            let mut counts = self.inner.counts.lock().unwrap_or_else(|e| e.into_inner());
            if counts.idle_count > 0 {
                counts.idle_count -= 1;
            }
            self.inner.auto_grow && counts.idle_count == 0
        };

        self.inner.feed.release();

        if should_grow {
            let mut counts = self.inner.counts.lock().unwrap_or_else(|e| e.into_inner());
            counts.pool_size += 1;
            counts.idle_count += 1;
            drop(counts);
            self.workers.lock().unwrap_or_else(|e| e.into_inner()).push(spawn_worker(Arc::clone(&self.inner)));
        }
    }

    /// Blocks until `idle_count == pool_size` (spec §4.4, §8.8).
    pub fn wait(&self) {
        loop {
            self.inner.idle.wait();
            let counts = self.inner.counts.lock().unwrap_or_else(|e| e.into_inner());
            if counts.idle_count == counts.pool_size {
                break;
            }
        }
    }

    pub fn idle_count(&self) -> usize {
        self.inner.counts.lock().unwrap_or_else(|e| e.into_inner()).idle_count
    }

    pub fn pool_size(&self) -> usize {
        self.inner.counts.lock().unwrap_or_else(|e| e.into_inner()).pool_size
    }

    /// Stops the running flag, wakes every worker (releasing the semaphore
    /// once per worker), joins them all, and drains any remaining queued
    /// jobs with a warning (spec §4.4).
    pub fn destroy(self) {
        self.inner.running.store(false, std::sync::atomic::Ordering::SeqCst);
        let workers = self.workers.into_inner().unwrap_or_else(|e| e.into_inner());
        for _ in &workers {
            self.inner.feed.release();
        }
        for w in workers {
            let _ = w.join();
        }

        let remaining = self.inner.jobs.lock().unwrap_or_else(|e| e.into_inner()).len();
        if remaining > 0 {
            tracing::warn!(pool = %self.inner.name, remaining, "destroying with remaining jobs");
        }
    }
}

fn spawn_worker(inner: Arc<Inner>) -> std::thread::JoinHandle<()> {
    let worker_id = inner.next_worker_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    std::thread::Builder::new()
        .name(format!("{}-worker-{worker_id}", inner.name))
        .spawn(move || worker_loop(inner))
        .expect("failed to spawn pool worker")
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        // 1 s acquire timeout so the running flag is checked periodically
        // even with no work (spec §4.4).
        if inner.feed.acquire(Some(Duration::from_secs(1))) == crate::sync::AcquireResult::TimedOut {
            if !inner.running.load(std::sync::atomic::Ordering::SeqCst) {
                return;
            }
            continue;
        }

        if !inner.running.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }

        let job = inner.jobs.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        if let Some(job) = job {
            job();
        }

        let mut counts = inner.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.idle_count += 1;
        if counts.idle_count == counts.pool_size {
            inner.idle.set();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn single_worker_runs_jobs_in_submission_order() {
        let pool = ThreadPool::new("test", 1);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let order = Arc::clone(&order);
            pool.execute(move || order.lock().unwrap().push(i));
        }
        pool.wait();
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
        pool.destroy();
    }

    #[test]
    fn wait_returns_only_when_fully_idle() {
        let pool = ThreadPool::new("test", 4);
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            pool.execute(move || {
                std::thread::sleep(Duration::from_millis(10));
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.wait();
        assert_eq!(ran.load(Ordering::SeqCst), 10);
        assert_eq!(pool.idle_count(), pool.pool_size());
        pool.destroy();
    }

    #[test]
    fn auto_grow_pool_starts_at_one_and_grows() {
        let pool = ThreadPool::new("auto", 0);
        assert_eq!(pool.pool_size(), 1);
        let (tx, rx) = std::sync::mpsc::channel();
        pool.execute(move || {
            std::thread::sleep(Duration::from_millis(100));
            tx.send(()).unwrap();
        });
        pool.execute(|| {});
        std::thread::sleep(Duration::from_millis(30));
        assert!(pool.pool_size() >= 2);
        rx.recv().unwrap();
        pool.wait();
        pool.destroy();
    }
}
