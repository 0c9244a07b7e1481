use super::task::{TimerCallback, TimerTask};
use crate::sync::{AcquireResult, Semaphore};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Outcome of [`Timer::cancel`] (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResult {
    /// Removed from `scheduled`/`finished` and freed immediately.
    Freed,
    /// In the job FIFO or currently executing; the worker will free it
    /// after the in-flight callback returns, without rescheduling it.
    Deferred,
    /// Already canceled (or never tracked) — a no-op, matching spec
    /// §8.10's "`Cancel(t)` called twice returns success once and no-op on
    /// the second call".
    AlreadyGone,
}

struct TimerState {
    scheduled: Vec<Arc<TimerTask>>,
    finished: Vec<Arc<TimerTask>>,
    all_tasks: HashMap<u64, Arc<TimerTask>>,
    job_queue: VecDeque<Arc<TimerTask>>,
}

struct TimerInner {
    state: Mutex<TimerState>,
    job_sem: Semaphore,
    running: AtomicBool,
    tick: Duration,
    next_id: AtomicU64,
}

/// One dedicated main-loop thread plus N worker threads, dispatching
/// one-shot and repeating tasks keyed by wall-clock time (spec §4.5).
pub struct Timer {
    inner: Arc<TimerInner>,
    main_loop: Mutex<Option<std::thread::JoinHandle<()>>>,
    workers: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl Timer {
    /// `tick`: scheduling tick — lower is more responsive, more wake-ups.
    /// `worker_count`: size of the private worker pool.
    pub fn new(tick: Duration, worker_count: usize) -> Self {
        let inner = Arc::new(TimerInner {
            state: Mutex::new(TimerState {
                scheduled: Vec::new(),
                finished: Vec::new(),
                all_tasks: HashMap::new(),
                job_queue: VecDeque::new(),
            }),
            job_sem: Semaphore::new(0),
            running: AtomicBool::new(true),
            tick,
            next_id: AtomicU64::new(0),
        });

        let main_loop = {
            let inner = Arc::clone(&inner);
            std::thread::Builder::new()
                .name("timer-main-loop".to_string())
                .spawn(move || main_loop(inner))
                .expect("failed to spawn timer main loop")
        };

        let workers = (0..worker_count.max(1))
            .map(|i| {
                let inner = Arc::clone(&inner);
                std::thread::Builder::new()
                    .name(format!("timer-worker-{i}"))
                    .spawn(move || worker_loop(inner))
                    .expect("failed to spawn timer worker")
            })
            .collect();

        Self { inner, main_loop: Mutex::new(Some(main_loop)), workers: Mutex::new(workers) }
    }

    fn schedule(&self, first_run: Instant, period: Option<Duration>, callback: TimerCallback) -> Arc<TimerTask> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Arc::new(TimerTask::new(id, first_run, period, callback));
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        insert_sorted(&mut state.scheduled, Arc::clone(&task));
        state.all_tasks.insert(id, Arc::clone(&task));
        task
    }

    pub fn schedule_at(&self, at: Instant, callback: impl Fn() + Send + Sync + 'static) -> Arc<TimerTask> {
        self.schedule(at, None, Box::new(callback))
    }

    pub fn schedule_delay(&self, delay: Duration, callback: impl Fn() + Send + Sync + 'static) -> Arc<TimerTask> {
        self.schedule_at(Instant::now() + delay, callback)
    }

    pub fn schedule_at_repeat(
        &self,
        first: Instant,
        period: Duration,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Arc<TimerTask> {
        self.schedule(first, Some(period), Box::new(callback))
    }

    pub fn schedule_delay_repeat(
        &self,
        delay: Duration,
        period: Duration,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Arc<TimerTask> {
        self.schedule_at_repeat(Instant::now() + delay, period, callback)
    }

    /// Atomically frees the task if it's still `scheduled`/`finished`, or
    /// defers the free until its in-flight callback returns (spec §4.5).
    pub fn cancel(&self, task: &Arc<TimerTask>) -> CancelResult {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.all_tasks.contains_key(&task.id) {
            return CancelResult::AlreadyGone;
        }
        if let Some(pos) = state.scheduled.iter().position(|t| t.id == task.id) {
            state.scheduled.remove(pos);
            state.all_tasks.remove(&task.id);
            return CancelResult::Freed;
        }
        if let Some(pos) = state.finished.iter().position(|t| t.id == task.id) {
            state.finished.remove(pos);
            state.all_tasks.remove(&task.id);
            return CancelResult::Freed;
        }
        drop(state);
        if task.canceled.swap(true, Ordering::SeqCst) {
            CancelResult::AlreadyGone
        } else {
            CancelResult::Deferred
        }
    }

    /// Cancels every task (spec §4.5).
    pub fn purge(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        for t in state.scheduled.drain(..) {
            state.all_tasks.remove(&t.id);
        }
        for t in state.finished.drain(..) {
            state.all_tasks.remove(&t.id);
        }
        for t in state.all_tasks.values() {
            t.canceled.store(true, Ordering::SeqCst);
        }
    }

    /// Purges, stops the main loop and workers, and frees all arrays.
    pub fn destroy(self) {
        self.purge();
        self.inner.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.main_loop.into_inner().unwrap_or_else(|e| e.into_inner()) {
            let _ = handle.join();
        }

        let workers = self.workers.into_inner().unwrap_or_else(|e| e.into_inner());
        for _ in &workers {
            self.inner.job_sem.release();
        }
        for w in workers {
            let _ = w.join();
        }

        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.scheduled.clear();
        state.finished.clear();
        state.all_tasks.clear();
        state.job_queue.clear();
    }

    pub fn finished_count(&self) -> usize {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner()).finished.len()
    }

    pub fn scheduled_count(&self) -> usize {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner()).scheduled.len()
    }
}

fn insert_sorted(scheduled: &mut Vec<Arc<TimerTask>>, task: Arc<TimerTask>) {
    let next_run = task.next_run();
    let pos = scheduled.partition_point(|t| t.next_run() <= next_run);
    scheduled.insert(pos, task);
}

fn main_loop(inner: Arc<TimerInner>) {
    while inner.running.load(Ordering::SeqCst) {
        {
            let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            while state.scheduled.first().is_some_and(|t| t.next_run() <= now) {
                let task = state.scheduled.remove(0);
                state.job_queue.push_back(task);
                inner.job_sem.release();
            }
        }
        std::thread::sleep(inner.tick);
    }
}

fn worker_loop(inner: Arc<TimerInner>) {
    loop {
        if inner.job_sem.acquire(Some(Duration::from_secs(1))) == AcquireResult::TimedOut {
            if !inner.running.load(Ordering::SeqCst) {
                return;
            }
            continue;
        }
        if !inner.running.load(Ordering::SeqCst) {
            return;
        }

        let task = {
            let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            state.job_queue.pop_front()
        };
        let Some(task) = task else { continue };

        if task.is_canceled() {
            let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
            state.all_tasks.remove(&task.id);
            continue;
        }

        (task.callback)();

        let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_canceled() {
            state.all_tasks.remove(&task.id);
        } else if task.is_repeating() {
            task.advance();
            insert_sorted(&mut state.scheduled, task);
        } else {
            state.finished.push(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn one_shot_fires_once_near_its_deadline() {
        let timer = Timer::new(Duration::from_millis(20), 2);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        timer.schedule_delay(Duration::from_millis(150), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        timer.destroy();
    }

    #[test]
    fn earlier_task_starts_no_later_than_later_task() {
        let timer = Timer::new(Duration::from_millis(10), 2);
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        timer.schedule_delay(Duration::from_millis(50), move || o1.lock().unwrap().push(1));
        let o2 = Arc::clone(&order);
        timer.schedule_delay(Duration::from_millis(100), move || o2.lock().unwrap().push(2));

        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
        timer.destroy();
    }

    #[test]
    fn cancel_is_idempotent() {
        let timer = Timer::new(Duration::from_millis(10), 1);
        let task = timer.schedule_delay(Duration::from_secs(10), || {});
        assert_eq!(timer.cancel(&task), CancelResult::Freed);
        assert_eq!(timer.cancel(&task), CancelResult::AlreadyGone);
        timer.destroy();
    }

    #[test]
    fn repeating_task_cancel_during_flight_stops_after_current_run() {
        let timer = Timer::new(Duration::from_millis(10), 1);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let task = timer.schedule_delay_repeat(Duration::from_millis(20), Duration::from_millis(100), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(250));
        timer.cancel(&task);
        let seen_at_cancel = count.load(Ordering::SeqCst);
        assert!(seen_at_cancel == 2 || seen_at_cancel == 3);

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), seen_at_cancel);

        timer.destroy();
    }
}
