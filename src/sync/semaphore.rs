use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Outcome of [`Semaphore::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    Acquired,
    TimedOut,
}

/// A counting semaphore (spec §4.2). `acquire(None)` waits forever,
/// matching the C API's "negative timeout means wait forever" translated
/// into an `Option<Duration>`.
pub struct Semaphore {
    count: Mutex<u64>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: u64) -> Self {
        Self { count: Mutex::new(initial), cond: Condvar::new() }
    }

    pub fn acquire(&self, timeout: Option<Duration>) -> AcquireResult {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        match timeout {
            None => {
                while *count == 0 {
                    count = self.cond.wait(count).unwrap_or_else(|e| e.into_inner());
                }
                *count -= 1;
                AcquireResult::Acquired
            }
            Some(timeout) => {
                if *count == 0 && timeout.is_zero() {
                    return AcquireResult::TimedOut;
                }
                let deadline = std::time::Instant::now() + timeout;
                while *count == 0 {
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        return AcquireResult::TimedOut;
                    }
                    let (c, timed_out) = self
                        .cond
                        .wait_timeout(count, deadline - now)
                        .unwrap_or_else(|e| e.into_inner());
                    count = c;
                    if *count == 0 && timed_out.timed_out() {
                        return AcquireResult::TimedOut;
                    }
                }
                *count -= 1;
                AcquireResult::Acquired
            }
        }
    }

    pub fn release(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        self.cond.notify_one();
    }

    pub fn current_count(&self) -> u64 {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }
}
