use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Which reset discipline a [`Condition`] follows once signaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// Stays signaled until [`Condition::reset`] is called; wakes every
    /// current waiter, and new waiters after the signal return immediately.
    Manual,
    /// Signaling wakes exactly one waiter and atomically drops back to
    /// unsignaled.
    Auto,
}

/// Outcome of a (possibly timed) wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    TimedOut,
}

/// A condition variable with an explicit manual/auto reset discipline
/// (spec §4.2). Couples a signaled flag, an internal mutex, and an
/// internal condvar so spurious wakeups never leak through to the caller.
pub struct Condition {
    kind: ConditionKind,
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self { kind, signaled: Mutex::new(false), cond: Condvar::new() }
    }

    /// Blocks until signaled.
    pub fn wait(&self) {
        let mut guard = self.signaled.lock().unwrap_or_else(|e| e.into_inner());
        while !*guard {
            guard = self.cond.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
        self.consume_on_auto(&mut guard);
    }

    /// Blocks until signaled or `timeout` elapses. `timeout == Duration::ZERO`
    /// is a non-blocking poll, matching spec's "ms == 0 is a non-blocking
    /// poll".
    pub fn timed_wait(&self, timeout: Duration) -> WaitResult {
        let mut guard = self.signaled.lock().unwrap_or_else(|e| e.into_inner());
        if *guard {
            self.consume_on_auto(&mut guard);
            return WaitResult::Signaled;
        }
        if timeout.is_zero() {
            return WaitResult::TimedOut;
        }

        let deadline = std::time::Instant::now() + timeout;
        loop {
            let now = std::time::Instant::now();
            if now >= deadline {
                return WaitResult::TimedOut;
            }
            let (g, timeout_result) = self
                .cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            guard = g;
            if *guard {
                self.consume_on_auto(&mut guard);
                return WaitResult::Signaled;
            }
            if timeout_result.timed_out() {
                return WaitResult::TimedOut;
            }
        }
    }

    /// Raises the condition. For [`ConditionKind::Manual`] this wakes every
    /// current waiter and stays raised until [`Self::reset`]. For
    /// [`ConditionKind::Auto`] this wakes exactly one waiter and the flag is
    /// consumed by whichever waiter observes it first.
    pub fn set(&self) {
        let mut guard = self.signaled.lock().unwrap_or_else(|e| e.into_inner());
        *guard = true;
        match self.kind {
            ConditionKind::Manual => self.cond.notify_all(),
            ConditionKind::Auto => self.cond.notify_one(),
        }
    }

    /// Lowers the condition. A no-op for `Auto` conditions observed while
    /// already unsignaled.
    pub fn reset(&self) {
        let mut guard = self.signaled.lock().unwrap_or_else(|e| e.into_inner());
        *guard = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn consume_on_auto(&self, guard: &mut bool) {
        if self.kind == ConditionKind::Auto {
            *guard = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn manual_reset_wakes_all_until_reset() {
        let cond = Arc::new(Condition::new(ConditionKind::Manual));
        let woken = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let cond = Arc::clone(&cond);
                let woken = Arc::clone(&woken);
                std::thread::spawn(move || {
                    cond.wait();
                    woken.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(20));
        cond.set();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 3);

        // A waiter arriving after the signal, before reset, doesn't block.
        assert_eq!(cond.timed_wait(Duration::from_millis(10)), WaitResult::Signaled);

        cond.reset();
        assert_eq!(cond.timed_wait(Duration::ZERO), WaitResult::TimedOut);
    }

    #[test]
    fn auto_reset_wakes_exactly_one() {
        let cond = Arc::new(Condition::new(ConditionKind::Auto));
        let woken = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let cond = Arc::clone(&cond);
                let woken = Arc::clone(&woken);
                std::thread::spawn(move || {
                    if cond.timed_wait(Duration::from_millis(300)) == WaitResult::Signaled {
                        woken.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(20));
        cond.set();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(woken.load(Ordering::SeqCst), 1);
    }
}
