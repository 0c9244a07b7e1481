use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

pub type TimerCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// One scheduled task (spec §3 "Timer task"). Which of the timer's three
/// arrays currently holds it *is* its position (`scheduled` / `in-queue` /
/// `finished`); `canceled` additionally flags the fourth logical state,
/// "canceled-but-in-flight", observed while the task is mid-callback.
pub struct TimerTask {
    pub(super) id: u64,
    pub(super) callback: TimerCallback,
    pub(super) period: Option<Duration>,
    next_run: Mutex<Instant>,
    pub(super) canceled: AtomicBool,
}

impl TimerTask {
    pub(super) fn new(id: u64, first_run: Instant, period: Option<Duration>, callback: TimerCallback) -> Self {
        Self { id, callback, period, next_run: Mutex::new(first_run), canceled: AtomicBool::new(false) }
    }

    pub fn id(&self) -> u64 { self.id }

    pub fn is_repeating(&self) -> bool { self.period.is_some() }

    pub fn next_run(&self) -> Instant { *self.next_run.lock().unwrap_or_else(|e| e.into_inner()) }

    pub(super) fn advance(&self) {
        if let Some(period) = self.period {
            let mut next_run = self.next_run.lock().unwrap_or_else(|e| e.into_inner());
            *next_run += period;
        }
    }

    pub fn is_canceled(&self) -> bool { self.canceled.load(std::sync::atomic::Ordering::SeqCst) }
}
