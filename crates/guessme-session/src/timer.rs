use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use guessme_types::time_control::TimeControl;
use tokio::{
    task::JoinHandle,
    time::{interval_at, Duration, Instant},
};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

pub type TimeoutCallback = Arc<dyn Fn() + Send + Sync>;

struct TimerInner {
    time_left: AtomicU32,
    running: AtomicBool,
    on_timeout: Mutex<Option<TimeoutCallback>>,
}

/// One-second countdown for timed rounds.
///
/// The tick runs on a tokio task, so `start` must be called inside a
/// runtime. The timeout callback fires once, when the count reaches zero.
pub struct CountdownTimer {
    control: TimeControl,
    inner: Arc<TimerInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CountdownTimer {
    pub fn new(control: TimeControl) -> Self {
        Self {
            control,
            inner: Arc::new(TimerInner {
                time_left: AtomicU32::new(control.round_seconds),
                running: AtomicBool::new(false),
                on_timeout: Mutex::new(None),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn on_timeout<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.inner.on_timeout) = Some(Arc::new(callback));
    }

    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticker.tick().await;
                let left = inner.time_left.load(Ordering::SeqCst);
                if left == 0 {
                    continue;
                }
                let left = left - 1;
                inner.time_left.store(left, Ordering::SeqCst);
                if left == 0 {
                    inner.running.store(false, Ordering::SeqCst);
                    debug!("countdown reached zero");
                    let callback = lock(&inner.on_timeout).clone();
                    if let Some(callback) = callback {
                        callback();
                    }
                    break;
                }
            }
        });
        if let Some(previous) = lock(&self.task).replace(handle) {
            previous.abort();
        }
    }

    /// Freeze the remaining time.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }

    /// Stop and restore the full round; does not restart.
    pub fn reset(&self) {
        self.stop();
        self.inner
            .time_left
            .store(self.control.round_seconds, Ordering::SeqCst);
    }

    pub fn time_left(&self) -> u32 {
        self.inner.time_left.load(Ordering::SeqCst)
    }

    pub fn is_warning(&self) -> bool {
        self.control.is_warning(self.time_left())
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn control(&self) -> TimeControl {
        self.control
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::time::sleep;

    use super::*;

    fn counting(seconds: u32) -> (CountdownTimer, Arc<AtomicUsize>) {
        let timer = CountdownTimer::new(TimeControl::new(seconds));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        timer.on_timeout(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_countdown() {
        let (timer, fired) = counting(3);
        timer.start();

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(timer.time_left(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(timer.time_left(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(timer.time_left(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let (timer, _fired) = counting(10);
        timer.start();
        timer.start();
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(timer.time_left(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_and_reset_restores() {
        let (timer, fired) = counting(5);
        timer.start();
        sleep(Duration::from_millis(2500)).await;
        timer.stop();
        timer.stop();
        let frozen = timer.time_left();
        assert_eq!(frozen, 3);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(timer.time_left(), frozen);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        timer.reset();
        assert_eq!(timer.time_left(), 5);
        assert!(!timer.is_running());
    }

    #[test]
    fn warning_window() {
        let timer = CountdownTimer::new(TimeControl::new(60));
        assert!(!timer.is_warning());
        timer.inner.time_left.store(10, Ordering::SeqCst);
        assert!(timer.is_warning());
        timer.inner.time_left.store(1, Ordering::SeqCst);
        assert!(timer.is_warning());
        timer.inner.time_left.store(0, Ordering::SeqCst);
        assert!(!timer.is_warning());
    }
}
