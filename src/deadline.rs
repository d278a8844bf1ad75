//! Cooperative cancellation against a wall-clock deadline.
//!
//! Long analyses poll a [`StopFlag`] between units of work. [`run_with_deadline`] runs
//! the analysis on the calling thread (the BDD manager is not `Send`) while a watchdog
//! thread waits for the deadline, raises the stop flag, and then waits until the analysis
//! reports that it is done.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Shared stop and done flags. Clones observe the same flags.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn set_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Clears both flags so the flag can guard another run.
    pub fn reset(&self) {
        self.stop.store(false, Ordering::Release);
        self.done.store(false, Ordering::Release);
    }
}

/// Runs `f` with `flag`, raising the flag once `timeout` has elapsed.
///
/// Without a timeout `f` simply runs to completion. Either way the done flag is set when
/// `f` returns.
pub fn run_with_deadline<T>(timeout: Option<Duration>, flag: &StopFlag, f: impl FnOnce(&StopFlag) -> T) -> T {
    let Some(timeout) = timeout else {
        let result = f(flag);
        flag.set_done();
        return result;
    };

    let (finished, wait) = mpsc::channel::<()>();
    let watchdog = {
        let flag = flag.clone();
        thread::spawn(move || {
            if let Err(mpsc::RecvTimeoutError::Timeout) = wait.recv_timeout(timeout) {
                warn!("deadline of {:?} reached, stopping", timeout);
                flag.stop();
                let stopped_at = Instant::now();
                while !flag.is_done() {
                    thread::sleep(Duration::from_millis(1));
                }
                debug!("analysis wound down {:?} after the deadline", stopped_at.elapsed());
            }
        })
    };

    let result = f(flag);
    flag.set_done();
    // The watchdog may already have given up waiting on the channel.
    let _ = finished.send(());
    if watchdog.join().is_err() {
        warn!("deadline watchdog panicked");
    }
    result
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_without_timeout() {
        let flag = StopFlag::new();
        let value = run_with_deadline(None, &flag, |flag| {
            assert!(!flag.should_stop());
            42
        });
        assert_eq!(value, 42);
        assert!(flag.is_done());
        assert!(!flag.should_stop());
    }

    #[test]
    fn test_finishes_before_deadline() {
        let flag = StopFlag::new();
        let value = run_with_deadline(Some(Duration::from_secs(60)), &flag, |_| "fast");
        assert_eq!(value, "fast");
        assert!(flag.is_done());
        assert!(!flag.should_stop());
    }

    #[test]
    fn test_deadline_raises_stop() {
        let flag = StopFlag::new();
        let iterations = run_with_deadline(Some(Duration::from_millis(20)), &flag, |flag| {
            let mut n = 0u64;
            while !flag.should_stop() {
                n += 1;
                thread::sleep(Duration::from_millis(1));
            }
            n
        });
        assert!(iterations > 0);
        assert!(flag.should_stop());
        assert!(flag.is_done());

        flag.reset();
        assert!(!flag.should_stop());
        assert!(!flag.is_done());
    }
}
