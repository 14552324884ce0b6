//! Delayed execution on top of any clock's timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::Timer;

const PENDING: u8 = 0;
const RAN: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    stopped: Notify,
}

/// Handle to a function scheduled with [`Clock::after_func`](crate::Clock::after_func).
///
/// Dropping the handle does not cancel the call; use [`stop`](AfterFunc::stop).
#[derive(Debug)]
pub struct AfterFunc {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl AfterFunc {
    pub(crate) fn spawn<F>(mut timer: Box<dyn Timer>, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(PENDING),
            stopped: Notify::new(),
        });

        let task = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move {
                tokio::select! {
                    biased;

                    () = shared.stopped.notified() => {}
                    _ = timer.fired() => {
                        // Lost the race against `stop`: skip the call
                        if shared
                            .state
                            .compare_exchange(PENDING, RAN, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                        {
                            f();
                        }
                    }
                }
            }
        });

        Self { shared, task }
    }

    /// Prevents the function from running.
    ///
    /// Returns `true` if this call stopped it, `false` if it already ran (or
    /// is running) or was already stopped.
    pub fn stop(&self) -> bool {
        let stopped = self
            .shared
            .state
            .compare_exchange(PENDING, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if stopped {
            self.shared.stopped.notify_one();
        }
        stopped
    }

    /// Whether the function has been started.
    pub fn has_run(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == RAN
    }

    /// Whether the background task is gone, after running or being stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
