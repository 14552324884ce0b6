//! A clock that only moves when told to.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::timer::{Phase, TimerState, deadline_after, next_tick};
use crate::{Clock, Ticker, Timer};

/// A manually driven [`Clock`].
///
/// `FakeClock` is a cheap, cloneable handle: every clone, and every timer,
/// ticker or sleep created from it, observes the same fake "now". Time
/// advances only through [`step`](FakeClock::step) and
/// [`set_time`](FakeClock::set_time), which wake everything whose deadline
/// has been reached.
///
/// Nothing here depends on a tokio runtime; futures returned by the clock can
/// be polled by any executor, including `tokio_test::task`.
///
/// # Examples
///
/// ```rust
/// use lull_clock::{Clock, FakeClock};
/// use std::time::Duration;
///
/// let clock = FakeClock::default();
/// let start = clock.now();
///
/// clock.step(Duration::from_secs(90));
/// assert_eq!(clock.since(start), Duration::from_secs(90));
/// ```
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Arc<watch::Sender<Instant>>,
}

impl FakeClock {
    /// Creates a fake clock reading `start`.
    pub fn new(start: Instant) -> Self {
        let (now, _) = watch::channel(start);
        Self { now: Arc::new(now) }
    }

    /// Moves the clock forward by `duration`.
    pub fn step(&self, duration: Duration) {
        self.now.send_modify(|now| *now = deadline_after(*now, duration));
    }

    /// Sets the clock to `instant`.
    ///
    /// Moving backwards is allowed; armed timers keep their deadlines.
    pub fn set_time(&self, instant: Instant) {
        self.now.send_replace(instant);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.now.borrow()
    }

    async fn sleep(&self, duration: Duration) {
        let deadline = deadline_after(self.now(), duration);
        wait_until(&mut self.now.subscribe(), deadline).await;
    }

    fn new_timer(&self, duration: Duration) -> Box<dyn Timer> {
        Box::new(FakeTimer {
            state: TimerState::armed(self.now(), duration),
            now: self.now.subscribe(),
        })
    }

    fn new_ticker(&self, period: Duration) -> Box<dyn Ticker> {
        let period = period.max(Duration::from_nanos(1));
        Box::new(FakeTicker {
            period,
            next: Some(deadline_after(self.now(), period)),
            now: self.now.subscribe(),
        })
    }
}

/// Resolves once the fake time reaches `deadline`. Pends forever if every
/// handle to the clock was dropped.
async fn wait_until(now: &mut watch::Receiver<Instant>, deadline: Instant) {
    let reached = now.wait_for(|now| *now >= deadline).await.is_ok();
    if !reached {
        std::future::pending::<()>().await;
    }
}

/// Timer returned by [`FakeClock::new_timer`].
#[derive(Debug)]
pub struct FakeTimer {
    state: TimerState,
    now: watch::Receiver<Instant>,
}

impl FakeTimer {
    fn current(&self) -> Instant {
        *self.now.borrow()
    }
}

#[async_trait]
impl Timer for FakeTimer {
    async fn fired(&mut self) -> Instant {
        let now = self.current();
        let deadline = match self.state.settle(now) {
            Phase::Idle => return std::future::pending::<Instant>().await,
            Phase::Expired(deadline) => {
                self.state.observe();
                return deadline;
            }
            Phase::Armed(deadline) => deadline,
        };

        wait_until(&mut self.now, deadline).await;
        self.state.observe();
        deadline
    }

    fn stop(&mut self) -> bool {
        let now = self.current();
        self.state.stop(now)
    }

    fn reset(&mut self, duration: Duration) -> bool {
        let now = self.current();
        self.state.reset(now, duration)
    }

    fn drain(&mut self) -> Option<Instant> {
        let now = self.current();
        self.state.drain(now)
    }

    fn deadline(&self) -> Option<Instant> {
        self.state.deadline()
    }
}

/// Ticker returned by [`FakeClock::new_ticker`].
#[derive(Debug)]
pub struct FakeTicker {
    period: Duration,
    next: Option<Instant>,
    now: watch::Receiver<Instant>,
}

#[async_trait]
impl Ticker for FakeTicker {
    async fn tick(&mut self) -> Instant {
        let Some(deadline) = self.next else {
            return std::future::pending::<Instant>().await;
        };

        wait_until(&mut self.now, deadline).await;
        let now = *self.now.borrow();
        self.next = Some(next_tick(deadline, self.period, now));
        deadline
    }

    fn stop(&mut self) {
        self.next = None;
    }
}
