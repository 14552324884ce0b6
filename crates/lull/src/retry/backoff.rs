//! Exponential backoff policy with jitter.

use std::time::Duration;

/// A stateful policy computing successive retry delays.
///
/// Every call to [`step`](Backoff::step) hands out the current delay and then
/// grows the stored base by `factor` for the next call, until the step budget
/// runs out or the cap is reached. From then on the delay stays where it is
/// (steady state), jittered afresh on every call when `jitter > 0`.
///
/// The policy mutates itself, so it is used through `&mut` by exactly one
/// owner at a time. The zero value (`Backoff::default()`) always yields a zero
/// delay.
///
/// # Examples
///
/// ```rust
/// use lull::retry::Backoff;
/// use std::time::Duration;
///
/// let mut backoff = Backoff {
///     duration: Duration::from_secs(1),
///     factor: 2.0,
///     jitter: 0.0,
///     steps: 3,
///     cap: None,
/// };
///
/// assert_eq!(backoff.step(), Duration::from_secs(1));
/// assert_eq!(backoff.step(), Duration::from_secs(2));
/// assert_eq!(backoff.step(), Duration::from_secs(4));
/// // Budget spent: the delay plateaus
/// assert_eq!(backoff.step(), Duration::from_secs(4));
/// assert_eq!(backoff.steps, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Backoff {
    /// Base delay handed out by the next step, before jitter.
    pub duration: Duration,

    /// Growth multiplier applied to `duration` after each step. `0` keeps the
    /// delay constant.
    pub factor: f64,

    /// Jitter fraction: each delay is extended by a random amount in
    /// `[0, jitter * delay]`. `0` disables jitter.
    pub jitter: f64,

    /// Remaining step budget. `0` means steady state (no more growth), not
    /// "stop retrying".
    pub steps: u32,

    /// Upper bound for the base delay. Growing past it (or starting above it)
    /// pins the base to the cap and zeroes the step budget.
    pub cap: Option<Duration>,
}

impl Backoff {
    /// Returns the delay for this attempt and advances the policy.
    pub fn step(&mut self) -> Duration {
        if self.steps == 0 {
            return self.jittered(self.capped(self.duration));
        }
        self.steps -= 1;

        let current = self.capped(self.duration);
        match self.cap {
            Some(cap) if self.duration > cap => {
                self.duration = cap;
                self.steps = 0;
            }
            _ if self.steps > 0 => {
                let next = if self.factor != 0.0 {
                    scale(current, self.factor)
                } else {
                    current
                };
                match self.cap {
                    Some(cap) if next > cap => {
                        self.duration = cap;
                        self.steps = 0;
                    }
                    _ => self.duration = next,
                }
            }
            _ => self.duration = current,
        }

        // Jitter is drawn per step and never folded back into the base.
        self.jittered(current)
    }

    /// Returns a closure that steps an independent copy of this policy.
    ///
    /// ```rust
    /// use lull::retry::Backoff;
    /// use std::time::Duration;
    ///
    /// let backoff = Backoff {
    ///     duration: Duration::from_millis(100),
    ///     factor: 3.0,
    ///     steps: 5,
    ///     ..Backoff::default()
    /// };
    ///
    /// let mut delay = backoff.delay_fn();
    /// assert_eq!(delay(), Duration::from_millis(100));
    /// assert_eq!(delay(), Duration::from_millis(300));
    ///
    /// // The policy itself is untouched
    /// assert_eq!(backoff.steps, 5);
    /// ```
    pub fn delay_fn(&self) -> impl FnMut() -> Duration + Send + 'static {
        let mut backoff = *self;
        move || backoff.step()
    }

    fn capped(&self, duration: Duration) -> Duration {
        match self.cap {
            Some(cap) => duration.min(cap),
            None => duration,
        }
    }

    fn jittered(&self, duration: Duration) -> Duration {
        if self.jitter > 0.0 {
            jitter(duration, self.jitter)
        } else {
            duration
        }
    }
}

/// Steps `policy` if there is one; an absent policy means no delay.
pub fn next_delay(policy: Option<&mut Backoff>) -> Duration {
    policy.map_or(Duration::ZERO, |backoff| backoff.step())
}

/// Returns a random duration in `[duration, duration + max_factor * duration]`.
///
/// A non-positive (or NaN) `max_factor` is treated as `1.0`.
pub fn jitter(duration: Duration, max_factor: f64) -> Duration {
    let max_factor = if max_factor > 0.0 { max_factor } else { 1.0 };
    duration.saturating_add(scale(duration, rand::random::<f64>() * max_factor))
}

/// Multiplies `duration` by `factor`, truncating to whole nanoseconds.
pub(crate) fn scale(duration: Duration, factor: f64) -> Duration {
    // `as` saturates: NaN and negatives become 0, overflow becomes u64::MAX
    Duration::from_nanos((duration.as_nanos() as f64 * factor) as u64)
}
