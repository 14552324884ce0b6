//! Property-based tests for the backoff policy and manager
//!
//! These use proptest to check the policy invariants over a wide range of
//! durations, factors and budgets.

#[cfg(test)]
mod tests {
    use crate::clock::{Clock, FakeClock};
    use crate::retry::{Backoff, BackoffManager, ExponentialBackoffManager};
    use proptest::prelude::*;
    use std::time::Duration;

    // ===== Strategy Generators =====

    fn arb_base() -> impl Strategy<Value = Duration> {
        (1u64..10_000u64).prop_map(Duration::from_millis)
    }

    fn arb_growth_factor() -> impl Strategy<Value = u32> {
        2u32..5u32
    }

    fn arb_budget() -> impl Strategy<Value = u32> {
        1u32..12u32
    }

    // ===== Policy Properties =====

    proptest! {
        /// Property: without cap or jitter each delay is the previous one times factor
        #[test]
        fn prop_growth_multiplies_by_factor(
            base in arb_base(),
            factor in arb_growth_factor(),
            steps in arb_budget(),
        ) {
            let mut backoff = Backoff {
                duration: base,
                factor: f64::from(factor),
                jitter: 0.0,
                steps,
                cap: None,
            };

            let mut previous = backoff.step();
            prop_assert_eq!(previous, base);
            for _ in 1..steps {
                let delay = backoff.step();
                prop_assert!(delay > previous);
                prop_assert_eq!(delay, previous * factor);
                previous = delay;
            }

            // Budget spent: plateau
            prop_assert_eq!(backoff.steps, 0);
            prop_assert_eq!(backoff.step(), previous);
        }

        /// Property: no delay exceeds the cap, and once the cap is handed out
        /// the budget stays at zero
        #[test]
        fn prop_cap_bounds_delays(
            base in arb_base(),
            cap in arb_base(),
            factor in 1.1f64..4.0f64,
            steps in 1u32..64u32,
        ) {
            let mut backoff = Backoff {
                duration: base,
                factor,
                jitter: 0.0,
                steps,
                cap: Some(cap),
            };

            let mut capped = false;
            for _ in 0..80 {
                let delay = backoff.step();
                prop_assert!(delay <= cap, "{:?} exceeds cap {:?}", delay, cap);
                if delay == cap {
                    capped = true;
                }
                if capped {
                    prop_assert_eq!(backoff.steps, 0);
                }
            }
        }

        /// Property: jittered delays stay within [base, base * (1 + jitter)]
        #[test]
        fn prop_jitter_stays_in_bounds(
            base in arb_base(),
            jitter in 0.01f64..2.0f64,
            steps in 0u32..6u32,
        ) {
            let mut backoff = Backoff {
                duration: base,
                factor: 2.0,
                jitter,
                steps,
                cap: None,
            };

            for _ in 0..10 {
                let expected = backoff.duration;
                let delay = backoff.step();
                prop_assert!(delay >= expected);
                prop_assert!(delay <= expected.mul_f64(1.0 + jitter) + Duration::from_nanos(1));
            }
        }

        /// Property: a budget of N is spent after exactly N manager calls
        #[test]
        fn prop_manager_budget_is_exact(steps in arb_budget()) {
            let clock = FakeClock::default();
            let mut manager = ExponentialBackoffManager::new(
                Duration::from_millis(10),
                Duration::ZERO,
                Duration::from_secs(3600),
                steps,
                2.0,
                0.0,
                clock.clone(),
            );

            for call in 1..=steps {
                let (_, remaining) = manager.backoff();
                prop_assert_eq!(remaining, steps - call);
                clock.step(Duration::from_millis(1));
            }
        }

        /// Property: after an idle gap past the threshold the delay matches a fresh manager
        #[test]
        fn prop_idle_reset_matches_fresh_manager(
            calls in 1usize..8usize,
            extra_idle_ms in 1u64..10_000u64,
        ) {
            let clock = FakeClock::default();
            let build = |clock: &FakeClock| {
                ExponentialBackoffManager::new(
                    Duration::from_millis(50),
                    Duration::from_secs(30),
                    Duration::from_secs(60),
                    u32::MAX,
                    2.0,
                    0.0,
                    clock.clone(),
                )
            };

            let mut manager = build(&clock);
            for _ in 0..calls {
                manager.backoff();
                clock.step(Duration::from_millis(10));
            }
            clock.step(Duration::from_secs(60) + Duration::from_millis(extra_idle_ms));

            let now = clock.now();
            let mut fresh = build(&clock);
            let fresh_deadline = fresh.backoff().0.deadline();
            let deadline = manager.backoff().0.deadline();

            prop_assert_eq!(deadline, fresh_deadline);
            prop_assert_eq!(deadline, Some(now + Duration::from_millis(50)));
        }
    }
}
