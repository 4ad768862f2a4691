use std::time::{Duration, Instant};

use super::types::{RestartDecision, RestartState, RESTART_DELAY_CAP_SECS};
use crate::config::SupervisionConfig;

/// Sliding-window exponential-backoff circuit breaker.
///
/// Isolated crashes get small counts and short delays; a crash-restart
/// storm escalates the delay up to a hard cap and is eventually denied
/// outright. The window slides against the last restart, so a worker
/// that stays up longer than the window earns a clean slate.
#[derive(Clone, Debug)]
pub struct RestartPolicy {
    base_delay: Duration,
    max_restarts: u32,
    window: Duration,
    max_delay: Duration,
}

impl RestartPolicy {
    pub fn new(base_delay: Duration, max_restarts: u32, window: Duration) -> Self {
        Self {
            base_delay,
            max_restarts,
            window,
            max_delay: Duration::from_secs(RESTART_DELAY_CAP_SECS),
        }
    }

    pub fn from_config(config: &SupervisionConfig) -> Self {
        Self::new(
            config.restart_delay(),
            config.max_restarts,
            config.restart_window(),
        )
    }

    /// Decide whether the worker may be relaunched and after what delay,
    /// updating the restart accounting as a side effect.
    pub fn decide(&self, state: &mut RestartState, now: Instant) -> RestartDecision {
        let within_window = state
            .last_restart
            .map(|last| now.duration_since(last) <= self.window)
            .unwrap_or(false);

        if within_window {
            state.count += 1;
        } else {
            state.count = 1;
            state.window_start = Some(now);
        }
        state.last_restart = Some(now);

        if state.count > self.max_restarts {
            return RestartDecision::Deny;
        }

        RestartDecision::Allow(self.delay_for(state.count))
    }

    /// `min(base * 2^(attempt - 1), cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let raw = self.base_delay.as_millis().saturating_mul(1u128 << exp);
        let capped = raw.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(base_secs: u64, max_restarts: u32, window_secs: u64) -> RestartPolicy {
        RestartPolicy::new(
            Duration::from_secs(base_secs),
            max_restarts,
            Duration::from_secs(window_secs),
        )
    }

    #[test]
    fn first_crash_gets_base_delay() {
        let policy = policy(30, 5, 3600);
        let mut state = RestartState::default();
        let decision = policy.decide(&mut state, Instant::now());
        assert_eq!(decision, RestartDecision::Allow(Duration::from_secs(30)));
        assert_eq!(state.count, 1);
    }

    #[test]
    fn rapid_crash_sequence_escalates_and_denies() {
        // spec scenario: base=30, max=5 -> 30, 60, 120, 240, 300 (capped), Deny
        let policy = policy(30, 5, 3600);
        let mut state = RestartState::default();
        let start = Instant::now();

        let expected = [30u64, 60, 120, 240, 300];
        for (i, want) in expected.iter().enumerate() {
            let now = start + Duration::from_secs(i as u64);
            match policy.decide(&mut state, now) {
                RestartDecision::Allow(delay) => {
                    assert_eq!(delay, Duration::from_secs(*want), "attempt {}", i + 1)
                }
                RestartDecision::Deny => panic!("denied too early at attempt {}", i + 1),
            }
        }

        let decision = policy.decide(&mut state, start + Duration::from_secs(5));
        assert_eq!(decision, RestartDecision::Deny);
        assert_eq!(state.count, 6);
    }

    #[test]
    fn window_expiry_resets_count_to_one() {
        let policy = policy(30, 5, 60);
        let mut state = RestartState::default();
        let start = Instant::now();

        for i in 0..4 {
            policy.decide(&mut state, start + Duration::from_secs(i));
        }
        assert_eq!(state.count, 4);

        // Worker stayed up past the window: clean slate regardless of
        // prior count.
        let later = start + Duration::from_secs(120);
        let decision = policy.decide(&mut state, later);
        assert_eq!(decision, RestartDecision::Allow(Duration::from_secs(30)));
        assert_eq!(state.count, 1);
        assert_eq!(state.window_start, Some(later));
    }

    #[test]
    fn crash_exactly_at_window_edge_still_counts() {
        let policy = policy(30, 5, 60);
        let mut state = RestartState::default();
        let start = Instant::now();

        policy.decide(&mut state, start);
        policy.decide(&mut state, start + Duration::from_secs(60));
        assert_eq!(state.count, 2);
    }

    #[test]
    fn delay_is_capped_at_five_minutes() {
        let policy = policy(30, 20, 3600);
        assert_eq!(policy.delay_for(5), Duration::from_secs(300));
        assert_eq!(policy.delay_for(12), Duration::from_secs(300));
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let policy = policy(30, u32::MAX, 3600);
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(300));
    }

    proptest! {
        #[test]
        fn delay_formula_holds(base in 1u64..600, attempt in 1u32..40) {
            let policy = policy(base, u32::MAX, 3600);
            let expected = (base as u128)
                .saturating_mul(1u128 << (attempt - 1).min(63))
                .min(RESTART_DELAY_CAP_SECS as u128);
            prop_assert_eq!(
                policy.delay_for(attempt),
                Duration::from_secs(expected as u64)
            );
        }

        #[test]
        fn rapid_crashes_denied_beyond_budget(max in 1u32..10, crashes in 1u32..30) {
            let policy = policy(1, max, 3600);
            let mut state = RestartState::default();
            let start = Instant::now();
            let mut denied_at = None;
            for i in 0..crashes {
                let decision = policy.decide(&mut state, start + Duration::from_millis(i as u64));
                if decision == RestartDecision::Deny && denied_at.is_none() {
                    denied_at = Some(i + 1);
                }
            }
            // Every attempt past the budget is denied, none before.
            if crashes > max {
                prop_assert_eq!(denied_at, Some(max + 1));
            } else {
                prop_assert_eq!(denied_at, None);
            }
        }
    }
}
