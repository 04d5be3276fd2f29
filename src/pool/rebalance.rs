use crate::pool::config::ExecutorPoolConfig;
use std::time::Duration;

/// Outcome of one rebalance tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceDecision {
    Grow,
    Shrink,
    Hold,
}

impl RebalanceDecision {
    /// Executor count after applying the decision to `n`.
    pub fn apply(self, n: usize) -> usize {
        match self {
            RebalanceDecision::Grow => n + 1,
            RebalanceDecision::Shrink => n.saturating_sub(1),
            RebalanceDecision::Hold => n,
        }
    }
}

/// Mean of the reported frame times, `None` when nothing was reported.
pub fn average(samples: &[Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let total: Duration = samples.iter().sum();
    Some(total / samples.len() as u32)
}

/// Decides a single step for a pool of `n` executors.
///
/// Moves by at most one executor and never leaves `[min, max]`.
pub fn decide(average: Option<Duration>, n: usize, config: &ExecutorPoolConfig) -> RebalanceDecision {
    let Some(avg) = average else {
        return RebalanceDecision::Hold;
    };
    if config.is_static() {
        return RebalanceDecision::Hold;
    }

    let t = config.thresholds();
    if avg > t.too_slow && n < config.max_executors {
        RebalanceDecision::Grow
    } else if avg < t.too_fast && n > config.min_executors {
        RebalanceDecision::Shrink
    } else {
        RebalanceDecision::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Option<Duration> {
        Some(Duration::from_millis(v))
    }

    fn config() -> ExecutorPoolConfig {
        ExecutorPoolConfig::new(["rectangles"]).with_bounds(1, 4)
    }

    #[test]
    fn grows_when_slow_and_shrinks_when_fast() {
        let c = config();
        assert_eq!(decide(ms(30), 2, &c), RebalanceDecision::Grow);
        assert_eq!(decide(ms(2), 2, &c), RebalanceDecision::Shrink);
        assert_eq!(decide(ms(10), 2, &c), RebalanceDecision::Hold);
    }

    #[test]
    fn bounds_turn_steps_into_no_ops() {
        let c = config();
        assert_eq!(decide(ms(30), 4, &c), RebalanceDecision::Hold);
        assert_eq!(decide(ms(1), 1, &c), RebalanceDecision::Hold);
    }

    #[test]
    fn static_pool_never_moves() {
        let c = ExecutorPoolConfig::new(["rectangles"]).with_bounds(3, 3);
        assert_eq!(decide(ms(100), 3, &c), RebalanceDecision::Hold);
        assert_eq!(decide(ms(0), 3, &c), RebalanceDecision::Hold);
    }

    #[test]
    fn no_samples_means_hold() {
        assert_eq!(decide(None, 2, &config()), RebalanceDecision::Hold);
        assert_eq!(average(&[]), None);
    }

    #[test]
    fn step_is_at_most_one() {
        let c = config();
        for n in 1..=4 {
            for avg in [0u64, 4, 5, 10, 16, 17, 100] {
                let next = decide(ms(avg), n, &c).apply(n);
                assert!(next.abs_diff(n) <= 1);
                assert!((1..=4).contains(&next));
            }
        }
    }

    #[test]
    fn average_of_samples() {
        let samples = [Duration::from_millis(10), Duration::from_millis(20)];
        assert_eq!(average(&samples), ms(15));
    }
}
