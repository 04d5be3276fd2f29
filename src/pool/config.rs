use crate::config::millis;
use crate::errors::ConfigError;
use crate::pool::layout::RegionLayout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_FREQUENCY: Duration = Duration::from_millis(4000);
const DEFAULT_STATS_TIMEOUT: Duration = Duration::from_millis(250);

/// Frame-time bounds steering the executor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameTimeThresholds {
    /// Above this average frame time the pool grows by one executor
    #[serde(with = "millis")]
    pub too_slow: Duration,
    /// Below this average frame time the pool shrinks by one executor
    #[serde(with = "millis")]
    pub too_fast: Duration,
}

impl Default for FrameTimeThresholds {
    fn default() -> Self {
        Self {
            too_slow: Duration::from_millis(16),
            too_fast: Duration::from_millis(5),
        }
    }
}

/// Configuration of an orchestrated executor pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorPoolConfig {
    /// Payload fields split across executors; every other field is copied to all of them
    pub balanced_fields: BTreeSet<String>,
    /// Defaults to [`FrameTimeThresholds::default`] when absent
    pub frame_time_thresholds: Option<FrameTimeThresholds>,
    pub min_executors: usize,
    pub max_executors: usize,
    /// Executors spawned up front. Defaults to `min_executors`.
    pub initial_executors: Option<usize>,
    /// Interval between two rebalance ticks
    #[serde(with = "millis")]
    pub frequency: Duration,
    pub layout: RegionLayout,
    /// Deadline for an executor to answer a stats or pick request
    #[serde(with = "millis")]
    pub stats_timeout: Duration,
}

impl Default for ExecutorPoolConfig {
    fn default() -> Self {
        Self {
            balanced_fields: BTreeSet::new(),
            frame_time_thresholds: None,
            min_executors: 1,
            max_executors: num_cpus::get().max(1),
            initial_executors: None,
            frequency: DEFAULT_FREQUENCY,
            layout: RegionLayout::default(),
            stats_timeout: DEFAULT_STATS_TIMEOUT,
        }
    }
}

impl ExecutorPoolConfig {
    pub fn new<I, S>(balanced_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            balanced_fields: balanced_fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_executors = min;
        self.max_executors = max;
        self
    }

    pub fn with_initial(mut self, initial: usize) -> Self {
        self.initial_executors = Some(initial);
        self
    }

    pub fn with_frequency(mut self, frequency: Duration) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_thresholds(mut self, thresholds: FrameTimeThresholds) -> Self {
        self.frame_time_thresholds = Some(thresholds);
        self
    }

    pub fn with_layout(mut self, layout: RegionLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn thresholds(&self) -> FrameTimeThresholds {
        self.frame_time_thresholds.unwrap_or_default()
    }

    pub fn initial(&self) -> usize {
        self.initial_executors.unwrap_or(self.min_executors)
    }

    /// Resizing is disabled when both bounds are equal.
    pub fn is_static(&self) -> bool {
        self.min_executors == self.max_executors
    }

    pub fn is_balanced(&self, field: &str) -> bool {
        self.balanced_fields.contains(field)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.min_executors, self.max_executors);
        if min == 0 {
            return Err(ConfigError::ZeroMinExecutors);
        }
        if min > max {
            return Err(ConfigError::MinAboveMax { min, max });
        }
        let initial = self.initial();
        if initial < min || initial > max {
            return Err(ConfigError::InitialOutOfRange { initial, min, max });
        }
        if self.frequency.is_zero() {
            return Err(ConfigError::ZeroFrequency);
        }
        let t = self.thresholds();
        if t.too_fast >= t.too_slow {
            return Err(ConfigError::InvertedThresholds);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_host_config() {
        let config = ExecutorPoolConfig::from_json(
            r#"{"balancedFields":["rectangles"],"minExecutors":1,"maxExecutors":4,"frequency":4000}"#,
        )
        .unwrap();

        assert!(config.is_balanced("rectangles"));
        assert_eq!(config.frequency, Duration::from_millis(4000));
        assert_eq!(config.initial(), 1);
        assert_eq!(config.thresholds(), FrameTimeThresholds::default());
        assert_eq!(config.layout, RegionLayout::Layered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn thresholds_in_millis() {
        let config = ExecutorPoolConfig::from_json(r#"{"frameTimeThresholds":{"tooSlow":20,"tooFast":8}}"#).unwrap();
        let t = config.thresholds();
        assert_eq!(t.too_slow, Duration::from_millis(20));
        assert_eq!(t.too_fast, Duration::from_millis(8));
    }

    #[test]
    fn validate_rejects_bad_bounds() {
        let base = ExecutorPoolConfig::new(["r"]);
        assert_eq!(base.clone().with_bounds(0, 2).validate(), Err(ConfigError::ZeroMinExecutors));
        assert_eq!(
            base.clone().with_bounds(3, 2).validate(),
            Err(ConfigError::MinAboveMax { min: 3, max: 2 })
        );
        assert_eq!(
            base.clone().with_bounds(1, 2).with_initial(5).validate(),
            Err(ConfigError::InitialOutOfRange { initial: 5, min: 1, max: 2 })
        );
        assert_eq!(
            base.clone().with_bounds(1, 2).with_frequency(Duration::ZERO).validate(),
            Err(ConfigError::ZeroFrequency)
        );
        let inverted = FrameTimeThresholds {
            too_slow: Duration::from_millis(5),
            too_fast: Duration::from_millis(5),
        };
        assert_eq!(
            base.with_bounds(1, 2).with_thresholds(inverted).validate(),
            Err(ConfigError::InvertedThresholds)
        );
    }
}
