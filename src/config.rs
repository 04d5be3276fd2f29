use crate::controller::RendererStats;
use crate::errors::ConfigError;
use crate::sync::RenderMode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);
const DEFAULT_STATS_TIMEOUT: Duration = Duration::from_millis(250);

/// Invoked with fresh statistics whenever a controller measured new frames.
pub type StatsCallback = Arc<dyn Fn(&RendererStats) + Send + Sync>;

#[derive(Clone)]
pub struct ProfilingConfig {
    pub on_renderer_stats_updated: StatsCallback,
}

impl ProfilingConfig {
    pub fn new(callback: impl Fn(&RendererStats) + Send + Sync + 'static) -> Self {
        Self { on_renderer_stats_updated: Arc::new(callback) }
    }

    pub(crate) fn report(&self, stats: &RendererStats) {
        (self.on_renderer_stats_updated)(stats);
    }
}

impl std::fmt::Debug for ProfilingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingConfig")
            .field("on_renderer_stats_updated", &"Fn(&RendererStats)")
            .finish()
    }
}

/// Configuration shared by every controller a factory creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FactoryConfig {
    /// When controllers draw
    pub render_mode: RenderMode,
    /// Profiling hooks. Not part of the serialized form.
    #[serde(skip)]
    pub profiling: Option<ProfilingConfig>,
    /// Frame interval of isolated contexts
    #[serde(with = "millis")]
    pub frame_interval: Duration,
    /// How long a request/response round-trip to a context may take
    #[serde(with = "millis")]
    pub stats_timeout: Duration,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::OnDemand,
            profiling: None,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            stats_timeout: DEFAULT_STATS_TIMEOUT,
        }
    }
}

impl FactoryConfig {
    pub fn with_profiling(mut self, profiling: ProfilingConfig) -> Self {
        self.profiling = Some(profiling);
        self
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_interval.is_zero() {
            return Err(ConfigError::ZeroFrameInterval);
        }
        Ok(())
    }
}

/// Durations as whole milliseconds on the wire.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_config_from_partial_json() {
        let config = FactoryConfig::from_json(r#"{"renderMode":"continuous","frameInterval":8}"#).unwrap();
        assert_eq!(config.render_mode, RenderMode::Continuous);
        assert_eq!(config.frame_interval, Duration::from_millis(8));
        assert_eq!(config.stats_timeout, DEFAULT_STATS_TIMEOUT);
        assert!(config.profiling.is_none());
    }

    #[test]
    fn zero_frame_interval_is_rejected() {
        let config = FactoryConfig::from_json(r#"{"frameInterval":0}"#).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::ZeroFrameInterval));
        assert_eq!(FactoryConfig::default().validate(), Ok(()));
    }

    #[test]
    fn factory_config_serializes_millis() {
        let json = serde_json::to_value(FactoryConfig::default()).unwrap();
        assert_eq!(json["frameInterval"], 16);
        assert_eq!(json["renderMode"], "onDemand");
    }
}
