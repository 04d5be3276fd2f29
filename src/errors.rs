/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("min_executors must be at least 1")]
    ZeroMinExecutors,

    #[error("min_executors ({min}) exceeds max_executors ({max})")]
    MinAboveMax { min: usize, max: usize },

    #[error("initial_executors ({initial}) outside [{min}, {max}]")]
    InitialOutOfRange { initial: usize, min: usize, max: usize },

    #[error("rebalance frequency must be non-zero")]
    ZeroFrequency,

    #[error("too_fast threshold must be below too_slow")]
    InvertedThresholds,

    #[error("frame interval must be non-zero")]
    ZeroFrameInterval,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Controller has been disposed")]
    Disposed,

    #[error("Execution context was lost")]
    ContextLost,

    #[error("Renderer construction failed: {0}")]
    Construction(#[source] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Backend '{0}' registered more than once")]
    DuplicateBackend(String),

    #[error("Dispatcher has been disposed")]
    Disposed,

    #[error("Backend '{backend}' failed: {source}")]
    Controller {
        backend: String,
        #[source]
        source: ControllerError,
    },
}
