pub mod config;
pub mod context;
pub mod controller;
pub mod dispatcher;
pub mod errors;
pub mod pool;
pub mod render;
pub mod sync;

pub use config::{FactoryConfig, ProfilingConfig};
pub use controller::{ControllerVariant, RendererController, RendererControllerFactory, RendererStats};
pub use dispatcher::RenderDispatcher;
pub use errors::{ConfigError, ControllerError, DispatchError};
pub use pool::{ExecutorPoolConfig, FrameTimeThresholds, RegionLayout};
pub use sync::{FrameTime, RenderMode, RenderSyncContext};
