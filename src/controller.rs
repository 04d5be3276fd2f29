//! Uniform control surface over one rendering backend.
//!
//! A [`RendererController`] hides where its renderer lives. The host calls the
//! same methods whether the renderer draws in the caller's context
//! ([`DirectController`]), in its own task ([`IsolatedController`]) or is
//! spread over a pool of executors ([`OrchestratedController`]).
//!
//! Mutators are fire-and-forget: they only record state and request a frame,
//! and take effect when the owning context next draws. Only
//! [`pick_objects`](RendererController::pick_objects) and
//! [`stats`](RendererController::stats) answer back.

use crate::errors::ControllerError;
use crate::render::{Patch, Payload, PickingOptions, PickingResult, SurfaceSize, Viewport};
use crate::sync::FrameTime;
use futures::future::BoxFuture;
use std::time::Duration;

mod capability;
mod direct;
mod factory;
pub(crate) mod host;
mod isolated;
mod orchestrated;

pub use capability::{select_variant, ControllerVariant, EnvironmentCapabilities};
pub use direct::DirectController;
pub use factory::RendererControllerFactory;
pub use isolated::IsolatedController;
pub use orchestrated::OrchestratedController;

pub type PickFuture = BoxFuture<'static, Result<Vec<PickingResult>, ControllerError>>;
pub type StatsFuture = BoxFuture<'static, Result<RendererStats, ControllerError>>;

/// Frame timings measured inside one execution context.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub frames: u64,
    pub last_frame_time: Option<Duration>,
    /// Mean over every frame drawn so far
    pub average_frame_time: Option<Duration>,
}

impl FrameStats {
    pub(crate) fn record(&mut self, elapsed: Duration) {
        self.frames += 1;
        self.last_frame_time = Some(elapsed);

        let n = self.frames as f64;
        let prev = self.average_frame_time.unwrap_or_default().as_secs_f64();
        self.average_frame_time = Some(Duration::from_secs_f64((prev * (n - 1.0) + elapsed.as_secs_f64()) / n));
    }
}

/// Statistics of one controller, as handed to the profiling callback.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererStats {
    pub backend: String,
    pub variant: ControllerVariant,
    /// Whole-controller timings. For a pool: total frames, mean of the executors' last frame times.
    pub frame: FrameStats,
    /// Per executor, in executor order. Empty unless orchestrated.
    pub executors: Vec<FrameStats>,
}

impl RendererStats {
    pub fn executor_count(&self) -> usize {
        self.executors.len()
    }
}

pub trait RendererController: Send {
    /// Backend name.
    fn name(&self) -> &str;

    fn variant(&self) -> ControllerVariant;

    fn supports_picking(&self) -> bool;

    fn is_disposed(&self) -> bool;

    fn set_visibility(&mut self, visible: bool);

    fn set_size(&mut self, size: SurfaceSize);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Replace the whole payload.
    fn render(&mut self, payload: Payload);

    /// Apply patches to the last full payload. Ignored until a full payload arrived.
    fn render_patches(&mut self, patches: Vec<Patch>);

    /// Query objects at composed-surface coordinates.
    ///
    /// Settles with [`ControllerError::Disposed`] when the controller is
    /// disposed before an answer arrives.
    fn pick_objects(&self, options: PickingOptions) -> PickFuture;

    /// Current statistics.
    ///
    /// Messages sent before this call are processed before it resolves.
    fn stats(&self) -> StatsFuture;

    /// Host frame. Only controllers drawing in the caller's context use it.
    fn tick(&mut self, frame: FrameTime);

    /// Tear down every owned execution context. Idempotent.
    fn dispose(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_stats_running_mean() {
        let mut stats = FrameStats::default();
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(20));
        stats.record(Duration::from_millis(30));

        assert_eq!(stats.frames, 3);
        assert_eq!(stats.last_frame_time, Some(Duration::from_millis(30)));
        let avg = stats.average_frame_time.unwrap().as_secs_f64();
        assert!((avg - 0.020).abs() < 1e-9);
    }
}
