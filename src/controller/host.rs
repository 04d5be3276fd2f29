use crate::config::ProfilingConfig;
use crate::controller::{ControllerVariant, FrameStats, RendererStats};
use crate::render::{Patch, Payload, PickingOptions, PickingResult, Renderer, SurfaceRegion, SurfaceSize, Viewport};
use crate::sync::{lock, FrameTime, RenderMode, RenderSyncContext};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Forwards the stats of a single-renderer controller to the profiling callback.
#[derive(Clone, Debug)]
pub(crate) struct StatsReporter {
    pub profiling: ProfilingConfig,
    pub variant: ControllerVariant,
}

/// A renderer together with the state its controller keeps for it.
///
/// Lives wherever the renderer lives: behind a [`DirectController`](super::DirectController)
/// in the caller's context, or inside a context worker.
pub(crate) struct RendererHost {
    name: String,
    renderer: Arc<Mutex<Box<dyn Renderer>>>,
    sync: RenderSyncContext,
    stats: Arc<Mutex<FrameStats>>,
    has_payload: bool,
    viewport: Viewport,
    region: SurfaceRegion,
    visible: bool,
    disposed: bool,
    reporter: Option<StatsReporter>,
}

impl RendererHost {
    pub fn new(renderer: Box<dyn Renderer>, mode: RenderMode, reporter: Option<StatsReporter>) -> Self {
        let name = renderer.name().to_string();
        let renderer = Arc::new(Mutex::new(renderer));
        let stats = Arc::new(Mutex::new(FrameStats::default()));
        let sync = RenderSyncContext::new(mode);

        let (draw_renderer, draw_stats, draw_name) = (renderer.clone(), stats.clone(), name.clone());
        sync.register(move |frame: FrameTime| {
            let started = Instant::now();
            let result = lock(&draw_renderer).render_internal(frame);
            match result {
                Ok(()) => lock(&draw_stats).record(started.elapsed()),
                Err(e) => log::error!("{draw_name}: frame {} failed: {e:#}", frame.frame),
            }
        });

        Self {
            name,
            renderer,
            sync,
            stats,
            has_payload: false,
            viewport: Viewport::default(),
            region: SurfaceRegion::default(),
            visible: true,
            disposed: false,
            reporter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self) {
        if self.has_payload && self.visible && !self.disposed {
            self.sync.schedule_render();
        }
    }

    /// Viewport as seen from inside the renderer's region.
    fn local_viewport(&self) -> Viewport {
        self.viewport.translated(-(self.region.x as f64), -(self.region.y as f64))
    }

    pub fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;
        lock(&self.renderer).set_visibility(visible);
        self.schedule();
    }

    pub fn set_size(&mut self, size: SurfaceSize) {
        lock(&self.renderer).set_size(size);
        self.schedule();
    }

    pub fn set_region(&mut self, region: SurfaceRegion) {
        self.region = region;
        let local = self.local_viewport();
        {
            let mut renderer = lock(&self.renderer);
            renderer.set_region(region);
            renderer.set_size(region.into());
            renderer.set_viewport(local);
        }
        self.schedule();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let local = self.local_viewport();
        lock(&self.renderer).set_viewport(local);
        self.schedule();
    }

    pub fn render(&mut self, payload: Payload) {
        self.has_payload = true;
        lock(&self.renderer).render(payload);
        self.schedule();
    }

    pub fn render_patches(&mut self, patches: &[Patch]) {
        if !self.has_payload {
            log::debug!("{}: dropping {} patches, no payload yet", self.name, patches.len());
            return;
        }
        lock(&self.renderer).render_patches(patches);
        self.schedule();
    }

    /// Runs one frame. Returns true when the renderer drew.
    pub fn tick(&mut self, frame: FrameTime) -> bool {
        if self.disposed || !self.visible {
            return false;
        }
        let drawn = self.sync.tick(frame);
        if drawn {
            if let Some(reporter) = &self.reporter {
                reporter.profiling.report(&RendererStats {
                    backend: self.name.clone(),
                    variant: reporter.variant,
                    frame: self.stats(),
                    executors: Vec::new(),
                });
            }
        }
        drawn
    }

    /// Picks with a query already in region-local coordinates.
    pub fn pick(&mut self, options: &PickingOptions) -> Vec<PickingResult> {
        if !self.visible || self.disposed {
            return Vec::new();
        }
        lock(&self.renderer).pick_objects(options)
    }

    pub fn stats(&self) -> FrameStats {
        *lock(&self.stats)
    }

    /// Live view on the stats, updated after every completed frame.
    pub fn shared_stats(&self) -> Arc<Mutex<FrameStats>> {
        self.stats.clone()
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.has_payload = false;
        lock(&self.renderer).dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::null::NullRenderer;
    use crate::render::{Color, Shape};
    use std::time::Duration;

    fn host() -> (RendererHost, crate::render::backends::null::NullProbe) {
        let renderer = NullRenderer::new("null");
        let probe = renderer.probe();
        (RendererHost::new(Box::new(renderer), RenderMode::OnDemand, None), probe)
    }

    fn frame(n: u64) -> FrameTime {
        FrameTime::new(n, Duration::from_millis(n * 16))
    }

    #[test]
    fn nothing_drawn_before_a_payload() {
        let (mut host, probe) = host();
        host.set_viewport(Viewport::new(1.0, 1.0, 1.0));
        host.render_patches(&[Patch::add("r", vec![])]);

        assert!(!host.tick(frame(1)));
        assert_eq!(probe.record().frames, 0);
        assert_eq!(probe.record().patch_batches, 0);
    }

    #[test]
    fn updates_between_ticks_draw_once() {
        let (mut host, probe) = host();
        host.render(Payload::new().with_field("r", vec![Shape::rectangle(0.0, 0.0, 1.0, 1.0, Color::BLACK)]));
        host.set_viewport(Viewport::new(5.0, 0.0, 1.0));
        host.render_patches(&[Patch::add("r", vec![Shape::circle(0.0, 0.0, 1.0, Color::BLACK)])]);

        assert!(host.tick(frame(1)));
        assert!(!host.tick(frame(2)));

        let rec = probe.record();
        assert_eq!(rec.frames, 1);
        assert_eq!(rec.last_frame, Some(frame(1)));
        assert_eq!(rec.drawn_payload.unwrap().len(), 2);
        assert_eq!(host.stats().frames, 1);
    }

    #[test]
    fn region_offset_shifts_viewport() {
        let (mut host, probe) = host();
        host.render(Payload::new());
        host.set_viewport(Viewport::new(100.0, 20.0, 2.0));
        host.set_region(SurfaceRegion::new(40, 10, 60, 50));
        host.tick(frame(1));

        let rec = probe.record();
        assert_eq!(rec.drawn_viewport, Some(Viewport::new(60.0, 10.0, 2.0)));
        assert_eq!(rec.size, SurfaceSize::new(60, 50));
        assert_eq!(rec.region, SurfaceRegion::new(40, 10, 60, 50));
    }

    #[test]
    fn shared_stats_follow_completed_frames() {
        let (mut host, _probe) = host();
        let shared = host.shared_stats();
        host.render(Payload::new());
        assert_eq!(lock(&shared).frames, 0);

        host.tick(frame(1));
        assert_eq!(lock(&shared).frames, 1);
    }

    #[test]
    fn invisible_host_neither_draws_nor_picks() {
        let (mut host, probe) = host();
        host.render(Payload::new().with_field("r", vec![Shape::rectangle(0.0, 0.0, 10.0, 10.0, Color::BLACK)]));
        host.set_visibility(false);

        assert!(!host.tick(frame(1)));
        assert!(host.pick(&PickingOptions::at(1.0, 1.0)).is_empty());
        assert_eq!(probe.record().frames, 0);

        host.set_visibility(true);
        assert!(host.tick(frame(2)));
        assert_eq!(host.pick(&PickingOptions::at(1.0, 1.0)).len(), 1);
    }

    #[test]
    fn profiling_sees_each_draw() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = StatsReporter {
            profiling: ProfilingConfig::new(move |stats: &RendererStats| sink.lock().unwrap().push(stats.frame.frames)),
            variant: ControllerVariant::Direct,
        };
        let mut host = RendererHost::new(Box::new(NullRenderer::new("null")), RenderMode::Continuous, Some(reporter));
        host.render(Payload::new());

        host.tick(frame(1));
        host.tick(frame(2));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn dispose_is_idempotent() {
        let (mut host, probe) = host();
        host.render(Payload::new());
        host.dispose();
        host.dispose();

        assert!(probe.record().disposed);
        assert!(!host.tick(frame(1)));
    }
}
