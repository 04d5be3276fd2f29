use crate::render::backend::{BackendCapabilities, Renderer, RendererBuilder, SurfaceRequest, SurfaceSize};
use crate::render::{apply_patches, hit_test, Patch, Payload, PickingOptions, PickingResult, SurfaceRegion, Viewport};
use crate::sync::{lock, FrameTime};
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Everything a [`NullRenderer`] was asked to do, readable from other contexts.
#[derive(Clone, Debug, Default)]
pub struct NullRecord {
    /// Number of frames drawn
    pub frames: u64,
    /// Frame time of the last draw
    pub last_frame: Option<FrameTime>,
    /// Viewport used by the last draw
    pub drawn_viewport: Option<Viewport>,
    /// Payload used by the last draw
    pub drawn_payload: Option<Payload>,
    /// Latest payload received (after patches)
    pub payload: Option<Payload>,
    /// Number of patch batches applied
    pub patch_batches: usize,
    pub size: SurfaceSize,
    pub region: SurfaceRegion,
    pub visible: bool,
    pub disposed: bool,
}

/// Shared view on the [`NullRecord`] of one renderer.
#[derive(Clone, Debug, Default)]
pub struct NullProbe(Arc<Mutex<NullRecord>>);

impl NullProbe {
    pub fn record(&self) -> NullRecord {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, NullRecord> {
        lock(&self.0)
    }
}

/// Null renderer that does not perform any drawing.
pub struct NullRenderer {
    name: String,
    probe: NullProbe,
    payload: Option<Payload>,
    viewport: Viewport,
    visible: bool,
    /// Simulated cost of a single frame
    frame_cost: Option<Duration>,
    crash_on_draw: bool,
}

impl NullRenderer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            probe: NullProbe::default(),
            payload: None,
            viewport: Viewport::default(),
            visible: true,
            frame_cost: None,
            crash_on_draw: false,
        }
    }

    pub fn probe(&self) -> NullProbe {
        self.probe.clone()
    }

    pub fn with_frame_cost(mut self, cost: Duration) -> Self {
        self.frame_cost = Some(cost);
        self
    }
}

impl Renderer for NullRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;
        self.probe.lock().visible = visible;
    }

    fn set_size(&mut self, size: SurfaceSize) {
        self.probe.lock().size = size;
    }

    fn set_region(&mut self, region: SurfaceRegion) {
        self.probe.lock().region = region;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn render(&mut self, payload: Payload) {
        self.probe.lock().payload = Some(payload.clone());
        self.payload = Some(payload);
    }

    fn render_patches(&mut self, patches: &[Patch]) {
        if let Some(payload) = self.payload.as_mut() {
            apply_patches(payload, patches);
            let mut rec = self.probe.lock();
            rec.payload = Some(payload.clone());
            rec.patch_batches += 1;
        }
    }

    fn render_internal(&mut self, frame: FrameTime) -> Result<()> {
        if self.crash_on_draw {
            panic!("{}: simulated renderer crash", self.name);
        }
        if let Some(cost) = self.frame_cost {
            std::thread::sleep(cost);
        }

        let mut rec = self.probe.lock();
        rec.frames += 1;
        rec.last_frame = Some(frame);
        rec.drawn_viewport = Some(self.viewport);
        rec.drawn_payload = self.payload.clone();
        Ok(())
    }

    fn pick_objects(&mut self, options: &PickingOptions) -> Vec<PickingResult> {
        match &self.payload {
            Some(payload) if self.visible => hit_test(payload, &self.viewport, options),
            _ => Vec::new(),
        }
    }

    fn dispose(&mut self) {
        self.payload = None;
        self.probe.lock().disposed = true;
    }
}

/// Builder for [`NullRenderer`]s that keeps a probe for every renderer it built.
#[derive(Clone)]
pub struct NullBuilder {
    name: &'static str,
    capabilities: BackendCapabilities,
    frame_cost: Option<Duration>,
    reject_offscreen: bool,
    builds: Arc<Mutex<Vec<(SurfaceRequest, NullProbe)>>>,
    crash_pending: Arc<Mutex<HashSet<usize>>>,
}

impl NullBuilder {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            capabilities: BackendCapabilities::OFFSCREEN | BackendCapabilities::PICKING,
            frame_cost: None,
            reject_offscreen: false,
            builds: Arc::new(Mutex::new(Vec::new())),
            crash_pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Every built renderer blocks its context for `cost` on each frame.
    pub fn with_frame_cost(mut self, cost: Duration) -> Self {
        self.frame_cost = Some(cost);
        self
    }

    /// Fail every offscreen build, as a host without offscreen surfaces would.
    pub fn rejecting_offscreen(mut self) -> Self {
        self.reject_offscreen = true;
        self
    }

    /// The next renderer built for `executor` panics on its first frame.
    pub fn crash_next(&self, executor: usize) {
        lock(&self.crash_pending).insert(executor);
    }

    /// All requests served so far, with the probe of the renderer built for each.
    pub fn builds(&self) -> Vec<(SurfaceRequest, NullProbe)> {
        lock(&self.builds).clone()
    }

    /// Probe of the most recent renderer built for `executor`.
    pub fn executor_probe(&self, executor: usize) -> Option<NullProbe> {
        self.builds()
            .into_iter()
            .rev()
            .find(|(req, _)| req.executor == Some(executor))
            .map(|(_, probe)| probe)
    }
}

impl RendererBuilder for NullBuilder {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn build(&self, request: &SurfaceRequest) -> Result<Box<dyn Renderer>> {
        if request.offscreen && self.reject_offscreen {
            bail!("{}: offscreen surfaces are not available", self.name);
        }

        let mut renderer = NullRenderer::new(self.name);
        if let Some(cost) = self.frame_cost {
            renderer = renderer.with_frame_cost(cost);
        }
        if let Some(index) = request.executor {
            renderer.crash_on_draw = lock(&self.crash_pending).remove(&index);
        }

        lock(&self.builds).push((*request, renderer.probe()));
        Ok(Box::new(renderer))
    }
}
