//! CPU raster backend.
//!
//! [`RasterRenderer`] keeps an RGBA8 buffer the size of its surface region and
//! paints rectangles, ellipses and circles into it with source-over blending.
//! Text has no glyph rendering here; a text shape is painted as the outline of
//! its estimated bounds. Finished frames are handed to an optional
//! [`CompositorSink`], which is how a host collects the output of renderers
//! living in isolated contexts.

use crate::render::backend::{
    BackendCapabilities, PixelFormat, Renderer, RendererBuilder, RgbaImage, SurfaceRequest, SurfaceSize,
};
use crate::render::{apply_patches, hit_test, Patch, Payload, PickingOptions, PickingResult, Point, Shape, SurfaceRegion, Viewport};
use crate::sync::FrameTime;
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Receives frames produced by raster renderers.
pub trait CompositorSink: Send + Sync {
    fn submit_frame(&self, executor: Option<usize>, region: SurfaceRegion, frame: RgbaImage);
}

/// Sink that keeps the latest frame per executor slot.
#[derive(Default)]
pub struct LatestFrames {
    frames: Mutex<BTreeMap<Option<usize>, (SurfaceRegion, RgbaImage)>>,
}

impl LatestFrames {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, executor: Option<usize>) -> Option<(SurfaceRegion, RgbaImage)> {
        self.frames.lock().ok()?.get(&executor).cloned()
    }

    /// Number of slots that delivered at least one frame.
    pub fn len(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CompositorSink for LatestFrames {
    fn submit_frame(&self, executor: Option<usize>, region: SurfaceRegion, frame: RgbaImage) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.insert(executor, (region, frame));
        }
    }
}

pub struct RasterRenderer {
    executor: Option<usize>,
    region: SurfaceRegion,
    size: SurfaceSize,
    pixels: Vec<u8>,
    viewport: Viewport,
    payload: Option<Payload>,
    visible: bool,
    sink: Option<Arc<dyn CompositorSink>>,
}

impl RasterRenderer {
    pub fn new(request: &SurfaceRequest, sink: Option<Arc<dyn CompositorSink>>) -> Self {
        let size = SurfaceSize::from(request.region);
        Self {
            executor: request.executor,
            region: request.region,
            size,
            pixels: vec![0; (size.width as usize) * (size.height as usize) * 4],
            viewport: Viewport::default(),
            payload: None,
            visible: true,
            sink,
        }
    }

    /// Copy of the current buffer.
    pub fn snapshot(&self) -> RgbaImage {
        RgbaImage::from_raw(
            self.pixels.clone(),
            self.size.width,
            self.size.height,
            self.size.width * 4,
            PixelFormat::Rgba8,
        )
    }

    fn clear(&mut self) {
        self.pixels.iter_mut().for_each(|b| *b = 0);
    }

    fn blend(&mut self, x: i64, y: i64, rgba: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.size.width as i64 || y >= self.size.height as i64 {
            return;
        }
        let offset = ((y as usize) * (self.size.width as usize) + x as usize) * 4;
        let dst = &mut self.pixels[offset..offset + 4];
        let a = rgba[3] as u32;
        let inv = 255 - a;
        for c in 0..3 {
            dst[c] = ((rgba[c] as u32 * a + dst[c] as u32 * inv) / 255) as u8;
        }
        dst[3] = (a + dst[3] as u32 * inv / 255).min(255) as u8;
    }

    /// Paints every pixel whose centre satisfies `inside` within the screen box.
    fn fill(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, rgba: [u8; 4], inside: impl Fn(f64, f64) -> bool) {
        let (w, h) = (self.size.width as f64, self.size.height as f64);
        let xs = x0.max(0.0).floor() as i64;
        let ys = y0.max(0.0).floor() as i64;
        let xe = x1.min(w).ceil() as i64;
        let ye = y1.min(h).ceil() as i64;

        for py in ys..ye {
            for px in xs..xe {
                if inside(px as f64 + 0.5, py as f64 + 0.5) {
                    self.blend(px, py, rgba);
                }
            }
        }
    }

    fn paint(&mut self, shape: &Shape) {
        let vp = self.viewport;
        let rgba = shape.color().to_rgba8();
        let b = shape.bounds();
        let tl = vp.world_to_screen(Point::new(b.x, b.y));
        let br = vp.world_to_screen(Point::new(b.x + b.width, b.y + b.height));

        match shape {
            Shape::Rectangle { .. } => self.fill(tl.x, tl.y, br.x, br.y, rgba, |_, _| true),
            Shape::Ellipse { .. } | Shape::Circle { .. } => {
                let shape = shape.clone();
                self.fill(tl.x, tl.y, br.x, br.y, rgba, move |x, y| shape.contains(vp.screen_to_world(Point::new(x, y))))
            }
            Shape::Text { .. } => {
                self.fill(tl.x, tl.y, br.x, br.y, rgba, |x, y| {
                    x - tl.x < 1.0 || br.x - x < 1.0 || y - tl.y < 1.0 || br.y - y < 1.0
                });
            }
        }
    }
}

impl Renderer for RasterRenderer {
    fn name(&self) -> &str {
        "raster"
    }

    fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_size(&mut self, size: SurfaceSize) {
        if size != self.size {
            self.size = size;
            self.pixels = vec![0; (size.width as usize) * (size.height as usize) * 4];
        }
    }

    fn set_region(&mut self, region: SurfaceRegion) {
        self.region = region;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn render(&mut self, payload: Payload) {
        self.payload = Some(payload);
    }

    fn render_patches(&mut self, patches: &[Patch]) {
        if let Some(payload) = self.payload.as_mut() {
            apply_patches(payload, patches);
        }
    }

    fn render_internal(&mut self, _frame: FrameTime) -> Result<()> {
        self.clear();

        if let Some(payload) = self.payload.take() {
            for shape in payload.shapes() {
                self.paint(shape);
            }
            self.payload = Some(payload);
        }

        if let Some(sink) = &self.sink {
            sink.submit_frame(self.executor, self.region, self.snapshot());
        }
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
        self.pixels = Vec::new();
        self.size = SurfaceSize::default();
    }
}

/// Builds [`RasterRenderer`]s, all delivering into the same sink.
#[derive(Clone, Default)]
pub struct RasterBuilder {
    sink: Option<Arc<dyn CompositorSink>>,
}

impl RasterBuilder {
    pub fn new() -> Self {
        Self { sink: None }
    }

    pub fn with_sink(sink: Arc<dyn CompositorSink>) -> Self {
        Self { sink: Some(sink) }
    }
}

impl RendererBuilder for RasterBuilder {
    fn name(&self) -> &str {
        "raster"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::OFFSCREEN | BackendCapabilities::PICKING
    }

    fn build(&self, request: &SurfaceRequest) -> Result<Box<dyn Renderer>> {
        Ok(Box::new(RasterRenderer::new(request, self.sink.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Color;
    use std::time::Duration;

    fn renderer(w: u32, h: u32) -> RasterRenderer {
        let mut r = RasterRenderer::new(&SurfaceRequest::direct(), None);
        r.set_size(SurfaceSize::new(w, h));
        r
    }

    #[test]
    fn fills_rectangle_through_viewport() {
        let mut r = renderer(20, 20);
        r.set_viewport(Viewport::new(2.0, 2.0, 2.0));
        r.render(Payload::new().with_field(
            "rectangles",
            vec![Shape::rectangle(0.0, 0.0, 2.0, 2.0, Color::from_u8(255, 0, 0, 255))],
        ));
        r.render_internal(FrameTime::new(1, Duration::ZERO)).unwrap();

        let img = r.snapshot();
        // screen box is [2, 6) x [2, 6)
        assert_eq!(img.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(img.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(img.pixel(6, 6), Some([0, 0, 0, 0]));
        assert_eq!(img.pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn circle_leaves_corners_empty() {
        let mut r = renderer(10, 10);
        r.render(Payload::new().with_field("circles", vec![Shape::circle(5.0, 5.0, 5.0, Color::BLACK)]));
        r.render_internal(FrameTime::new(1, Duration::ZERO)).unwrap();

        let img = r.snapshot();
        assert_eq!(img.pixel(5, 5), Some([0, 0, 0, 255]));
        assert_eq!(img.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn frames_reach_the_sink() {
        let sink = LatestFrames::new();
        let builder = RasterBuilder::with_sink(sink.clone());
        let mut r = builder
            .build(&SurfaceRequest::executor(2, SurfaceRegion::new(0, 0, 4, 4)))
            .unwrap();

        r.render(Payload::new());
        r.render_internal(FrameTime::new(1, Duration::ZERO)).unwrap();

        let (region, frame) = sink.get(Some(2)).unwrap();
        assert_eq!(region, SurfaceRegion::new(0, 0, 4, 4));
        assert_eq!((frame.width, frame.height), (4, 4));
    }
}
