use crate::render::geometry::SurfaceRegion;
use crate::render::patch::Patch;
use crate::render::payload::Payload;
use crate::render::picking::{PickingOptions, PickingResult};
use crate::render::Viewport;
use crate::sync::FrameTime;
use bitflags::bitflags;

/// Size of a surface in pixels. It's a simple struct to hold width and height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<SurfaceRegion> for SurfaceSize {
    fn from(region: SurfaceRegion) -> Self {
        Self { width: region.width, height: region.height }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
}

/// Small RGBA snapshot of a surface.
#[derive(Clone)]
pub struct RgbaImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

impl RgbaImage {
    pub fn from_raw(pixels: Vec<u8>, width: u32, height: u32, stride: u32, format: PixelFormat) -> Self {
        assert!(
            pixels.len() >= (height as usize) * (stride as usize),
            "pixel buffer too small for image dimensions"
        );

        Self { pixels, width, height, stride, format }
    }

    /// Returns the RGBA bytes at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y * self.stride + x * 4) as usize;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl std::fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

bitflags! {
    /// Capabilities a backend declares before any renderer is built.
    pub struct BackendCapabilities: u8 {
        /// Renderer can draw without a host-owned surface and may live in an isolated context
        const OFFSCREEN = 0b0001;
        /// Renderer answers pick queries
        const PICKING   = 0b0010;
    }
}

/// What a [`RendererBuilder`] is asked to construct.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceRequest {
    /// Renderer will be moved into an isolated context
    pub offscreen: bool,
    /// Executor index for orchestrated pools, `None` otherwise
    pub executor: Option<usize>,
    /// Region of the composed surface the renderer draws into
    pub region: SurfaceRegion,
}

impl SurfaceRequest {
    pub fn direct() -> Self {
        Self {
            offscreen: false,
            executor: None,
            region: SurfaceRegion::default(),
        }
    }

    pub fn offscreen() -> Self {
        Self { offscreen: true, ..Self::direct() }
    }

    pub fn executor(index: usize, region: SurfaceRegion) -> Self {
        Self {
            offscreen: true,
            executor: Some(index),
            region,
        }
    }
}

/// Core renderer interface implemented by every backend adapter.
///
/// All methods except [`render_internal`](Renderer::render_internal) only
/// record state; drawing happens when the owning controller's sync context
/// fires a frame. Calls occur on the renderer's owning context.
pub trait Renderer: Send {
    /// Human readable backend name, used in logs and stats.
    fn name(&self) -> &str;

    fn set_visibility(&mut self, visible: bool);

    fn set_size(&mut self, size: SurfaceSize);

    /// Region of the composed surface this renderer draws into.
    ///
    /// Followed by [`set_size`](Renderer::set_size) and
    /// [`set_viewport`](Renderer::set_viewport) for the new region.
    fn set_region(&mut self, _region: SurfaceRegion) {}

    /// Viewport already adjusted for the renderer's surface region.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Replace the current payload.
    fn render(&mut self, payload: Payload);

    /// Apply a batch of patches to the current payload.
    ///
    /// Only called after at least one [`render`](Renderer::render).
    fn render_patches(&mut self, patches: &[Patch]);

    /// Draw the current state for the given frame.
    fn render_internal(&mut self, frame: FrameTime) -> anyhow::Result<()>;

    /// Pick objects at region-local coordinates.
    fn pick_objects(&mut self, options: &PickingOptions) -> Vec<PickingResult>;

    /// Release surfaces and other resources. No other method is called afterwards.
    fn dispose(&mut self);
}

/// Constructs renderers for one backend.
///
/// A builder is shared between contexts (an orchestrated pool builds one
/// renderer per executor), so it must be `Send + Sync`.
pub trait RendererBuilder: Send + Sync {
    /// Backend name used as the default dispatcher key.
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    fn build(&self, request: &SurfaceRequest) -> anyhow::Result<Box<dyn Renderer>>;
}

impl<F> RendererBuilder for (&'static str, BackendCapabilities, F)
where
    F: Fn(&SurfaceRequest) -> anyhow::Result<Box<dyn Renderer>> + Send + Sync,
{
    fn name(&self) -> &str {
        self.0
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.1
    }

    fn build(&self, request: &SurfaceRequest) -> anyhow::Result<Box<dyn Renderer>> {
        (self.2)(request)
    }
}
