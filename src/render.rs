pub mod backend;

/// Reference rendering backends.
pub mod backends {
    /// Backend that draws nothing and records what it was asked to draw
    pub mod null;
    /// CPU raster backend drawing into an RGBA buffer
    pub mod raster;
}

mod geometry;
mod patch;
mod payload;
mod picking;
mod viewport;

pub use backend::{BackendCapabilities, Renderer, RendererBuilder, SurfaceRequest, SurfaceSize};
pub use geometry::{Point, Rect, SurfaceRegion};
pub use patch::{apply_patches, Patch, PatchOp, PatchReport};
pub use payload::{Color, Payload, Shape};
pub use picking::{hit_test, PickingMode, PickingOptions, PickingResult};
pub use viewport::{Viewport, MIN_ZOOM};
