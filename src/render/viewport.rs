//! Viewport definition for rendering.
//!
//! A [`Viewport`] describes how world coordinates of a payload map onto a
//! rendering surface: a screen-space `position` offset and a uniform `zoom`
//! factor. Every backend receives the same viewport snapshot; a new value
//! replaces the previous one as a whole, there are no partial updates.
//!
//! A world point `p` lands on the surface at `position + p * zoom`.
//!
//! # Examples
//!
//! ```
//! use viewer2d::render::{Point, Viewport};
//!
//! let vp = Viewport::new(10.0, 0.0, 2.0);
//! assert_eq!(vp.world_to_screen(Point::new(5.0, 5.0)), Point::new(20.0, 10.0));
//! assert_eq!(vp.screen_to_world(Point::new(20.0, 10.0)), Point::new(5.0, 5.0));
//! ```
//!
//! A non-positive zoom is clamped:
//! ```
//! use viewer2d::render::{Viewport, MIN_ZOOM};
//!
//! let vp = Viewport::new(0.0, 0.0, -1.0);
//! assert_eq!(vp.zoom, MIN_ZOOM);
//! ```

use crate::render::geometry::Point;
use serde::{Deserialize, Serialize};

/// Smallest zoom factor a viewport can carry.
pub const MIN_ZOOM: f64 = 1e-6;

/// Represents the viewport for rendering.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Screen-space offset applied after scaling.
    pub position: Point,

    /// Uniform scale factor, always strictly positive.
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            position: Point::new(0.0, 0.0),
            zoom: 1.0,
        }
    }
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Viewport {{ x: {}, y: {}, zoom: {} }}",
            self.position.x, self.position.y, self.zoom
        )
    }
}

impl Viewport {
    /// Creates a new [`Viewport`] at `(x, y)` with the given zoom.
    ///
    /// A zoom that is not a finite positive number is replaced by [`MIN_ZOOM`].
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() && zoom > 0.0 {
            zoom
        } else {
            log::warn!("Viewport: invalid zoom {zoom}, clamping to {MIN_ZOOM}");
            MIN_ZOOM
        };

        Self {
            position: Point::new(x, y),
            zoom,
        }
    }

    /// Returns a copy of this viewport moved by `(dx, dy)` in screen space.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            position: Point::new(self.position.x + dx, self.position.y + dy),
            zoom: self.zoom,
        }
    }

    /// Maps a world point onto the surface.
    pub fn world_to_screen(&self, p: Point) -> Point {
        Point::new(self.position.x + p.x * self.zoom, self.position.y + p.y * self.zoom)
    }

    /// Maps a surface point back into world coordinates.
    pub fn screen_to_world(&self, p: Point) -> Point {
        Point::new((p.x - self.position.x) / self.zoom, (p.y - self.position.y) / self.zoom)
    }
}
