use serde::{Deserialize, Serialize};

/// A point in world or surface space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis aligned rectangle with its origin at the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Edges are inclusive on the top-left and exclusive on the bottom-right.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Part of a composed surface that one renderer draws into.
///
/// `(x, y)` is the offset of the region inside the composed surface. A renderer
/// owning the whole surface gets a region at the origin with the full size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl SurfaceRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn offset(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(self.x as f64, self.y as f64, self.width as f64, self.height as f64)
    }

    /// True when `p` (in composed-surface coordinates) falls inside the region.
    ///
    /// A region with an unknown (zero) size is treated as unbounded, since the
    /// host may not have pushed a size yet.
    pub fn contains(&self, p: Point) -> bool {
        if self.width == 0 || self.height == 0 {
            return p.x >= self.x as f64 && p.y >= self.y as f64;
        }
        self.as_rect().contains(p)
    }

    /// Converts a composed-surface point into region-local coordinates.
    pub fn to_local(&self, p: Point) -> Point {
        Point::new(p.x - self.x as f64, p.y - self.y as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_edges() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(r.contains(Point::new(9.99, 9.99)));
        assert!(!r.contains(Point::new(10.0, 5.0)));
    }

    #[test]
    fn region_local_coordinates() {
        let region = SurfaceRegion::new(200, 0, 100, 300);
        assert!(region.contains(Point::new(250.0, 10.0)));
        assert!(!region.contains(Point::new(150.0, 10.0)));
        assert_eq!(region.to_local(Point::new(250.0, 10.0)), Point::new(50.0, 10.0));
    }

    #[test]
    fn unsized_region_is_unbounded() {
        let region = SurfaceRegion::default();
        assert!(region.contains(Point::new(5000.0, 5000.0)));
        assert!(!region.contains(Point::new(-1.0, 0.0)));
    }
}
