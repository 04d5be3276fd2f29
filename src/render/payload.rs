//! Render payloads and shapes.
//!
//! A [`Payload`] is the drawable state of one backend for one frame: a set of
//! named shape collections such as `rectangles`, `ellipses` or `texts`. Each
//! backend decides which collections it understands; the dispatcher only routes
//! payloads by backend name and never looks inside them.
//!
//! # Example
//!
//! ```rust
//! use viewer2d::render::{Color, Payload, Shape};
//!
//! let mut payload = Payload::new();
//! payload.insert("rectangles", vec![
//!     Shape::rectangle(10.0, 20.0, 100.0, 50.0, Color::from_u8(255, 0, 0, 255)),
//! ]);
//!
//! assert_eq!(payload.field("rectangles").map(|f| f.len()), Some(1));
//! assert!(payload.field("texts").is_none());
//! ```

use crate::render::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// RGBA color used by shapes.
///
/// Channels are represented as `f32` in the range `0.0 ..= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel (opacity)
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    /// Creates a new color from `f32` channel values in the range `0.0 ..= 1.0`.
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }

    /// Creates a new color from `u8` channel values in the range `0 ..= 255`.
    pub fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Returns the color as `[r, g, b, a]` bytes.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// A single drawable value inside a payload collection.
///
/// Every variant carries an optional `id`. When present it is the identity of
/// the shape for patching and picking; otherwise the shape is identified by its
/// full value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Shape {
    /// A filled rectangle at `(x, y)` with width `width` and height `height`.
    Rectangle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    },

    /// A filled ellipse inscribed in the box at `(x, y)`.
    Ellipse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Color,
    },

    /// A filled circle centred on `(x, y)`.
    Circle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        x: f64,
        y: f64,
        radius: f64,
        color: Color,
    },

    /// A run of text starting at `(x, y)` with font size `size`.
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        x: f64,
        y: f64,
        text: String,
        size: f64,
        color: Color,
    },
}

impl Shape {
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64, color: Color) -> Self {
        Shape::Rectangle { id: None, x, y, width, height, color }
    }

    pub fn ellipse(x: f64, y: f64, width: f64, height: f64, color: Color) -> Self {
        Shape::Ellipse { id: None, x, y, width, height, color }
    }

    pub fn circle(x: f64, y: f64, radius: f64, color: Color) -> Self {
        Shape::Circle { id: None, x, y, radius, color }
    }

    pub fn text(x: f64, y: f64, text: impl Into<String>, size: f64, color: Color) -> Self {
        Shape::Text { id: None, x, y, text: text.into(), size, color }
    }

    /// Attaches an explicit key to the shape.
    pub fn with_id(mut self, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match &mut self {
            Shape::Rectangle { id, .. }
            | Shape::Ellipse { id, .. }
            | Shape::Circle { id, .. }
            | Shape::Text { id, .. } => *id = key,
        }
        self
    }

    /// Explicit key of the shape, if it has one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Shape::Rectangle { id, .. }
            | Shape::Ellipse { id, .. }
            | Shape::Circle { id, .. }
            | Shape::Text { id, .. } => id.as_deref(),
        }
    }

    /// Identity check used by the patch protocol.
    ///
    /// Two keyed shapes match when their keys are equal. If either side has no
    /// key, the shapes match only when they are structurally equal.
    pub fn matches(&self, other: &Shape) -> bool {
        match (self.key(), other.key()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Bounding box of the shape in world coordinates.
    ///
    /// Text has no layout here, so its box is estimated from the font size.
    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Rectangle { x, y, width, height, .. } | Shape::Ellipse { x, y, width, height, .. } => {
                Rect::new(*x, *y, *width, *height)
            }
            Shape::Circle { x, y, radius, .. } => Rect::new(x - radius, y - radius, radius * 2.0, radius * 2.0),
            Shape::Text { x, y, text, size, .. } => {
                Rect::new(*x, *y, text.chars().count() as f64 * size * 0.6, *size)
            }
        }
    }

    /// Precise containment test in world coordinates.
    pub fn contains(&self, p: Point) -> bool {
        match self {
            Shape::Ellipse { x, y, width, height, .. } => {
                if *width <= 0.0 || *height <= 0.0 {
                    return false;
                }
                let (rx, ry) = (width / 2.0, height / 2.0);
                let dx = (p.x - (x + rx)) / rx;
                let dy = (p.y - (y + ry)) / ry;
                dx * dx + dy * dy <= 1.0
            }
            Shape::Circle { x, y, radius, .. } => {
                let (dx, dy) = (p.x - x, p.y - y);
                dx * dx + dy * dy <= radius * radius
            }
            _ => self.bounds().contains(p),
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Shape::Rectangle { color, .. }
            | Shape::Ellipse { color, .. }
            | Shape::Circle { color, .. }
            | Shape::Text { color, .. } => *color,
        }
    }
}

/// Named shape collections making up the drawable state of one backend.
///
/// Collections keep their insertion order of shapes; the collection names
/// themselves are kept sorted so iteration is deterministic.
///
/// A payload may be a slice of a larger one (an executor shard). Its index
/// bases then record where each sliced collection starts in the full payload,
/// so unkeyed shapes keep the identity they have there.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    fields: BTreeMap<String, Vec<Shape>>,
    #[serde(skip)]
    index_bases: BTreeMap<String, usize>,
}

impl Payload {
    /// Creates a new, empty payload.
    pub fn new() -> Self {
        Payload::default()
    }

    /// Builder style variant of [`Payload::insert`].
    pub fn with_field(mut self, name: impl Into<String>, shapes: Vec<Shape>) -> Self {
        self.insert(name, shapes);
        self
    }

    /// Sets (or replaces) the collection called `name`.
    pub fn insert(&mut self, name: impl Into<String>, shapes: Vec<Shape>) -> Option<Vec<Shape>> {
        self.fields.insert(name.into(), shapes)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Shape>> {
        self.index_bases.remove(name);
        self.fields.remove(name)
    }

    /// Index in the full payload of the first shape of collection `name`.
    pub fn index_base(&self, name: &str) -> usize {
        self.index_bases.get(name).copied().unwrap_or(0)
    }

    pub fn set_index_base(&mut self, name: impl Into<String>, base: usize) {
        let name = name.into();
        if base == 0 {
            self.index_bases.remove(&name);
        } else {
            self.index_bases.insert(name, base);
        }
    }

    pub fn field(&self, name: &str) -> Option<&[Shape]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Vec<Shape>> {
        self.fields.get_mut(name)
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[Shape])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// All shapes of all collections, in collection order.
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.fields.values().flatten()
    }

    /// Total number of shapes across all collections.
    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
