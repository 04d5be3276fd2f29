use crate::render::geometry::{Point, Rect};
use crate::render::payload::Payload;
use crate::render::viewport::Viewport;
use serde::{Deserialize, Serialize};

/// How a pick query selects objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PickingMode {
    /// Objects under a single surface position
    Position,
    /// Objects intersecting a surface rectangle
    Area,
}

/// Pick query in composed-surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickingOptions {
    pub mode: PickingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Rect>,
}

impl PickingOptions {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            mode: PickingMode::Position,
            position: Some(Point::new(x, y)),
            area: None,
        }
    }

    pub fn within(area: Rect) -> Self {
        Self {
            mode: PickingMode::Area,
            position: None,
            area: Some(area),
        }
    }

    /// Returns the same query moved by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            mode: self.mode,
            position: self.position.map(|p| Point::new(p.x + dx, p.y + dy)),
            area: self.area.map(|a| a.translated(dx, dy)),
        }
    }
}

/// A single picked object.
///
/// `id` is backend defined. `backend` and `executor` are filled in by the
/// dispatcher and by orchestrated controllers while results travel upwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PickingResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<usize>,
}

impl PickingResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend: None,
            executor: None,
        }
    }
}

/// Hit-tests every shape of `payload` against a pick query.
///
/// Shapes are tested topmost first (reverse paint order inside each
/// collection). Shapes without a key are reported as `field[index]`, with
/// `index` counted in the full payload when `payload` is a shard of it.
pub fn hit_test(payload: &Payload, viewport: &Viewport, options: &PickingOptions) -> Vec<PickingResult> {
    let mut hits = Vec::new();

    for (field, shapes) in payload.fields() {
        let base = payload.index_base(field);
        for (index, shape) in shapes.iter().enumerate().rev() {
            let hit = match options.mode {
                PickingMode::Position => match options.position {
                    Some(p) => shape.contains(viewport.screen_to_world(p)),
                    None => false,
                },
                PickingMode::Area => match options.area {
                    Some(area) => {
                        let top_left = viewport.screen_to_world(Point::new(area.x, area.y));
                        let world = Rect::new(
                            top_left.x,
                            top_left.y,
                            area.width / viewport.zoom,
                            area.height / viewport.zoom,
                        );
                        shape.bounds().intersects(&world)
                    }
                    None => false,
                },
            };

            if hit {
                let id = match shape.key() {
                    Some(key) => key.to_string(),
                    None => format!("{field}[{}]", base + index),
                };
                hits.push(PickingResult::new(id));
            }
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::payload::{Color, Shape};

    fn payload() -> Payload {
        Payload::new().with_field(
            "rectangles",
            vec![
                Shape::rectangle(0.0, 0.0, 10.0, 10.0, Color::BLACK).with_id("under"),
                Shape::rectangle(5.0, 5.0, 10.0, 10.0, Color::BLACK).with_id("over"),
                Shape::rectangle(100.0, 100.0, 1.0, 1.0, Color::BLACK),
            ],
        )
    }

    #[test]
    fn position_pick_is_topmost_first() {
        let hits = hit_test(&payload(), &Viewport::default(), &PickingOptions::at(7.0, 7.0));
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["over", "under"]);
    }

    #[test]
    fn pick_respects_viewport() {
        // world (100,100) is drawn at 10 + 100*2 = 210
        let vp = Viewport::new(10.0, 10.0, 2.0);
        let hits = hit_test(&payload(), &vp, &PickingOptions::at(211.0, 211.0));
        assert_eq!(hits, vec![PickingResult::new("rectangles[2]")]);
    }

    #[test]
    fn area_pick() {
        let hits = hit_test(&payload(), &Viewport::default(), &PickingOptions::within(Rect::new(12.0, 12.0, 100.0, 100.0)));
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["rectangles[2]", "over"]);
    }

    #[test]
    fn unkeyed_shapes_in_a_shard_use_full_payload_index() {
        let mut shard = Payload::new().with_field(
            "rectangles",
            vec![
                Shape::rectangle(0.0, 0.0, 10.0, 10.0, Color::BLACK),
                Shape::rectangle(0.0, 0.0, 10.0, 10.0, Color::BLACK).with_id("keyed"),
            ],
        );
        shard.set_index_base("rectangles", 40);

        let hits = hit_test(&shard, &Viewport::default(), &PickingOptions::at(5.0, 5.0));
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["keyed", "rectangles[40]"]);
    }

    #[test]
    fn options_wire_format() {
        let o: PickingOptions = serde_json::from_str(r#"{"mode":"position","position":{"x":100,"y":100}}"#).unwrap();
        assert_eq!(o, PickingOptions::at(100.0, 100.0));
    }
}
