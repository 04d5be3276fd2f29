//! Incremental payload updates.
//!
//! A [`Patch`] targets one named collection of a [`Payload`] and either
//! appends, removes or replaces shapes. Patches are always applied against a
//! full payload retained by a controller; they never create initial state.
//!
//! Matching for `remove` and `update` uses [`Shape::matches`]: keyed shapes are
//! compared by key, unkeyed shapes by value. For every value in a patch only the
//! first matching shape is touched, so removing a value twice removes two equal
//! shapes.
//!
//! A patch for a collection the payload does not contain is skipped. This lets
//! newer hosts send patches for fields older backends do not know about.
//!
//! ```
//! use viewer2d::render::{apply_patches, Color, Patch, Payload, Shape};
//!
//! let one = Shape::circle(0.0, 0.0, 1.0, Color::BLACK);
//! let mut payload = Payload::new().with_field("x", vec![]);
//!
//! apply_patches(&mut payload, &[Patch::add("x", vec![one.clone()]), Patch::remove("x", vec![one])]);
//! assert_eq!(payload.field("x"), Some(&[][..]));
//! ```

use crate::render::payload::{Payload, Shape};
use serde::{Deserialize, Serialize};

/// Operation carried by a [`Patch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Append values at the end of the collection
    Add,
    /// Remove the first shape matching each value
    Remove,
    /// Replace the first shape matching each value, keeping its position
    Update,
}

/// A single incremental change to one collection of a payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Name of the collection inside the payload
    pub path: String,
    pub op: PatchOp,
    #[serde(default)]
    pub values: Vec<Shape>,
}

impl Patch {
    pub fn new(path: impl Into<String>, op: PatchOp, values: Vec<Shape>) -> Self {
        Self { path: path.into(), op, values }
    }

    pub fn add(path: impl Into<String>, values: Vec<Shape>) -> Self {
        Self::new(path, PatchOp::Add, values)
    }

    pub fn remove(path: impl Into<String>, values: Vec<Shape>) -> Self {
        Self::new(path, PatchOp::Remove, values)
    }

    pub fn update(path: impl Into<String>, values: Vec<Shape>) -> Self {
        Self::new(path, PatchOp::Update, values)
    }
}

/// Outcome of applying a batch of patches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Patches whose path resolved to a collection
    pub applied: usize,
    /// Patches skipped because their path is unknown
    pub skipped: usize,
    /// `remove`/`update` values that did not match any shape
    pub unmatched: usize,
}

impl PatchReport {
    /// True when at least one patch touched the payload.
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Applies `patches` in order to `payload`.
///
/// Never fails: unknown paths and unmatched values are counted in the returned
/// report and otherwise ignored.
pub fn apply_patches(payload: &mut Payload, patches: &[Patch]) -> PatchReport {
    let mut report = PatchReport::default();

    for patch in patches {
        let Some(field) = payload.field_mut(&patch.path) else {
            log::debug!("apply_patches: ignoring {:?} for unknown path '{}'", patch.op, patch.path);
            report.skipped += 1;
            continue;
        };

        report.applied += 1;
        match patch.op {
            PatchOp::Add => field.extend(patch.values.iter().cloned()),
            PatchOp::Remove => {
                for value in &patch.values {
                    match field.iter().position(|s| s.matches(value)) {
                        Some(idx) => {
                            field.remove(idx);
                        }
                        None => report.unmatched += 1,
                    }
                }
            }
            PatchOp::Update => {
                for value in &patch.values {
                    match field.iter_mut().find(|s| s.matches(value)) {
                        Some(slot) => *slot = value.clone(),
                        None => report.unmatched += 1,
                    }
                }
            }
        }
    }

    report
}
