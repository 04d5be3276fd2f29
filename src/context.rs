//! Isolated execution contexts.
//!
//! A context is a tokio task that owns one renderer. The outside world only
//! talks to it through a [`ContextHandle`] by sending [`ContextMessage`]s;
//! nothing is shared. Each context runs its own frame clock.

use crate::controller::FrameStats;
use crate::render::{Patch, Payload, PickingOptions, PickingResult, SurfaceRegion, SurfaceSize, Viewport};
use tokio::sync::oneshot;
use uuid::Uuid;

mod handle;
mod worker;

pub use handle::ContextHandle;
pub use worker::{ContextSettings, ContextWorker};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Messages accepted by a context, processed in send order.
pub enum ContextMessage {
    Visibility(bool),
    Size(SurfaceSize),
    /// Region of the composed surface; also sets the renderer size
    Region(SurfaceRegion),
    Viewport(Viewport),
    Render(Payload),
    Patches(Vec<Patch>),
    /// Query in region-local coordinates
    Pick {
        options: PickingOptions,
        reply: oneshot::Sender<Vec<PickingResult>>,
    },
    Stats {
        reply: oneshot::Sender<FrameStats>,
    },
    Dispose,
}

impl std::fmt::Debug for ContextMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextMessage::Visibility(v) => write!(f, "Visibility({v})"),
            ContextMessage::Size(s) => write!(f, "Size({}x{})", s.width, s.height),
            ContextMessage::Region(r) => write!(f, "Region({r:?})"),
            ContextMessage::Viewport(vp) => write!(f, "Viewport({vp:?})"),
            ContextMessage::Render(p) => write!(f, "Render({} shapes)", p.len()),
            ContextMessage::Patches(p) => write!(f, "Patches({})", p.len()),
            ContextMessage::Pick { options, .. } => write!(f, "Pick({:?})", options.mode),
            ContextMessage::Stats { .. } => f.write_str("Stats"),
            ContextMessage::Dispose => f.write_str("Dispose"),
        }
    }
}
