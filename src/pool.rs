//! Orchestrated executor pool.
//!
//! A pool spreads the balanced fields of a payload over a set of executors,
//! each an isolated context with its own renderer and surface region. A
//! supervisor task owns the executors, re-shards on every update and
//! periodically resizes the pool from the frame times its executors report.

use crate::controller::RendererStats;
use crate::render::{Patch, Payload, PickingOptions, PickingResult, SurfaceSize, Viewport};
use tokio::sync::oneshot;

mod config;
mod layout;
mod rebalance;
mod shard;
mod supervisor;

pub use config::{ExecutorPoolConfig, FrameTimeThresholds};
pub use layout::RegionLayout;
pub use rebalance::{average, decide, RebalanceDecision};
pub use shard::{partition, shard_payload};

pub(crate) use supervisor::{PoolSetup, PoolSupervisor};

/// Commands accepted by a pool supervisor, processed in send order.
pub(crate) enum PoolCommand {
    Visibility(bool),
    Size(SurfaceSize),
    Viewport(Viewport),
    Render(Payload),
    Patches(Vec<Patch>),
    /// Query in composed-surface coordinates
    Pick {
        options: PickingOptions,
        reply: oneshot::Sender<Vec<PickingResult>>,
    },
    Stats {
        reply: oneshot::Sender<RendererStats>,
    },
    Dispose,
}
