//! Frame scheduling.
//!
//! A [`RenderSyncContext`] sits between a renderer's state updates and its
//! draw call. Updates only *request* a frame through
//! [`schedule_render`](RenderSyncContext::schedule_render); the draw callback
//! runs when the owning context's frame clock ticks. Any number of requests
//! between two ticks collapse into one draw, and no draw ever happens outside a
//! tick, so a renderer never sees two overlapping mutations of its surface.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Locks `mutex`, recovering the data of a poisoned lock.
///
/// A renderer that panicked mid-frame must not take the readers of its
/// shared state down with it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Timestamp handed to a draw callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameTime {
    /// Monotonic frame counter of the clock that produced this value
    pub frame: u64,
    /// Time since the clock started
    pub timestamp: Duration,
}

impl FrameTime {
    pub fn new(frame: u64, timestamp: Duration) -> Self {
        Self { frame, timestamp }
    }
}

/// Produces [`FrameTime`]s for one execution context.
#[derive(Debug)]
pub struct FrameClock {
    started: Instant,
    frame: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self { started: Instant::now(), frame: 0 }
    }

    /// Advances the clock by one frame.
    pub fn next_frame(&mut self) -> FrameTime {
        self.frame += 1;
        FrameTime::new(self.frame, self.started.elapsed())
    }
}

/// When a sync context invokes its draw callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    /// Draw only on ticks following a [`RenderSyncContext::schedule_render`]
    #[default]
    OnDemand,
    /// Draw on every tick
    Continuous,
}

pub type DrawCallback = Box<dyn FnMut(FrameTime) + Send>;

struct SyncState {
    mode: RenderMode,
    pending: bool,
    callback: Option<DrawCallback>,
    /// Set while the callback is out of the slot being invoked
    drawing: bool,
    draws: u64,
}

/// Coalesces render requests for one renderer into at most one draw per tick.
///
/// Cloning yields another handle to the same context.
#[derive(Clone)]
pub struct RenderSyncContext {
    state: Arc<Mutex<SyncState>>,
}

impl std::fmt::Debug for RenderSyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.lock();
        f.debug_struct("RenderSyncContext")
            .field("mode", &s.mode)
            .field("pending", &s.pending)
            .field("draws", &s.draws)
            .finish_non_exhaustive()
    }
}

impl RenderSyncContext {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(SyncState {
                mode,
                pending: false,
                callback: None,
                drawing: false,
                draws: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        lock(&self.state)
    }

    /// Registers the draw callback, replacing a previous one.
    pub fn register(&self, callback: impl FnMut(FrameTime) + Send + 'static) {
        self.lock().callback = Some(Box::new(callback));
    }

    /// Requests a draw on the next tick. Idempotent until that tick fires.
    pub fn schedule_render(&self) {
        self.lock().pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    pub fn mode(&self) -> RenderMode {
        self.lock().mode
    }

    /// Number of draws performed so far.
    pub fn draws(&self) -> u64 {
        self.lock().draws
    }

    /// Runs one frame. Returns true when the draw callback was invoked.
    ///
    /// The callback runs without the internal lock held, so it may call
    /// [`schedule_render`](Self::schedule_render); such a request is served on
    /// the following tick.
    pub fn tick(&self, frame: FrameTime) -> bool {
        let mut callback = {
            let mut s = self.lock();
            let due = s.pending || s.mode == RenderMode::Continuous;
            if !due || s.drawing {
                return false;
            }
            let Some(callback) = s.callback.take() else {
                // Keep the request until someone registers.
                return false;
            };
            s.pending = false;
            s.drawing = true;
            callback
        };

        callback(frame);

        let mut s = self.lock();
        s.drawing = false;
        s.draws += 1;
        if s.callback.is_none() {
            s.callback = Some(callback);
        }
        true
    }
}
