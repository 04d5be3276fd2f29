use crate::context::{ContextId, ContextMessage};
use crate::controller::FrameStats;
use crate::errors::ControllerError;
use crate::render::{PickingOptions, PickingResult};
use crate::sync::lock;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Sending side of a context.
pub struct ContextHandle {
    id: ContextId,
    tx: mpsc::UnboundedSender<ContextMessage>,
    join: Option<JoinHandle<()>>,
    /// Stats as of the last completed frame, written by the context
    latest: Arc<Mutex<FrameStats>>,
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.id)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl ContextHandle {
    pub(crate) fn new(
        id: ContextId,
        tx: mpsc::UnboundedSender<ContextMessage>,
        join: JoinHandle<()>,
        latest: Arc<Mutex<FrameStats>>,
    ) -> Self {
        Self {
            id,
            tx,
            join: Some(join),
            latest,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Queues a message. Returns false when the context is gone.
    pub fn send(&self, msg: ContextMessage) -> bool {
        self.tx.send(msg).is_ok()
    }

    /// True once the context stopped receiving, either disposed or crashed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || self.join.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Query in region-local coordinates. The returned future owns everything it needs.
    pub fn pick(&self, options: PickingOptions) -> impl Future<Output = Result<Vec<PickingResult>, ControllerError>> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(ContextMessage::Pick { options, reply });
        async move {
            if !sent {
                return Err(ControllerError::ContextLost);
            }
            rx.await.map_err(|_| ControllerError::ContextLost)
        }
    }

    pub fn stats(&self) -> impl Future<Output = Result<FrameStats, ControllerError>> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let sent = self.send(ContextMessage::Stats { reply });
        async move {
            if !sent {
                return Err(ControllerError::ContextLost);
            }
            rx.await.map_err(|_| ControllerError::ContextLost)
        }
    }

    /// Stats of the last completed frame, read without a round-trip.
    ///
    /// Answers even while the context is busy drawing a frame.
    pub fn latest_stats(&self) -> FrameStats {
        *lock(&self.latest)
    }

    /// Asks the context to dispose without waiting for it.
    pub fn dispose(&self) {
        let _ = self.tx.send(ContextMessage::Dispose);
    }

    /// Disposes the context and waits up to `timeout` for its task to end.
    ///
    /// Returns false when the task crashed or did not finish in time.
    pub async fn shutdown(&mut self, timeout: Duration) -> bool {
        self.dispose();
        let Some(join) = self.join.take() else {
            return true;
        };
        match tokio::time::timeout(timeout, join).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                log::warn!("context {}: task ended abnormally: {e}", self.id);
                false
            }
            Err(_) => {
                log::warn!("context {}: did not exit within {:?}", self.id, timeout);
                false
            }
        }
    }
}
