use crate::context::{ContextHandle, ContextMessage, ContextSettings, ContextWorker};
use crate::controller::{ControllerVariant, PickFuture, RendererController, RendererStats, StatsFuture};
use crate::errors::ControllerError;
use crate::render::{BackendCapabilities, Patch, Payload, PickingOptions, Renderer, SurfaceSize, Viewport};
use crate::sync::FrameTime;
use futures::FutureExt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Controller whose renderer was moved into its own context.
pub struct IsolatedController {
    name: String,
    capabilities: BackendCapabilities,
    context: ContextHandle,
    cancel: CancellationToken,
    has_payload: bool,
    stats_timeout: Duration,
}

impl IsolatedController {
    pub(crate) fn spawn(
        renderer: Box<dyn Renderer>,
        capabilities: BackendCapabilities,
        settings: ContextSettings,
        stats_timeout: Duration,
        runtime: &Handle,
    ) -> Self {
        let name = renderer.name().to_string();
        let context = ContextWorker::spawn(renderer, settings, runtime);
        log::debug!("{name}: isolated in context {}", context.id());

        Self {
            name,
            capabilities,
            context,
            cancel: CancellationToken::new(),
            has_payload: false,
            stats_timeout,
        }
    }

    fn send(&self, msg: ContextMessage) {
        if self.cancel.is_cancelled() {
            log::debug!("{}: ignoring {:?} on disposed controller", self.name, msg);
            return;
        }
        if !self.context.send(msg) {
            log::warn!("{}: context {} is gone", self.name, self.context.id());
        }
    }
}

/// Resolves `fut` unless `cancel` fires first, in which case the result is [`ControllerError::Disposed`].
pub(crate) async fn until_disposed<T>(
    cancel: CancellationToken,
    fut: impl Future<Output = Result<T, ControllerError>>,
) -> Result<T, ControllerError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ControllerError::Disposed),
        res = fut => res,
    }
}

impl RendererController for IsolatedController {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> ControllerVariant {
        ControllerVariant::IsolatedSingle
    }

    fn supports_picking(&self) -> bool {
        self.capabilities.contains(BackendCapabilities::PICKING)
    }

    fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_visibility(&mut self, visible: bool) {
        self.send(ContextMessage::Visibility(visible));
    }

    fn set_size(&mut self, size: SurfaceSize) {
        self.send(ContextMessage::Size(size));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.send(ContextMessage::Viewport(viewport));
    }

    fn render(&mut self, payload: Payload) {
        self.has_payload = true;
        self.send(ContextMessage::Render(payload));
    }

    fn render_patches(&mut self, patches: Vec<Patch>) {
        if !self.has_payload {
            log::debug!("{}: dropping {} patches, no payload yet", self.name, patches.len());
            return;
        }
        self.send(ContextMessage::Patches(patches));
    }

    fn pick_objects(&self, options: PickingOptions) -> PickFuture {
        if self.is_disposed() {
            return futures::future::ready(Err(ControllerError::Disposed)).boxed();
        }
        until_disposed(self.cancel.clone(), self.context.pick(options)).boxed()
    }

    fn stats(&self) -> StatsFuture {
        if self.is_disposed() {
            return futures::future::ready(Err(ControllerError::Disposed)).boxed();
        }
        let (backend, timeout) = (self.name.clone(), self.stats_timeout);
        let request = self.context.stats();
        let fut = async move {
            let frame = tokio::time::timeout(timeout, request)
                .await
                .map_err(|_| ControllerError::ContextLost)??;
            Ok(RendererStats {
                backend,
                variant: ControllerVariant::IsolatedSingle,
                frame,
                executors: Vec::new(),
            })
        };
        until_disposed(self.cancel.clone(), fut).boxed()
    }

    fn tick(&mut self, _frame: FrameTime) {}

    fn dispose(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.context.dispose();
        log::debug!("{}: isolated controller disposed", self.name);
    }
}

impl Drop for IsolatedController {
    fn drop(&mut self) {
        self.dispose();
    }
}
