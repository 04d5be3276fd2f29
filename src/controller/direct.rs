use crate::controller::host::{RendererHost, StatsReporter};
use crate::controller::{ControllerVariant, PickFuture, RendererController, RendererStats, StatsFuture};
use crate::errors::ControllerError;
use crate::render::{BackendCapabilities, Patch, Payload, PickingOptions, Renderer, SurfaceSize, Viewport};
use crate::sync::{lock, FrameTime, RenderMode};
use futures::FutureExt;
use std::sync::Mutex;

/// Controller whose renderer lives in the caller's context and draws on host ticks.
pub struct DirectController {
    name: String,
    capabilities: BackendCapabilities,
    host: Mutex<RendererHost>,
    disposed: bool,
}

impl DirectController {
    pub(crate) fn new(
        renderer: Box<dyn Renderer>,
        capabilities: BackendCapabilities,
        mode: RenderMode,
        reporter: Option<StatsReporter>,
    ) -> Self {
        let host = RendererHost::new(renderer, mode, reporter);
        Self {
            name: host.name().to_string(),
            capabilities,
            host: Mutex::new(host),
            disposed: false,
        }
    }

    fn host(&mut self) -> Option<&mut RendererHost> {
        if self.disposed {
            log::debug!("{}: ignoring call on disposed controller", self.name);
            return None;
        }
        Some(self.host.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl RendererController for DirectController {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> ControllerVariant {
        ControllerVariant::Direct
    }

    fn supports_picking(&self) -> bool {
        self.capabilities.contains(BackendCapabilities::PICKING)
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn set_visibility(&mut self, visible: bool) {
        if let Some(host) = self.host() {
            host.set_visibility(visible);
        }
    }

    fn set_size(&mut self, size: SurfaceSize) {
        if let Some(host) = self.host() {
            host.set_size(size);
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        if let Some(host) = self.host() {
            host.set_viewport(viewport);
        }
    }

    fn render(&mut self, payload: Payload) {
        if let Some(host) = self.host() {
            host.render(payload);
        }
    }

    fn render_patches(&mut self, patches: Vec<Patch>) {
        if let Some(host) = self.host() {
            host.render_patches(&patches);
        }
    }

    fn pick_objects(&self, options: PickingOptions) -> PickFuture {
        let result = if self.disposed {
            Err(ControllerError::Disposed)
        } else {
            Ok(lock(&self.host).pick(&options))
        };
        futures::future::ready(result).boxed()
    }

    fn stats(&self) -> StatsFuture {
        let result = if self.disposed {
            Err(ControllerError::Disposed)
        } else {
            Ok(RendererStats {
                backend: self.name.clone(),
                variant: ControllerVariant::Direct,
                frame: lock(&self.host).stats(),
                executors: Vec::new(),
            })
        };
        futures::future::ready(result).boxed()
    }

    fn tick(&mut self, frame: FrameTime) {
        if let Some(host) = self.host() {
            host.tick(frame);
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(host) = self.host() {
            host.dispose();
        }
        self.disposed = true;
        log::debug!("{}: direct controller disposed", self.name);
    }
}
