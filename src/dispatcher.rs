//! Top-level coordinator.
//!
//! [`RenderDispatcher`] owns one controller per named backend and fans host
//! updates out to them. Payloads and patches are addressed per backend, so a
//! host can update a single backend without touching the others; viewport and
//! size changes go to every backend.

use crate::controller::{RendererController, RendererStats};
use crate::errors::{ControllerError, DispatchError};
use crate::render::{apply_patches, Patch, Payload, PickingOptions, PickingResult, SurfaceSize, Viewport};
use crate::sync::FrameClock;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{BTreeMap, HashSet};

struct Backend {
    name: String,
    controller: Box<dyn RendererController>,
    /// Last full payload with every patch applied since
    payload: Option<Payload>,
}

pub struct RenderDispatcher {
    backends: Vec<Backend>,
    viewport: Viewport,
    size: Option<SurfaceSize>,
    clock: FrameClock,
    disposed: bool,
}

impl RenderDispatcher {
    /// Creates a dispatcher over `controllers`, keyed by backend name.
    ///
    /// Registration order is kept and decides the order of merged pick results.
    pub fn new<I, S>(controllers: I) -> Result<Self, DispatchError>
    where
        I: IntoIterator<Item = (S, Box<dyn RendererController>)>,
        S: Into<String>,
    {
        let mut names = HashSet::new();
        let mut backends = Vec::new();

        for (name, controller) in controllers {
            let name = name.into();
            if !names.insert(name.clone()) {
                return Err(DispatchError::DuplicateBackend(name));
            }
            backends.push(Backend {
                name,
                controller,
                payload: None,
            });
        }

        log::debug!("dispatcher: {} backends registered", backends.len());
        Ok(Self {
            backends,
            viewport: Viewport::default(),
            size: None,
            clock: FrameClock::new(),
            disposed: false,
        })
    }

    /// Creates a dispatcher keyed by each controller's own backend name.
    pub fn from_controllers(
        controllers: impl IntoIterator<Item = Box<dyn RendererController>>,
    ) -> Result<Self, DispatchError> {
        Self::new(controllers.into_iter().map(|c| (c.name().to_string(), c)))
    }

    fn backend_mut(&mut self, name: &str) -> Option<&mut Backend> {
        if self.disposed {
            log::debug!("dispatcher: ignoring update for '{name}' after dispose");
            return None;
        }
        let found = self.backends.iter_mut().find(|b| b.name == name);
        if found.is_none() {
            log::warn!("dispatcher: unknown backend '{name}'");
        }
        found
    }

    /// Sends full payloads to the named backends. Backends not named keep their state.
    pub fn render<I, K>(&mut self, payloads: I)
    where
        I: IntoIterator<Item = (K, Payload)>,
        K: AsRef<str>,
    {
        for (name, payload) in payloads {
            if let Some(backend) = self.backend_mut(name.as_ref()) {
                backend.payload = Some(payload.clone());
                backend.controller.render(payload);
            }
        }
    }

    /// Sends patch batches to the named backends.
    pub fn render_patches<I, K>(&mut self, patches: I)
    where
        I: IntoIterator<Item = (K, Vec<Patch>)>,
        K: AsRef<str>,
    {
        for (name, batch) in patches {
            if let Some(backend) = self.backend_mut(name.as_ref()) {
                if let Some(payload) = backend.payload.as_mut() {
                    apply_patches(payload, &batch);
                }
                backend.controller.render_patches(batch);
            }
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.disposed {
            return;
        }
        self.viewport = viewport;
        for backend in &mut self.backends {
            backend.controller.set_viewport(viewport);
        }
    }

    pub fn set_size(&mut self, size: SurfaceSize) {
        if self.disposed {
            return;
        }
        self.size = Some(size);
        for backend in &mut self.backends {
            backend.controller.set_size(size);
        }
    }

    pub fn set_visibility(&mut self, backend: &str, visible: bool) {
        if let Some(backend) = self.backend_mut(backend) {
            backend.controller.set_visibility(visible);
        }
    }

    /// Drives one host frame for controllers drawing in the caller's context.
    pub fn tick(&mut self) {
        if self.disposed {
            return;
        }
        let frame = self.clock.next_frame();
        for backend in &mut self.backends {
            backend.controller.tick(frame);
        }
    }

    /// Picks across every backend that supports picking.
    ///
    /// Results are grouped per backend in registration order and tagged with
    /// the backend name. A backend whose context was lost contributes nothing.
    pub fn pick_objects(&self, options: PickingOptions) -> BoxFuture<'static, Result<Vec<PickingResult>, DispatchError>> {
        if self.disposed {
            return futures::future::ready(Err(DispatchError::Disposed)).boxed();
        }

        let requests: Vec<_> = self
            .backends
            .iter()
            .filter(|b| b.controller.supports_picking())
            .map(|b| {
                let name = b.name.clone();
                b.controller.pick_objects(options).map(move |res| (name, res))
            })
            .collect();

        async move {
            let mut merged = Vec::new();
            for (name, res) in futures::future::join_all(requests).await {
                match res {
                    Ok(hits) => merged.extend(hits.into_iter().map(|mut hit| {
                        hit.backend = Some(name.clone());
                        hit
                    })),
                    Err(ControllerError::Disposed) => return Err(DispatchError::Disposed),
                    Err(e) => log::warn!("dispatcher: pick on '{name}' failed: {e}"),
                }
            }
            Ok(merged)
        }
        .boxed()
    }

    /// Statistics of every backend, in registration order.
    pub fn stats(&self) -> BoxFuture<'static, Result<Vec<RendererStats>, DispatchError>> {
        if self.disposed {
            return futures::future::ready(Err(DispatchError::Disposed)).boxed();
        }

        let requests: Vec<_> = self
            .backends
            .iter()
            .map(|b| {
                let name = b.name.clone();
                b.controller.stats().map(move |res| (name, res))
            })
            .collect();

        async move {
            futures::future::join_all(requests)
                .await
                .into_iter()
                .map(|(backend, res)| res.map_err(|source| DispatchError::Controller { backend, source }))
                .collect()
        }
        .boxed()
    }

    /// Disposes every controller. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for backend in &mut self.backends {
            backend.controller.dispose();
            backend.payload = None;
        }
        log::debug!("dispatcher: disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn size(&self) -> Option<SurfaceSize> {
        self.size
    }

    /// Backend names in registration order.
    pub fn backends(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn controller(&self, backend: &str) -> Option<&dyn RendererController> {
        self.backends
            .iter()
            .find(|b| b.name == backend)
            .map(|b| b.controller.as_ref())
    }

    /// Last full payload of `backend` with all later patches applied.
    pub fn last_payload(&self, backend: &str) -> Option<&Payload> {
        self.backends
            .iter()
            .find(|b| b.name == backend)
            .and_then(|b| b.payload.as_ref())
    }

    /// Payload snapshot of every backend that received one.
    pub fn payloads(&self) -> BTreeMap<&str, &Payload> {
        self.backends
            .iter()
            .filter_map(|b| b.payload.as_ref().map(|p| (b.name.as_str(), p)))
            .collect()
    }
}

impl Drop for RenderDispatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}
