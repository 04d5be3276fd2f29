use crate::context::{ContextHandle, ContextId, ContextMessage};
use crate::controller::host::{RendererHost, StatsReporter};
use crate::render::Renderer;
use crate::sync::{FrameClock, RenderMode};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// How a context draws.
#[derive(Clone, Debug)]
pub struct ContextSettings {
    pub mode: RenderMode,
    pub frame_interval: Duration,
    pub(crate) reporter: Option<StatsReporter>,
}

impl ContextSettings {
    pub fn new(mode: RenderMode, frame_interval: Duration) -> Self {
        Self {
            mode,
            frame_interval,
            reporter: None,
        }
    }

    pub(crate) fn with_reporter(mut self, reporter: Option<StatsReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

pub struct ContextWorker {
    id: ContextId,
    host: RendererHost,
    rx: mpsc::UnboundedReceiver<ContextMessage>,
    clock: FrameClock,
    frame_interval: Duration,
}

impl ContextWorker {
    /// Moves `renderer` into a new task on `runtime` and returns the handle to it.
    pub fn spawn(renderer: Box<dyn Renderer>, settings: ContextSettings, runtime: &Handle) -> ContextHandle {
        let id = ContextId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let host = RendererHost::new(renderer, settings.mode, settings.reporter);
        let latest = host.shared_stats();
        let worker = Self {
            id,
            host,
            rx,
            clock: FrameClock::new(),
            frame_interval: settings.frame_interval,
        };
        let join = runtime.spawn(worker.run());

        ContextHandle::new(id, tx, join, latest)
    }

    async fn run(mut self) {
        log::debug!("context {} ({}): started", self.id, self.host.name());

        let start = tokio::time::Instant::now() + self.frame_interval;
        let mut ticker = tokio::time::interval_at(start, self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.rx.recv() => {
                    match msg {
                        Some(ContextMessage::Dispose) | None => break,
                        Some(msg) => self.handle_message(msg),
                    }
                }
                _ = ticker.tick() => {
                    self.host.tick(self.clock.next_frame());
                }
            }
        }

        self.host.dispose();
        log::debug!("context {} ({}): exited", self.id, self.host.name());
    }

    fn handle_message(&mut self, msg: ContextMessage) {
        log::trace!("context {}: {:?}", self.id, msg);

        match msg {
            ContextMessage::Visibility(visible) => self.host.set_visibility(visible),
            ContextMessage::Size(size) => self.host.set_size(size),
            ContextMessage::Region(region) => self.host.set_region(region),
            ContextMessage::Viewport(viewport) => self.host.set_viewport(viewport),
            ContextMessage::Render(payload) => self.host.render(payload),
            ContextMessage::Patches(patches) => self.host.render_patches(&patches),
            ContextMessage::Pick { options, reply } => {
                let _ = reply.send(self.host.pick(&options));
            }
            ContextMessage::Stats { reply } => {
                let _ = reply.send(self.host.stats());
            }
            ContextMessage::Dispose => {}
        }
    }
}
