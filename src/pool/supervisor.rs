use crate::config::ProfilingConfig;
use crate::context::{ContextHandle, ContextMessage, ContextSettings, ContextWorker};
use crate::controller::{ControllerVariant, FrameStats, RendererStats};
use crate::pool::config::ExecutorPoolConfig;
use crate::pool::layout::region_accepts;
use crate::pool::rebalance::{average, decide, RebalanceDecision};
use crate::pool::shard::shard_payload;
use crate::pool::PoolCommand;
use crate::render::{
    apply_patches, Payload, PickingOptions, PickingResult, Renderer, RendererBuilder, SurfaceRegion, SurfaceRequest,
    SurfaceSize, Viewport,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Everything a supervisor needs besides its initial renderers.
pub(crate) struct PoolSetup {
    pub name: String,
    pub builder: Arc<dyn RendererBuilder>,
    pub config: ExecutorPoolConfig,
    pub settings: ContextSettings,
    pub profiling: Option<ProfilingConfig>,
}

struct Executor {
    index: usize,
    region: SurfaceRegion,
    context: ContextHandle,
}

pub(crate) struct PoolSupervisor {
    name: String,
    builder: Arc<dyn RendererBuilder>,
    config: ExecutorPoolConfig,
    settings: ContextSettings,
    profiling: Option<ProfilingConfig>,
    runtime: Handle,
    rx: mpsc::UnboundedReceiver<PoolCommand>,
    executors: Vec<Executor>,
    /// Last full payload, patched in place
    payload: Option<Payload>,
    viewport: Viewport,
    size: SurfaceSize,
    visible: bool,
}

impl PoolSupervisor {
    /// Starts one executor per renderer and the supervisor task driving them.
    pub fn spawn(
        setup: PoolSetup,
        renderers: Vec<Box<dyn Renderer>>,
        runtime: &Handle,
    ) -> (mpsc::UnboundedSender<PoolCommand>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut supervisor = Self {
            name: setup.name,
            builder: setup.builder,
            config: setup.config,
            settings: setup.settings,
            profiling: setup.profiling,
            runtime: runtime.clone(),
            rx,
            executors: Vec::new(),
            payload: None,
            viewport: Viewport::default(),
            size: SurfaceSize::default(),
            visible: true,
        };
        for (index, renderer) in renderers.into_iter().enumerate() {
            let executor = supervisor.start_executor(index, renderer);
            supervisor.executors.push(executor);
        }
        supervisor.assign_regions();

        let join = runtime.spawn(supervisor.run());
        (tx, join)
    }

    async fn run(mut self) {
        log::info!("{}: pool started with {} executors", self.name, self.executors.len());

        let frequency = self.config.frequency;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + frequency, frequency);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(PoolCommand::Dispose) | None => break,
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                _ = ticker.tick() => {
                    self.rebalance().await;
                }
            }
        }

        self.shutdown().await;
        log::info!("{}: pool stopped", self.name);
    }

    async fn handle_command(&mut self, cmd: PoolCommand) {
        match cmd {
            PoolCommand::Visibility(visible) => {
                self.visible = visible;
                self.broadcast(|| ContextMessage::Visibility(visible));
            }
            PoolCommand::Size(size) => {
                self.size = size;
                self.assign_regions();
            }
            PoolCommand::Viewport(viewport) => {
                self.viewport = viewport;
                self.broadcast(|| ContextMessage::Viewport(viewport));
            }
            PoolCommand::Render(payload) => {
                self.payload = Some(payload);
                self.send_shards();
            }
            PoolCommand::Patches(patches) => match self.payload.as_mut() {
                Some(payload) => {
                    apply_patches(payload, &patches);
                    self.send_shards();
                }
                None => log::debug!("{}: dropping {} patches, no payload yet", self.name, patches.len()),
            },
            PoolCommand::Pick { options, reply } => self.pick(options, reply),
            PoolCommand::Stats { reply } => {
                let samples = self.collect_stats().await;
                let _ = reply.send(self.renderer_stats(&samples));
            }
            PoolCommand::Dispose => {}
        }
    }

    fn broadcast(&self, msg: impl Fn() -> ContextMessage) {
        for executor in &self.executors {
            executor.context.send(msg());
        }
    }

    /// New executors learn visibility and viewport before anything else.
    fn start_executor(&self, index: usize, renderer: Box<dyn Renderer>) -> Executor {
        let context = ContextWorker::spawn(renderer, self.settings.clone(), &self.runtime);
        context.send(ContextMessage::Visibility(self.visible));
        context.send(ContextMessage::Viewport(self.viewport));
        log::debug!("{}: executor {index} runs in context {}", self.name, context.id());

        Executor {
            index,
            region: SurfaceRegion::default(),
            context,
        }
    }

    fn build_executor(&self, index: usize, count: usize) -> Option<Executor> {
        let region = self
            .config
            .layout
            .regions(self.size, count)
            .get(index)
            .copied()
            .unwrap_or_default();

        match self.builder.build(&SurfaceRequest::executor(index, region)) {
            Ok(renderer) => Some(self.start_executor(index, renderer)),
            Err(e) => {
                log::error!("{}: cannot build executor {index}: {e:#}", self.name);
                None
            }
        }
    }

    fn assign_regions(&mut self) {
        let regions = self.config.layout.regions(self.size, self.executors.len());
        for (executor, region) in self.executors.iter_mut().zip(regions) {
            executor.region = region;
            executor.context.send(ContextMessage::Region(region));
        }
    }

    fn send_shards(&self) {
        let Some(payload) = &self.payload else {
            return;
        };
        let shards = shard_payload(payload, &self.config.balanced_fields, self.executors.len());
        for (executor, shard) in self.executors.iter().zip(shards) {
            executor.context.send(ContextMessage::Render(shard));
        }
    }

    /// Regions and shards for the current roster.
    fn redistribute(&mut self) {
        self.assign_regions();
        self.send_shards();
    }

    fn pick(&self, options: PickingOptions, reply: oneshot::Sender<Vec<PickingResult>>) {
        let timeout = self.config.stats_timeout;
        let mut pending: FuturesUnordered<_> = self
            .executors
            .iter()
            .filter(|e| region_accepts(&e.region, &options))
            .map(|e| {
                let offset = e.region.offset();
                let request = e.context.pick(options.translated(-offset.x, -offset.y));
                let index = e.index;
                async move { (index, tokio::time::timeout(timeout, request).await) }
            })
            .collect();

        let name = self.name.clone();
        self.runtime.spawn(async move {
            let mut seen = HashSet::new();
            let mut merged = Vec::new();

            while let Some((index, answer)) = pending.next().await {
                match answer {
                    Ok(Ok(hits)) => {
                        for mut hit in hits {
                            if seen.insert(hit.id.clone()) {
                                hit.executor = Some(index);
                                merged.push(hit);
                            }
                        }
                    }
                    Ok(Err(e)) => log::debug!("{name}: executor {index} lost during pick: {e}"),
                    Err(_) => log::debug!("{name}: executor {index} did not answer pick in time"),
                }
            }
            let _ = reply.send(merged);
        });
    }

    /// Latest stats per executor; `None` for executors whose context is gone.
    ///
    /// An executor still busy with a long frame when the timeout hits is not
    /// lost: it is reported with the stats of its last completed frame.
    async fn collect_stats(&self) -> Vec<Option<FrameStats>> {
        let timeout = self.config.stats_timeout;
        let name = &self.name;
        let requests = self.executors.iter().map(|e| {
            let request = e.context.stats();
            async move {
                match tokio::time::timeout(timeout, request).await {
                    Ok(Ok(stats)) => Some(stats),
                    Ok(Err(_)) => None,
                    Err(_) => {
                        log::debug!("{name}: executor {} busy past {timeout:?}, using its last frame", e.index);
                        Some(e.context.latest_stats())
                    }
                }
            }
        });
        futures::future::join_all(requests).await
    }

    fn renderer_stats(&self, samples: &[Option<FrameStats>]) -> RendererStats {
        let executors: Vec<FrameStats> = samples.iter().map(|s| s.unwrap_or_default()).collect();
        let last: Vec<Duration> = executors.iter().filter_map(|s| s.last_frame_time).collect();
        let means: Vec<Duration> = executors.iter().filter_map(|s| s.average_frame_time).collect();

        RendererStats {
            backend: self.name.clone(),
            variant: ControllerVariant::OrchestratedParallel,
            frame: FrameStats {
                frames: executors.iter().map(|s| s.frames).sum(),
                last_frame_time: average(&last),
                average_frame_time: average(&means),
            },
            executors,
        }
    }

    /// Replaces executors whose context died. Returns true when any was replaced.
    fn heal(&mut self, samples: &[Option<FrameStats>]) -> bool {
        let count = self.executors.len();
        let mut healed = false;

        for index in 0..count {
            let answered = samples.get(index).is_some_and(Option::is_some);
            if answered && !self.executors[index].context.is_closed() {
                continue;
            }
            log::warn!("{}: executor {index} lost, replacing it", self.name);
            if let Some(fresh) = self.build_executor(index, count) {
                let failed = std::mem::replace(&mut self.executors[index], fresh);
                failed.context.dispose();
                healed = true;
            }
        }
        healed
    }

    async fn rebalance(&mut self) {
        let samples = self.collect_stats().await;
        let mut changed = self.heal(&samples);

        let reported: Vec<Duration> = samples.iter().flatten().filter_map(|s| s.last_frame_time).collect();
        let avg = average(&reported);
        let n = self.executors.len();

        match decide(avg, n, &self.config) {
            RebalanceDecision::Grow => {
                if let Some(executor) = self.build_executor(n, n + 1) {
                    self.executors.push(executor);
                    log::info!("{}: average frame time {:?}, growing to {} executors", self.name, avg, n + 1);
                    changed = true;
                }
            }
            RebalanceDecision::Shrink => {
                if let Some(mut executor) = self.executors.pop() {
                    log::info!("{}: average frame time {:?}, shrinking to {} executors", self.name, avg, n - 1);
                    executor.context.shutdown(self.config.stats_timeout).await;
                    changed = true;
                }
            }
            RebalanceDecision::Hold => {
                log::trace!("{}: holding at {n} executors ({:?})", self.name, avg);
            }
        }

        if changed {
            self.redistribute();
        }
        if let Some(profiling) = &self.profiling {
            profiling.report(&self.renderer_stats(&samples));
        }
    }

    async fn shutdown(&mut self) {
        let timeout = self.config.stats_timeout;
        futures::future::join_all(self.executors.iter_mut().map(|e| e.context.shutdown(timeout))).await;
        self.executors.clear();
    }
}
