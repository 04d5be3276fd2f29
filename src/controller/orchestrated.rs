use crate::config::ProfilingConfig;
use crate::context::ContextSettings;
use crate::controller::isolated::until_disposed;
use crate::controller::{ControllerVariant, PickFuture, RendererController, StatsFuture};
use crate::errors::ControllerError;
use crate::pool::{ExecutorPoolConfig, PoolCommand, PoolSetup, PoolSupervisor};
use crate::render::{
    BackendCapabilities, Patch, Payload, PickingOptions, RendererBuilder, SurfaceRegion, SurfaceRequest, SurfaceSize,
    Viewport,
};
use crate::sync::FrameTime;
use futures::FutureExt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Controller driving an executor pool through its supervisor.
pub struct OrchestratedController {
    name: String,
    capabilities: BackendCapabilities,
    tx: mpsc::UnboundedSender<PoolCommand>,
    supervisor: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    has_payload: bool,
}

impl OrchestratedController {
    /// Validates `config`, builds the initial executors' renderers and starts the pool.
    ///
    /// Renderers are built before anything is spawned, so a backend that
    /// cannot render offscreen fails here with [`ControllerError::Construction`].
    pub(crate) fn spawn(
        builder: Arc<dyn RendererBuilder>,
        config: ExecutorPoolConfig,
        settings: ContextSettings,
        profiling: Option<ProfilingConfig>,
        runtime: &Handle,
    ) -> Result<Self, ControllerError> {
        config.validate()?;

        let renderers = (0..config.initial())
            .map(|index| builder.build(&SurfaceRequest::executor(index, SurfaceRegion::default())))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(ControllerError::Construction)?;

        let name = builder.name().to_string();
        let capabilities = builder.capabilities();
        let setup = PoolSetup {
            name: name.clone(),
            builder,
            config,
            settings,
            profiling,
        };
        let (tx, supervisor) = PoolSupervisor::spawn(setup, renderers, runtime);

        Ok(Self {
            name,
            capabilities,
            tx,
            supervisor: Some(supervisor),
            cancel: CancellationToken::new(),
            has_payload: false,
        })
    }

    fn send(&self, cmd: PoolCommand) {
        if self.cancel.is_cancelled() {
            log::debug!("{}: ignoring call on disposed controller", self.name);
            return;
        }
        if self.tx.send(cmd).is_err() {
            log::warn!("{}: pool supervisor is gone", self.name);
        }
    }

    /// Disposes the pool and waits for the supervisor to tear every executor down.
    pub async fn shutdown(&mut self) {
        self.dispose();
        if let Some(join) = self.supervisor.take() {
            if let Err(e) = join.await {
                log::warn!("{}: supervisor ended abnormally: {e}", self.name);
            }
        }
    }
}

impl RendererController for OrchestratedController {
    fn name(&self) -> &str {
        &self.name
    }

    fn variant(&self) -> ControllerVariant {
        ControllerVariant::OrchestratedParallel
    }

    fn supports_picking(&self) -> bool {
        self.capabilities.contains(BackendCapabilities::PICKING)
    }

    fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_visibility(&mut self, visible: bool) {
        self.send(PoolCommand::Visibility(visible));
    }

    fn set_size(&mut self, size: SurfaceSize) {
        self.send(PoolCommand::Size(size));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.send(PoolCommand::Viewport(viewport));
    }

    fn render(&mut self, payload: Payload) {
        self.has_payload = true;
        self.send(PoolCommand::Render(payload));
    }

    fn render_patches(&mut self, patches: Vec<Patch>) {
        if !self.has_payload {
            log::debug!("{}: dropping {} patches, no payload yet", self.name, patches.len());
            return;
        }
        self.send(PoolCommand::Patches(patches));
    }

    fn pick_objects(&self, options: PickingOptions) -> PickFuture {
        if self.is_disposed() {
            return futures::future::ready(Err(ControllerError::Disposed)).boxed();
        }
        let (reply, rx) = oneshot::channel();
        self.send(PoolCommand::Pick { options, reply });
        until_disposed(self.cancel.clone(), async move { rx.await.map_err(|_| ControllerError::ContextLost) }).boxed()
    }

    fn stats(&self) -> StatsFuture {
        if self.is_disposed() {
            return futures::future::ready(Err(ControllerError::Disposed)).boxed();
        }
        let (reply, rx) = oneshot::channel();
        self.send(PoolCommand::Stats { reply });
        until_disposed(self.cancel.clone(), async move { rx.await.map_err(|_| ControllerError::ContextLost) }).boxed()
    }

    fn tick(&mut self, _frame: FrameTime) {}

    fn dispose(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let _ = self.tx.send(PoolCommand::Dispose);
        log::debug!("{}: orchestrated controller disposed", self.name);
    }
}

impl Drop for OrchestratedController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{FrameTimeThresholds, RegionLayout};
    use crate::render::backends::null::NullBuilder;
    use crate::render::backends::raster::{LatestFrames, RasterBuilder};
    use crate::render::{Color, PickingResult, Shape};
    use crate::sync::RenderMode;
    use std::time::Duration;

    fn rectangles(n: usize) -> Vec<Shape> {
        (0..n)
            .map(|i| Shape::rectangle(i as f64 * 10.0, 0.0, 10.0, 10.0, Color::BLACK).with_id(format!("r{i}")))
            .collect()
    }

    fn settings() -> ContextSettings {
        ContextSettings::new(RenderMode::OnDemand, Duration::from_millis(16))
    }

    fn spawn(builder: &NullBuilder, config: ExecutorPoolConfig) -> OrchestratedController {
        OrchestratedController::spawn(Arc::new(builder.clone()), config, settings(), None, &Handle::current()).unwrap()
    }

    fn spawn_continuous(builder: &NullBuilder, config: ExecutorPoolConfig) -> OrchestratedController {
        let settings = ContextSettings::new(RenderMode::Continuous, Duration::from_millis(16));
        OrchestratedController::spawn(Arc::new(builder.clone()), config, settings, None, &Handle::current()).unwrap()
    }

    fn shard_len(builder: &NullBuilder, executor: usize) -> usize {
        builder
            .executor_probe(executor)
            .and_then(|p| p.record().drawn_payload)
            .and_then(|p| p.field("rectangles").map(<[Shape]>::len))
            .unwrap_or(0)
    }

    #[tokio::test(start_paused = true)]
    async fn hundred_rectangles_over_four_executors() {
        let builder = NullBuilder::new("pool");
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(1, 4)
            .with_initial(4)
            .with_frequency(Duration::from_secs(3600));
        let mut c = spawn(&builder, config);

        c.render(
            Payload::new()
                .with_field("rectangles", rectangles(100))
                .with_field("labels", vec![Shape::text(0.0, 0.0, "scene", 12.0, Color::BLACK)]),
        );
        c.stats().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        for executor in 0..4 {
            assert_eq!(shard_len(&builder, executor), 25, "executor {executor}");
            let drawn = builder.executor_probe(executor).unwrap().record().drawn_payload.unwrap();
            assert_eq!(drawn.field("labels").unwrap().len(), 1);
        }

        let vp = Viewport::new(-30.0, 12.0, 1.5);
        c.set_viewport(vp);
        c.stats().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        for executor in 0..4 {
            let rec = builder.executor_probe(executor).unwrap().record();
            assert_eq!(rec.drawn_viewport, Some(vp), "executor {executor}");
        }

        let stats = c.stats().await.unwrap();
        assert_eq!(stats.executor_count(), 4);
        assert_eq!(stats.variant, ControllerVariant::OrchestratedParallel);
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn patches_are_resharded() {
        let builder = NullBuilder::new("pool");
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(2, 2)
            .with_frequency(Duration::from_secs(3600));
        let mut c = spawn(&builder, config);

        c.render_patches(vec![Patch::add("rectangles", rectangles(3))]);
        c.render(Payload::new().with_field("rectangles", rectangles(4)));
        c.render_patches(vec![Patch::remove("rectangles", vec![rectangles(4).remove(0)])]);
        c.stats().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(shard_len(&builder, 0) + shard_len(&builder, 1), 3);
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pick_routes_by_column_and_tags_executor() {
        let builder = NullBuilder::new("pool");
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(2, 2)
            .with_layout(RegionLayout::Columns)
            .with_frequency(Duration::from_secs(3600));
        let mut c = spawn(&builder, config);

        c.set_size(SurfaceSize::new(200, 100));
        // r0..r9 span x = 0..100; r10..r19 span x = 100..200
        c.render(Payload::new().with_field("rectangles", rectangles(20)));

        let hits = c.pick_objects(PickingOptions::at(155.0, 5.0)).await.unwrap();
        assert_eq!(
            hits,
            vec![PickingResult {
                id: "r15".into(),
                backend: None,
                executor: Some(1),
            }]
        );

        let hits = c.pick_objects(PickingOptions::at(25.0, 5.0)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].executor, Some(0));
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn layered_pick_deduplicates_by_id() {
        let builder = NullBuilder::new("pool");
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(3, 3)
            .with_frequency(Duration::from_secs(3600));
        let mut c = spawn(&builder, config);

        // unbalanced field: every executor holds the same keyed shape
        c.render(Payload::new().with_field(
            "background",
            vec![Shape::rectangle(0.0, 0.0, 100.0, 100.0, Color::BLACK).with_id("bg")],
        ));

        let hits = c.pick_objects(PickingOptions::at(50.0, 50.0)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "bg");
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unkeyed_shapes_on_different_executors_are_all_picked() {
        let builder = NullBuilder::new("pool");
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(2, 2)
            .with_frequency(Duration::from_secs(3600));
        let mut c = spawn(&builder, config);

        let square = Shape::rectangle(0.0, 0.0, 10.0, 10.0, Color::BLACK);
        c.render(Payload::new().with_field("rectangles", vec![square.clone(), square]));

        let mut hits = c.pick_objects(PickingOptions::at(5.0, 5.0)).await.unwrap();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        let found: Vec<_> = hits.iter().map(|h| (h.id.as_str(), h.executor)).collect();
        assert_eq!(found, vec![("rectangles[0]", Some(0)), ("rectangles[1]", Some(1))]);
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn column_frames_reach_the_sink_with_their_region() {
        let frames = LatestFrames::new();
        let builder: Arc<dyn RendererBuilder> = Arc::new(RasterBuilder::with_sink(frames.clone()));
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(2, 2)
            .with_layout(RegionLayout::Columns)
            .with_frequency(Duration::from_secs(3600));
        let mut c = OrchestratedController::spawn(builder, config, settings(), None, &Handle::current()).unwrap();

        c.set_size(SurfaceSize::new(200, 100));
        c.render(Payload::new().with_field("rectangles", rectangles(20)));
        c.stats().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let (left, left_frame) = frames.get(Some(0)).unwrap();
        let (right, right_frame) = frames.get(Some(1)).unwrap();
        assert_eq!(left, SurfaceRegion::new(0, 0, 100, 100));
        assert_eq!(right, SurfaceRegion::new(100, 0, 100, 100));
        assert_eq!((left_frame.width, right_frame.height), (100, 100));
        c.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn executors_busy_past_the_stats_timeout_are_kept() {
        let builder = NullBuilder::new("pool").with_frame_cost(Duration::from_millis(400));
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(2, 2)
            .with_frequency(Duration::from_millis(500));
        let mut c = spawn_continuous(&builder, config);

        c.render(Payload::new().with_field("rectangles", rectangles(10)));
        tokio::time::sleep(Duration::from_millis(2600)).await;
        assert_eq!(builder.builds().len(), 2);

        let stats = c.stats().await.unwrap();
        for executor in &stats.executors {
            assert!(executor.frames > 0);
            assert!(executor.last_frame_time >= Some(Duration::from_millis(400)));
        }
        c.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn busy_executors_still_count_towards_growth() {
        let builder = NullBuilder::new("pool").with_frame_cost(Duration::from_millis(400));
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(1, 2)
            .with_frequency(Duration::from_millis(500));
        let mut c = spawn_continuous(&builder, config);

        c.render(Payload::new().with_field("rectangles", rectangles(10)));
        tokio::time::sleep(Duration::from_millis(1300)).await;

        assert_eq!(c.stats().await.unwrap().executor_count(), 2);
        assert_eq!(builder.builds().len(), 2);
        c.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_frames_grow_the_pool_one_step_at_a_time() {
        let builder = NullBuilder::new("pool").with_frame_cost(Duration::from_millis(25));
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(1, 3)
            .with_frequency(Duration::from_millis(150))
            .with_thresholds(FrameTimeThresholds::default());
        let mut c = spawn(&builder, config);

        let mut counts = Vec::new();
        for _ in 0..6 {
            c.render(Payload::new().with_field("rectangles", rectangles(30)));
            tokio::time::sleep(Duration::from_millis(100)).await;
            counts.push(c.stats().await.unwrap().executor_count());
        }

        assert_eq!(counts.first(), Some(&1));
        assert_eq!(counts.last(), Some(&3));
        for pair in counts.windows(2) {
            assert!(pair[1] >= pair[0] && pair[1] - pair[0] <= 1, "{counts:?}");
        }
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fast_frames_shrink_down_to_min() {
        let builder = NullBuilder::new("pool");
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(2, 4)
            .with_initial(4)
            .with_frequency(Duration::from_millis(100));
        let mut c = spawn(&builder, config);

        for _ in 0..5 {
            c.render(Payload::new().with_field("rectangles", rectangles(40)));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(c.stats().await.unwrap().executor_count(), 2);
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_executor_is_replaced() {
        let builder = NullBuilder::new("pool");
        builder.crash_next(1);
        let config = ExecutorPoolConfig::new(["rectangles"])
            .with_bounds(2, 2)
            .with_frequency(Duration::from_millis(100));
        let mut c = spawn(&builder, config);

        c.render(Payload::new().with_field("rectangles", rectangles(10)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(builder.executor_probe(1).unwrap().record().frames == 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(builder.builds().len(), 3);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(shard_len(&builder, 1), 5);
        assert_eq!(c.stats().await.unwrap().executor_count(), 2);
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_settles_pending_pick() {
        let builder = NullBuilder::new("pool");
        let mut c = spawn(&builder, ExecutorPoolConfig::new(["rectangles"]).with_bounds(2, 2));

        let pick = c.pick_objects(PickingOptions::at(0.0, 0.0));
        c.dispose();
        c.dispose();
        assert!(matches!(pick.await, Err(ControllerError::Disposed)));

        c.shutdown().await;
        for (_, probe) in builder.builds() {
            assert!(probe.record().disposed);
        }
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let builder = NullBuilder::new("pool");
        let res = OrchestratedController::spawn(
            Arc::new(builder),
            ExecutorPoolConfig::new(["rectangles"]).with_bounds(3, 1),
            settings(),
            None,
            &Handle::current(),
        );
        assert!(matches!(res, Err(ControllerError::InvalidConfig(_))));
    }
}
