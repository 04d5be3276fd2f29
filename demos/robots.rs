use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use viewer2d::render::backends::null::NullBuilder;
use viewer2d::render::backends::raster::{LatestFrames, RasterBuilder};
use viewer2d::render::{Color, Patch, Payload, PickingOptions, Shape, SurfaceSize, Viewport};
use viewer2d::{
    ExecutorPoolConfig, FactoryConfig, ProfilingConfig, RenderDispatcher, RendererControllerFactory, RendererStats,
};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const ROBOTS: usize = 400;

fn robot(rng: &mut impl Rng, index: usize) -> Shape {
    let color = Color::from_u8(rng.random_range(0..=255), rng.random_range(0..=255), rng.random_range(0..=255), 255);
    Shape::rectangle(
        rng.random_range(0.0..WIDTH as f64),
        rng.random_range(0.0..HEIGHT as f64),
        rng.random_range(4.0..24.0),
        rng.random_range(4.0..24.0),
        color,
    )
    .with_id(format!("robot-{index}"))
}

/// Moves every robot by a small random step.
fn wander(rng: &mut impl Rng, robots: &mut [Shape]) {
    for shape in robots.iter_mut() {
        if let Shape::Rectangle { x, y, .. } = shape {
            *x = (*x + rng.random_range(-3.0..3.0)).clamp(0.0, WIDTH as f64);
            *y = (*y + rng.random_range(-3.0..3.0)).clamp(0.0, HEIGHT as f64);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let profiling = ProfilingConfig::new(|stats: &RendererStats| {
        if stats.executor_count() > 0 {
            log::info!(
                "{} ({}): {} executors, last frame {:?}",
                stats.backend,
                stats.variant,
                stats.executor_count(),
                stats.frame.last_frame_time
            );
        }
    });
    let factory = RendererControllerFactory::new(FactoryConfig::default().with_profiling(profiling));

    // The raster backend renders into a CPU buffer that we can inspect afterwards.
    let frames = LatestFrames::new();
    let raster = factory.create_offscreen_if_available(RasterBuilder::with_sink(frames.clone()))?;

    // Simulate a heavy backend: every frame costs 20ms, so the pool grows.
    let heavy = NullBuilder::new("heavy").with_frame_cost(Duration::from_millis(20));
    let pool = ExecutorPoolConfig::new(["robots"])
        .with_bounds(1, 4)
        .with_frequency(Duration::from_millis(500));
    let pooled = factory.create_orchestrated_offscreen_if_available(heavy, pool)?;

    let mut dispatcher = RenderDispatcher::from_controllers([raster, pooled])?;
    dispatcher.set_size(SurfaceSize::new(WIDTH, HEIGHT));
    dispatcher.set_viewport(Viewport::new(0.0, 0.0, 1.0));

    let mut rng = rand::rng();
    let mut robots: Vec<Shape> = (0..ROBOTS).map(|i| robot(&mut rng, i)).collect();
    let scene = Payload::new()
        .with_field("robots", robots.clone())
        .with_field("labels", vec![Shape::text(10.0, 10.0, "robots", 14.0, Color::BLACK)]);
    dispatcher.render(dispatcher.backends().into_iter().map(|b| (b.to_string(), scene.clone())).collect::<Vec<_>>());

    for step in 0..60 {
        wander(&mut rng, &mut robots);
        let patches: BTreeMap<String, Vec<Patch>> = dispatcher
            .backends()
            .into_iter()
            .map(|b| (b.to_string(), vec![Patch::update("robots", robots.clone())]))
            .collect();
        dispatcher.render_patches(patches);

        if step % 20 == 0 {
            let x = rng.random_range(0.0..WIDTH as f64);
            let y = rng.random_range(0.0..HEIGHT as f64);
            let hits = dispatcher.pick_objects(PickingOptions::at(x, y)).await?;
            log::info!("pick at ({x:.0}, {y:.0}): {} hits", hits.len());
        }

        dispatcher.tick();
        sleep(Duration::from_millis(50)).await;
    }

    for stats in dispatcher.stats().await? {
        println!(
            "{:>8} {:<12} frames={:<5} executors={} avg={:?}",
            stats.backend,
            stats.variant.to_string(),
            stats.frame.frames,
            stats.executor_count(),
            stats.frame.average_frame_time
        );
    }
    if let Some((_, image)) = frames.get(None) {
        println!("raster frame {}x{}", image.width, image.height);
    }

    dispatcher.dispose();
    Ok(())
}
