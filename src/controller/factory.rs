use crate::config::FactoryConfig;
use crate::context::ContextSettings;
use crate::controller::capability::{select_variant, ControllerVariant, EnvironmentCapabilities};
use crate::controller::host::StatsReporter;
use crate::controller::{DirectController, IsolatedController, OrchestratedController, RendererController};
use crate::errors::ControllerError;
use crate::pool::ExecutorPoolConfig;
use crate::render::{RendererBuilder, SurfaceRequest};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Creates controllers, choosing the most isolated variant the environment and backend allow.
///
/// The environment is probed once, when the factory is created. A factory
/// created inside a tokio runtime keeps a handle to it and spawns every
/// isolated context there.
pub struct RendererControllerFactory {
    config: FactoryConfig,
    env: EnvironmentCapabilities,
    runtime: Option<Handle>,
}

impl RendererControllerFactory {
    pub fn new(config: FactoryConfig) -> Self {
        let runtime = Handle::try_current().ok();
        let env = EnvironmentCapabilities::probe();
        log::debug!(
            "controller factory: isolated contexts {}, parallelism {}",
            env.isolated_contexts,
            env.parallelism
        );
        Self { config, env, runtime }
    }

    /// Factory that only ever creates direct controllers.
    pub fn direct_only(config: FactoryConfig) -> Self {
        Self {
            config,
            env: EnvironmentCapabilities::direct_only(),
            runtime: None,
        }
    }

    pub fn environment(&self) -> &EnvironmentCapabilities {
        &self.env
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    fn reporter(&self, variant: ControllerVariant) -> Option<StatsReporter> {
        self.config.profiling.clone().map(|profiling| StatsReporter { profiling, variant })
    }

    fn settings(&self, variant: ControllerVariant) -> ContextSettings {
        ContextSettings::new(self.config.render_mode, self.config.frame_interval).with_reporter(self.reporter(variant))
    }

    fn resolve(&self, requested: ControllerVariant, builder: &dyn RendererBuilder) -> Option<&Handle> {
        let variant = select_variant(requested, &self.env, builder.capabilities());
        if variant != requested {
            log::warn!(
                "{}: {requested} rendering not available, falling back to {variant}",
                builder.name()
            );
            return None;
        }
        self.runtime.as_ref()
    }

    /// Controller rendering in the caller's context.
    pub fn create(&self, builder: impl RendererBuilder + 'static) -> Result<Box<dyn RendererController>, ControllerError> {
        self.config.validate()?;
        self.create_direct(&builder)
    }

    fn create_direct(&self, builder: &dyn RendererBuilder) -> Result<Box<dyn RendererController>, ControllerError> {
        let renderer = builder
            .build(&SurfaceRequest::direct())
            .map_err(ControllerError::Construction)?;
        log::info!("{}: direct controller created", builder.name());

        Ok(Box::new(DirectController::new(
            renderer,
            builder.capabilities(),
            self.config.render_mode,
            self.reporter(ControllerVariant::Direct),
        )))
    }

    /// Controller rendering in its own context, or in the caller's when isolation is unavailable.
    ///
    /// A factory configuration with a zero frame interval is rejected by every
    /// `create*` method.
    pub fn create_offscreen_if_available(
        &self,
        builder: impl RendererBuilder + 'static,
    ) -> Result<Box<dyn RendererController>, ControllerError> {
        self.config.validate()?;
        let Some(runtime) = self.resolve(ControllerVariant::IsolatedSingle, &builder) else {
            return self.create_direct(&builder);
        };

        let renderer = match builder.build(&SurfaceRequest::offscreen()) {
            Ok(renderer) => renderer,
            Err(e) => {
                log::warn!("{}: offscreen renderer failed ({e:#}), falling back to direct", builder.name());
                return self.create_direct(&builder);
            }
        };
        log::info!("{}: isolated controller created", builder.name());

        Ok(Box::new(IsolatedController::spawn(
            renderer,
            builder.capabilities(),
            self.settings(ControllerVariant::IsolatedSingle),
            self.config.stats_timeout,
            runtime,
        )))
    }

    /// Controller sharding its payload over an executor pool, or a direct one
    /// when isolation is unavailable.
    ///
    /// An invalid `pool` configuration is an error even when the pool would
    /// not have been used.
    pub fn create_orchestrated_offscreen_if_available(
        &self,
        builder: impl RendererBuilder + 'static,
        pool: ExecutorPoolConfig,
    ) -> Result<Box<dyn RendererController>, ControllerError> {
        self.config.validate()?;
        pool.validate()?;

        let Some(runtime) = self.resolve(ControllerVariant::OrchestratedParallel, &builder) else {
            return self.create_direct(&builder);
        };
        if pool.max_executors > self.env.parallelism {
            log::debug!(
                "{}: up to {} executors on {} cpus",
                builder.name(),
                pool.max_executors,
                self.env.parallelism
            );
        }

        let builder: Arc<dyn RendererBuilder> = Arc::new(builder);
        let settings = ContextSettings::new(self.config.render_mode, self.config.frame_interval);
        match OrchestratedController::spawn(builder.clone(), pool, settings, self.config.profiling.clone(), runtime) {
            Ok(controller) => {
                log::info!("{}: orchestrated controller created", builder.name());
                Ok(Box::new(controller))
            }
            Err(ControllerError::Construction(e)) => {
                log::warn!("{}: executor renderer failed ({e:#}), falling back to direct", builder.name());
                self.create_direct(builder.as_ref())
            }
            Err(e) => Err(e),
        }
    }
}
