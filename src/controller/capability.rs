use crate::render::BackendCapabilities;

/// Where a controller keeps its renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerVariant {
    /// In the caller's context, drawing on host ticks
    Direct,
    /// In one isolated task with its own frame clock
    IsolatedSingle,
    /// Sharded over a pool of isolated executors
    OrchestratedParallel,
}

impl std::fmt::Display for ControllerVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ControllerVariant::Direct => "direct",
            ControllerVariant::IsolatedSingle => "isolated",
            ControllerVariant::OrchestratedParallel => "orchestrated",
        };
        f.write_str(s)
    }
}

/// What the host environment offers, probed once when a factory is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentCapabilities {
    /// A tokio runtime is available to host isolated contexts
    pub isolated_contexts: bool,
    /// Number of CPUs that can run contexts in parallel
    pub parallelism: usize,
}

impl EnvironmentCapabilities {
    pub fn probe() -> Self {
        Self {
            isolated_contexts: tokio::runtime::Handle::try_current().is_ok(),
            parallelism: num_cpus::get().max(1),
        }
    }

    /// An environment without isolated contexts.
    pub fn direct_only() -> Self {
        Self {
            isolated_contexts: false,
            parallelism: 1,
        }
    }
}

/// Resolves the variant for a request, given environment and backend capabilities.
///
/// Anything that cannot be isolated ends up [`ControllerVariant::Direct`].
pub fn select_variant(
    requested: ControllerVariant,
    env: &EnvironmentCapabilities,
    backend: BackendCapabilities,
) -> ControllerVariant {
    match requested {
        ControllerVariant::Direct => ControllerVariant::Direct,
        _ if !env.isolated_contexts => ControllerVariant::Direct,
        _ if !backend.contains(BackendCapabilities::OFFSCREEN) => ControllerVariant::Direct,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(isolated: bool) -> EnvironmentCapabilities {
        EnvironmentCapabilities {
            isolated_contexts: isolated,
            parallelism: 4,
        }
    }

    #[test]
    fn offscreen_backend_in_runtime_is_isolated() {
        let caps = BackendCapabilities::OFFSCREEN | BackendCapabilities::PICKING;
        assert_eq!(
            select_variant(ControllerVariant::IsolatedSingle, &env(true), caps),
            ControllerVariant::IsolatedSingle
        );
        assert_eq!(
            select_variant(ControllerVariant::OrchestratedParallel, &env(true), caps),
            ControllerVariant::OrchestratedParallel
        );
    }

    #[test]
    fn missing_capability_falls_back_to_direct() {
        assert_eq!(
            select_variant(ControllerVariant::IsolatedSingle, &env(false), BackendCapabilities::OFFSCREEN),
            ControllerVariant::Direct
        );
        assert_eq!(
            select_variant(ControllerVariant::OrchestratedParallel, &env(true), BackendCapabilities::PICKING),
            ControllerVariant::Direct
        );
    }

    #[test]
    fn probe_outside_runtime() {
        assert!(!EnvironmentCapabilities::probe().isolated_contexts);
    }

    #[tokio::test]
    async fn probe_inside_runtime() {
        let env = EnvironmentCapabilities::probe();
        assert!(env.isolated_contexts);
        assert!(env.parallelism >= 1);
    }
}
