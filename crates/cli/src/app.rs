//! Wiring shared by every command

use anyhow::Context;
use audit::{InMemoryTraceSink, Tracer};
use engine::{Services, WorkflowEngine};
use gateway::{HttpOracle, InMemoryWorld, ReasoningOracle, ScriptedOracle};
use shared::EngineConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where configuration and world data come from
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub config: Option<PathBuf>,
    pub world: Option<PathBuf>,
}

/// Load configuration: file if given, then `EMBER_*` overrides
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// A fully wired engine over an in-memory world
pub struct App {
    pub config: EngineConfig,
    pub world: Arc<InMemoryWorld>,
    pub engine: Arc<WorkflowEngine>,
    pub traces: Arc<InMemoryTraceSink>,
}

impl App {
    pub fn build(sources: &Sources) -> anyhow::Result<Self> {
        Self::build_with_oracle(sources, None)
    }

    /// Build with an explicit oracle instead of the configured one
    pub fn build_with_oracle(
        sources: &Sources,
        oracle: Option<Arc<dyn ReasoningOracle>>,
    ) -> anyhow::Result<Self> {
        let config = load_config(sources.config.as_deref())?;

        let world = match &sources.world {
            Some(path) => InMemoryWorld::from_yaml_file(path)
                .with_context(|| format!("Failed to load world from {}", path.display()))?,
            None => InMemoryWorld::demo()?,
        };
        let world = Arc::new(world);

        let oracle = match oracle {
            Some(oracle) => oracle,
            None => configured_oracle(&config)?,
        };

        let traces = Arc::new(InMemoryTraceSink::default());
        let engine = WorkflowEngine::new(
            config.clone(),
            Services::new(world.clone(), oracle, world.clone()),
        )
        .with_tracer(Tracer::new(traces.clone()));

        Ok(Self {
            config,
            world,
            engine: Arc::new(engine),
            traces,
        })
    }
}

/// HTTP oracle when an endpoint is configured, otherwise the scripted one
fn configured_oracle(config: &EngineConfig) -> anyhow::Result<Arc<dyn ReasoningOracle>> {
    match &config.oracle.endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Using HTTP reasoning oracle");
            Ok(Arc::new(HttpOracle::from_config(&config.oracle)?))
        }
        None => {
            tracing::info!("No oracle endpoint configured, using scripted oracle");
            Ok(Arc::new(ScriptedOracle::new()))
        }
    }
}
