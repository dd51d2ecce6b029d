use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rindex_repo::{InMemoryKvStore, KeyValueStore, Repository};
use tracing::{info, warn, Level};

use crate::config::RuntimeConfig;
use crate::connections::ConnectionRegistry;
use crate::error::{BootstrapError, RuntimeError, RuntimeResult};
use crate::logging::init_logging;

// ---------------------------------------------------------------------------
// Step results
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Failed { reason: String },
}

/// Recorded result of one bootstrap step.
#[derive(Clone, Debug)]
pub struct StepResult {
    pub step_name: String,
    pub outcome: StepOutcome,
    pub elapsed: Duration,
}

impl StepResult {
    pub fn is_completed(&self) -> bool {
        self.outcome == StepOutcome::Completed
    }
}

/// Per-step results in execution order.
#[derive(Clone, Debug, Default)]
pub struct BootstrapReport {
    pub steps: Vec<StepResult>,
    pub elapsed: Duration,
}

impl BootstrapReport {
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.step_name.as_str()).collect()
    }

    /// The step that stopped the pipeline, if any.
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.is_completed())
    }
}

// ---------------------------------------------------------------------------
// Context and steps
// ---------------------------------------------------------------------------

/// State shared by the bootstrap steps. Each step reads what earlier steps
/// produced and adds its own piece.
pub struct BootstrapContext {
    pub config: RuntimeConfig,
    pub store: Option<Arc<dyn KeyValueStore>>,
    pub repositories: BTreeMap<String, Arc<Repository>>,
    pub connections: Arc<ConnectionRegistry>,
}

impl BootstrapContext {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            store: None,
            repositories: BTreeMap::new(),
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Start with an already connected store; [`ConnectStore`] keeps it.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> RuntimeResult<&Arc<dyn KeyValueStore>> {
        self.store.as_ref().ok_or(RuntimeError::StoreNotConnected)
    }
}

/// One stage of runtime initialization.
#[async_trait]
pub trait InitStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut BootstrapContext) -> RuntimeResult<()>;
}

/// Installs the global subscriber at the configured `log_level`, or at the
/// override level when one is set. A subscriber installed earlier stays.
#[derive(Default)]
pub struct InitLogging {
    override_level: Option<Level>,
}

impl InitLogging {
    pub fn from_config() -> Self {
        Self::default()
    }

    pub fn with_override(level: Level) -> Self {
        Self {
            override_level: Some(level),
        }
    }
}

#[async_trait]
impl InitStep for InitLogging {
    fn name(&self) -> &str {
        "init-logging"
    }

    async fn run(&self, ctx: &mut BootstrapContext) -> RuntimeResult<()> {
        let level = match self.override_level {
            Some(level) => level,
            None => ctx.config.level()?,
        };
        if init_logging(level) {
            info!(%level, "logging initialized");
        }
        Ok(())
    }
}

/// Connects the store: keeps one already in the context, otherwise uses the
/// store given to this step, otherwise a fresh in-memory store.
#[derive(Default)]
pub struct ConnectStore {
    store: Option<Arc<dyn KeyValueStore>>,
}

impl ConnectStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store: Some(store) }
    }
}

#[async_trait]
impl InitStep for ConnectStore {
    fn name(&self) -> &str {
        "connect-store"
    }

    async fn run(&self, ctx: &mut BootstrapContext) -> RuntimeResult<()> {
        if ctx.store.is_some() {
            info!("using store provided by caller");
            return Ok(());
        }
        let store = match &self.store {
            Some(store) => Arc::clone(store),
            None => {
                info!("no store configured, using in-memory store");
                Arc::new(InMemoryKvStore::new())
            }
        };
        ctx.store = Some(store);
        Ok(())
    }
}

/// Builds one [`Repository`] per configured collection on the connected
/// store, keyed by repository name.
pub struct RegisterRepositories;

#[async_trait]
impl InitStep for RegisterRepositories {
    fn name(&self) -> &str {
        "register-repositories"
    }

    async fn run(&self, ctx: &mut BootstrapContext) -> RuntimeResult<()> {
        let store = Arc::clone(ctx.store()?);
        for config in &ctx.config.collections {
            let name = config.display_name().to_string();
            if ctx.repositories.contains_key(&name) {
                return Err(RuntimeError::DuplicateCollection(name));
            }
            info!(
                repository = %name,
                collection = %config.collection,
                strict_population = config.strict_population,
                "registering repository"
            );
            let repository = Repository::new(config.clone(), Arc::clone(&store));
            ctx.repositories.insert(name, Arc::new(repository));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// An ordered, fail-fast pipeline of [`InitStep`]s.
pub struct Bootstrap {
    steps: Vec<Box<dyn InitStep>>,
}

impl Bootstrap {
    /// An empty pipeline.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// InitLogging -> ConnectStore -> RegisterRepositories
    pub fn standard() -> Self {
        let mut bootstrap = Self::new();
        bootstrap.add_step(Box::new(InitLogging::from_config()));
        bootstrap.add_step(Box::new(ConnectStore::in_memory()));
        bootstrap.add_step(Box::new(RegisterRepositories));
        bootstrap
    }

    pub fn add_step(&mut self, step: Box<dyn InitStep>) {
        self.steps.push(step);
    }

    pub fn with_step(mut self, step: Box<dyn InitStep>) -> Self {
        self.add_step(step);
        self
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Run every step in order. The first failing step stops the pipeline.
    pub async fn run(&self, mut ctx: BootstrapContext) -> Result<Runtime, BootstrapError> {
        let pipeline_start = Instant::now();
        let mut report = BootstrapReport::default();

        for step in &self.steps {
            let step_start = Instant::now();
            info!(step = step.name(), "running bootstrap step");
            let result = step.run(&mut ctx).await;
            let elapsed = step_start.elapsed();

            match result {
                Ok(()) => report.steps.push(StepResult {
                    step_name: step.name().to_string(),
                    outcome: StepOutcome::Completed,
                    elapsed,
                }),
                Err(err) => {
                    let reason = err.to_string();
                    warn!(step = step.name(), error = %reason, "bootstrap step failed");
                    report.steps.push(StepResult {
                        step_name: step.name().to_string(),
                        outcome: StepOutcome::Failed {
                            reason: reason.clone(),
                        },
                        elapsed,
                    });
                    report.elapsed = pipeline_start.elapsed();
                    return Err(BootstrapError::StepFailed {
                        step: step.name().to_string(),
                        reason,
                        report,
                    });
                }
            }
        }

        report.elapsed = pipeline_start.elapsed();
        let Some(store) = ctx.store else {
            return Err(BootstrapError::NoStore { report });
        };
        info!(
            name = %ctx.config.name,
            repositories = ctx.repositories.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "bootstrap complete"
        );
        Ok(Runtime {
            config: ctx.config,
            store,
            repositories: ctx.repositories,
            connections: ctx.connections,
            report,
        })
    }
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// A bootstrapped runtime.
pub struct Runtime {
    config: RuntimeConfig,
    store: Arc<dyn KeyValueStore>,
    repositories: BTreeMap<String, Arc<Repository>>,
    connections: Arc<ConnectionRegistry>,
    report: BootstrapReport,
}

impl Runtime {
    /// Run the standard pipeline over `config` with an in-memory store.
    pub async fn start(config: RuntimeConfig) -> Result<Self, BootstrapError> {
        Bootstrap::standard().run(BootstrapContext::new(config)).await
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn repository(&self, name: &str) -> Option<&Arc<Repository>> {
        self.repositories.get(name)
    }

    /// Registered repository names, sorted.
    pub fn repository_names(&self) -> Vec<&str> {
        self.repositories.keys().map(String::as_str).collect()
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    pub fn report(&self) -> &BootstrapReport {
        &self.report
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("name", &self.config.name)
            .field("repositories", &self.repository_names())
            .field("connections", &self.connections.len())
            .finish()
    }
}
