//! EngineBuilder - wiring of registry, bus, executor and workers.
//!
//! `build()` checks up front that every stage has an adapter, so a
//! misconfigured engine fails at start-up instead of on the first job.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::event_bus::{EventBus, Subscription};
use super::executor::PipelineExecutor;
use super::registry::{StateCounts, TaskRegistry};
use super::sweeper::RetentionSweeper;
use super::worker::WorkerPool;
use crate::config::EngineConfig;
use crate::domain::{ArtifactRef, ForgeError, Job, JobId, StageRequest};
use crate::impls;
use crate::ports::{
    AcquireInput, AnalyzeInput, AudioAnalysis, ClassifyInput, Clock, IdGenerator, PackageInput,
    SeparateInput, StageAdapter, StageSet, SystemClock, UlidGenerator,
};

/// Builds an [`Engine`].
///
/// # Example
/// ```ignore
/// let engine = EngineBuilder::new(EngineConfig::default())
///     .with_default_adapters()
///     .build()?;
/// let id = engine.submit(request)?;
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    acquire: Option<Arc<dyn StageAdapter<AcquireInput, PathBuf>>>,
    separate: Option<Arc<dyn StageAdapter<SeparateInput, PathBuf>>>,
    analyze: Option<Arc<dyn StageAdapter<AnalyzeInput, AudioAnalysis>>>,
    classify: Option<Arc<dyn StageAdapter<ClassifyInput, PathBuf>>>,
    package: Option<Arc<dyn StageAdapter<PackageInput, ArtifactRef>>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing stage adapters: {0:?}. Every stage needs an adapter before the engine starts.")]
    MissingStages(Vec<&'static str>),
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            acquire: None,
            separate: None,
            analyze: None,
            classify: None,
            package: None,
            clock: None,
            ids: None,
        }
    }

    /// Process-backed adapters from `config.tools`.
    pub fn with_default_adapters(self) -> Self {
        let stages = impls::default_stages(&self.config.tools);
        self.with_stages(stages)
    }

    pub fn with_stages(mut self, stages: StageSet) -> Self {
        self.acquire = Some(stages.acquire);
        self.separate = Some(stages.separate);
        self.analyze = Some(stages.analyze);
        self.classify = Some(stages.classify);
        self.package = Some(stages.package);
        self
    }

    pub fn with_acquire(mut self, adapter: Arc<dyn StageAdapter<AcquireInput, PathBuf>>) -> Self {
        self.acquire = Some(adapter);
        self
    }

    pub fn with_separate(
        mut self,
        adapter: Arc<dyn StageAdapter<SeparateInput, PathBuf>>,
    ) -> Self {
        self.separate = Some(adapter);
        self
    }

    pub fn with_analyze(
        mut self,
        adapter: Arc<dyn StageAdapter<AnalyzeInput, AudioAnalysis>>,
    ) -> Self {
        self.analyze = Some(adapter);
        self
    }

    pub fn with_classify(
        mut self,
        adapter: Arc<dyn StageAdapter<ClassifyInput, PathBuf>>,
    ) -> Self {
        self.classify = Some(adapter);
        self
    }

    pub fn with_package(
        mut self,
        adapter: Arc<dyn StageAdapter<PackageInput, ArtifactRef>>,
    ) -> Self {
        self.package = Some(adapter);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Start the engine. Must be called inside a Tokio runtime: workers and
    /// the optional retention sweeper are spawned here.
    pub fn build(self) -> Result<Engine, BuildError> {
        let stages = match (
            self.acquire,
            self.separate,
            self.analyze,
            self.classify,
            self.package,
        ) {
            (Some(acquire), Some(separate), Some(analyze), Some(classify), Some(package)) => {
                StageSet {
                    acquire,
                    separate,
                    analyze,
                    classify,
                    package,
                }
            }
            (acquire, separate, analyze, classify, package) => {
                let missing = [
                    ("acquire", acquire.is_none()),
                    ("separate", separate.is_none()),
                    ("analyze", analyze.is_none()),
                    ("classify", classify.is_none()),
                    ("package", package.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                return Err(BuildError::MissingStages(missing));
            }
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let registry = Arc::new(TaskRegistry::with_ports(ids, clock));
        let bus = Arc::new(EventBus::new(Arc::clone(&registry)));
        let config = self.config;

        let executor = Arc::new(PipelineExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&bus),
            stages,
            config.work_dir.clone(),
        ));
        let workers = WorkerPool::spawn(config.max_concurrent_jobs, executor);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = config.retention.map(|retention| {
            RetentionSweeper::new(
                Arc::clone(&registry),
                Arc::clone(&bus),
                config.work_dir.clone(),
                retention,
            )
            .spawn(config.sweep_interval, shutdown_rx)
        });

        info!(
            work_dir = %config.work_dir.display(),
            workers = config.max_concurrent_jobs,
            retention_secs = config.retention.map(|r| r.as_secs()),
            "engine started"
        );
        Ok(Engine {
            registry,
            bus,
            workers,
            shutdown_tx,
            sweeper: Mutex::new(sweeper),
        })
    }
}

/// The running orchestration engine. Cheap to share behind an `Arc`.
pub struct Engine {
    registry: Arc<TaskRegistry>,
    bus: Arc<EventBus>,
    workers: WorkerPool,
    shutdown_tx: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Create a job and queue it. Processing happens in the background.
    pub fn submit(&self, request: StageRequest) -> Result<JobId, ForgeError> {
        if self.workers.is_shutting_down() {
            return Err(ForgeError::ShuttingDown);
        }
        let id = self.registry.create();
        self.bus.open(id);
        self.enqueue(id, request)?;
        Ok(id)
    }

    /// Hand a fresh job to the workers. If shutdown won the race, the job is
    /// forgotten again so a rejected submission leaves nothing behind.
    fn enqueue(&self, id: JobId, request: StageRequest) -> Result<(), ForgeError> {
        let mode = request.mode;
        if let Err(err) = self.workers.submit(id, request) {
            self.bus.remove(id);
            self.registry.remove_queued(id);
            return Err(err);
        }
        info!(job_id = %id, ?mode, "job submitted");
        Ok(())
    }

    pub fn status(&self, id: JobId) -> Result<Job, ForgeError> {
        self.registry.get(id)
    }

    pub fn subscribe(&self, id: JobId) -> Result<Subscription, ForgeError> {
        self.bus.subscribe(id)
    }

    /// The packaged artifact, if the job produced one.
    pub fn artifact(&self, id: JobId) -> Result<Option<ArtifactRef>, ForgeError> {
        Ok(self.registry.get(id)?.artifact)
    }

    pub fn counts(&self) -> StateCounts {
        self.registry.counts()
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Stop taking jobs and wait for running ones. Jobs still queued stay
    /// `Queued`.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        self.workers.shutdown_and_join().await;

        let sweeper = self.sweeper.lock().take();
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                warn!(error = %e, "retention sweeper ended abnormally");
            }
        }

        let counts = self.registry.counts();
        if counts.queued > 0 {
            warn!(queued = counts.queued, "jobs left unstarted at shutdown");
        }
        info!("engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::FakeStages;
    use crate::domain::{JobEvent, JobState, Mode, Steps};
    use std::time::Duration;

    fn config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig::builder().with_work_dir(dir).build()
    }

    #[tokio::test]
    async fn build_reports_missing_stages() {
        let tmp = tempfile::tempdir().unwrap();
        let stages = FakeStages::default().set();

        let result = EngineBuilder::new(config(tmp.path()))
            .with_acquire(stages.acquire)
            .with_analyze(stages.analyze)
            .build();

        assert!(matches!(
            result,
            Err(BuildError::MissingStages(missing)) if missing == vec!["separate", "classify", "package"]
        ));
    }

    #[tokio::test]
    async fn build_with_default_adapters_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = EngineBuilder::new(config(tmp.path()))
            .with_default_adapters()
            .build()
            .unwrap();
        assert_eq!(engine.counts(), StateCounts::default());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn submitted_job_runs_to_done() {
        let tmp = tempfile::tempdir().unwrap();
        let stages = FakeStages::default();
        let engine = EngineBuilder::new(config(tmp.path()))
            .with_stages(stages.set())
            .build()
            .unwrap();

        let id = engine
            .submit(StageRequest::new(
                Some("https://example.com/x".into()),
                Mode::FullSplit,
                Steps::default(),
            ))
            .unwrap();
        let mut sub = engine.subscribe(id).unwrap();
        let mut last = None;
        while let Some(event) = tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .unwrap()
        {
            last = Some(event);
        }

        assert!(matches!(last, Some(JobEvent::Done { artifact: Some(_) })));
        assert_eq!(engine.status(id).unwrap().state, JobState::Done);
        assert!(engine.artifact(id).unwrap().is_some());
        assert_eq!(engine.counts().done, 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn submit_after_shutdown_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = EngineBuilder::new(config(tmp.path()))
            .with_stages(FakeStages::default().set())
            .build()
            .unwrap();
        engine.shutdown().await;

        let result = engine.submit(StageRequest::new(None, Mode::AudioOnly, Steps::none()));
        assert!(matches!(result, Err(ForgeError::ShuttingDown)));
        assert!(engine.registry().is_empty());
    }

    #[tokio::test]
    async fn job_losing_race_with_shutdown_is_forgotten() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = EngineBuilder::new(config(tmp.path()))
            .with_stages(FakeStages::default().set())
            .build()
            .unwrap();
        let id = engine.registry.create();
        engine.bus.open(id);
        engine.workers.request_shutdown();

        let result = engine.enqueue(id, StageRequest::new(None, Mode::AudioOnly, Steps::none()));

        assert!(matches!(result, Err(ForgeError::ShuttingDown)));
        assert!(engine.registry().is_empty());
        assert!(engine.subscribe(id).is_err());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = EngineBuilder::new(config(tmp.path()))
            .with_stages(FakeStages::default().set())
            .build()
            .unwrap();
        let id = JobId::from_ulid(ulid::Ulid::new());

        assert!(matches!(engine.status(id), Err(ForgeError::UnknownTask(_))));
        assert!(matches!(engine.artifact(id), Err(ForgeError::UnknownTask(_))));
        assert!(engine.subscribe(id).is_err());
        engine.shutdown().await;
    }
}
