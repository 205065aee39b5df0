//! PipelineExecutor - runs one job from `Queued` to a terminal state.
//!
//! The executor owns no job state. Log lines, progress and the outcome are
//! published on the [`EventBus`], which records them on the job in the
//! [`TaskRegistry`] before waking streams, so a status poll never lags behind
//! what a stream shows.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::event_bus::EventBus;
use super::pipeline::{PipelinePlan, StageKind};
use super::registry::TaskRegistry;
use crate::domain::{ArtifactRef, ForgeError, JobEvent, JobId, JobState, Mode, StageRequest};
use crate::impls::workspace::{JobWorkspace, analysis_target, display_name};
use crate::ports::{
    AcquireInput, AnalyzeInput, ClassifyInput, PackageEntry, PackageInput, SeparateInput,
    StageSet,
};

pub struct PipelineExecutor {
    registry: Arc<TaskRegistry>,
    bus: Arc<EventBus>,
    stages: StageSet,
    work_dir: PathBuf,
}

/// What earlier stages produced, consumed by later ones.
#[derive(Default)]
struct Outputs {
    audio: Option<PathBuf>,
    stems: Option<PathBuf>,
    artifact: Option<ArtifactRef>,
}

impl PipelineExecutor {
    pub fn new(
        registry: Arc<TaskRegistry>,
        bus: Arc<EventBus>,
        stages: StageSet,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            bus,
            stages,
            work_dir: work_dir.into(),
        }
    }

    /// Run the job to completion. Failures end the job in `Error`; nothing
    /// is returned to the caller.
    pub async fn execute(&self, id: JobId, request: StageRequest) {
        let reporter = Reporter::new(id, &self.bus);
        match self.run(&reporter, &request).await {
            Ok(artifact) => reporter.finish(artifact),
            Err(err) => reporter.fail(&err.to_string()),
        }
    }

    /// End a job whose execution was lost (e.g. a panicking adapter).
    pub fn abort(&self, id: JobId, message: &str) {
        Reporter::new(id, &self.bus).fail(message);
    }

    async fn run(
        &self,
        reporter: &Reporter<'_>,
        request: &StageRequest,
    ) -> Result<Option<ArtifactRef>, ForgeError> {
        let id = reporter.id;
        self.registry.mark_running(id)?;

        let workspace = JobWorkspace::new(&self.work_dir, id);
        let mut outputs = Outputs {
            audio: workspace.existing_audio(),
            ..Outputs::default()
        };
        let plan = PipelinePlan::for_request(request, outputs.audio.is_some());
        info!(job_id = %id, mode = ?request.mode, stages = ?plan.stages(), "pipeline started");

        if plan.needs_existing_audio() && outputs.audio.is_none() {
            return Err(ForgeError::NoAudioAvailable);
        }

        for &stage in plan.stages() {
            let (start, end) = stage.checkpoints();
            reporter.log(stage.announcement())?;
            reporter.progress(start)?;

            debug!(job_id = %id, stage = stage.name(), "stage started");
            self.run_stage(stage, request, &workspace, &mut outputs, reporter)
                .await?;

            if end > start {
                reporter.progress(end)?;
            }
        }
        Ok(outputs.artifact)
    }

    async fn run_stage(
        &self,
        stage: StageKind,
        request: &StageRequest,
        workspace: &JobWorkspace,
        outputs: &mut Outputs,
        reporter: &Reporter<'_>,
    ) -> Result<(), ForgeError> {
        match stage {
            StageKind::Acquire => {
                let audio = self
                    .stages
                    .acquire
                    .run(AcquireInput {
                        source: request.source.clone().unwrap_or_default(),
                        raw_dir: workspace.raw_dir(),
                    })
                    .await?;
                reporter.log(format!("Downloaded: {}", display_name(&audio)))?;
                outputs.audio = Some(audio);
            }
            StageKind::Separate => {
                let audio = outputs.audio.clone().ok_or(ForgeError::NoAudioAvailable)?;
                let folder = self
                    .stages
                    .separate
                    .run(SeparateInput {
                        audio,
                        stems_root: workspace.stems_dir(),
                    })
                    .await?;
                reporter.log(format!("Stems ready: {}", folder.display()))?;
                outputs.stems = Some(folder);
            }
            StageKind::Analyze => {
                let audio = analysis_target(outputs.stems.as_deref(), outputs.audio.as_deref())
                    .ok_or(ForgeError::NoAudioAvailable)?;
                let analysis = self
                    .stages
                    .analyze
                    .run(AnalyzeInput {
                        audio,
                        meta_out: workspace.meta_path(),
                    })
                    .await?;
                reporter.log(analysis.summary())?;
            }
            StageKind::Classify => {
                let source_dir = outputs.stems.clone().unwrap_or_else(|| workspace.raw_dir());
                self.stages
                    .classify
                    .run(ClassifyInput {
                        source_dir,
                        out_dir: workspace.out_dir(),
                    })
                    .await?;
            }
            StageKind::Package => {
                let include = if request.mode == Mode::DrumKit {
                    // the organised kit already sits in the staging dir
                    Vec::new()
                } else {
                    bundle(workspace, outputs.stems.as_deref())
                };
                let artifact = self
                    .stages
                    .package
                    .run(PackageInput {
                        staging_dir: workspace.out_dir(),
                        include,
                        archive: workspace.archive_path(),
                    })
                    .await?;
                outputs.artifact = Some(artifact);
            }
        }
        Ok(())
    }
}

/// Deliverables of a non-kit package: raw audio, the stem folder of this
/// track, analysis.
fn bundle(workspace: &JobWorkspace, stems: Option<&Path>) -> Vec<PackageEntry> {
    let mut include = Vec::new();
    if let Some(folder) = stems {
        include.push(PackageEntry::new(folder, "stems"));
    }
    include.extend(
        [
            (workspace.raw_dir(), "raw"),
            (workspace.meta_path(), "meta.json"),
        ]
        .into_iter()
        .filter(|(path, _)| path.exists())
        .map(|(path, name)| PackageEntry::new(path, name)),
    );
    include
}

/// Publishes one job's observable effects.
struct Reporter<'a> {
    id: JobId,
    bus: &'a EventBus,
}

impl<'a> Reporter<'a> {
    fn new(id: JobId, bus: &'a EventBus) -> Self {
        Self { id, bus }
    }

    fn log(&self, line: impl Into<String>) -> Result<(), ForgeError> {
        let line = line.into();
        debug!(job_id = %self.id, "{line}");
        self.bus.publish(self.id, JobEvent::log(line))
    }

    fn progress(&self, pct: u8) -> Result<(), ForgeError> {
        self.bus.publish(self.id, JobEvent::progress(pct))
    }

    fn finish(&self, artifact: Option<ArtifactRef>) {
        let result = self
            .log("Process complete !")
            .and_then(|()| self.bus.publish(self.id, JobEvent::Done { artifact }));
        match result {
            Ok(()) => info!(job_id = %self.id, state = %JobState::Done, "job finished"),
            Err(err) => {
                warn!(job_id = %self.id, error = %err, "could not complete job");
                self.fail(&err.to_string());
            }
        }
    }

    fn fail(&self, message: &str) {
        warn!(job_id = %self.id, error = message, "job failed");
        let failed = JobEvent::Failed {
            message: message.to_string(),
        };
        if let Err(err) = self.bus.publish(self.id, failed) {
            warn!(job_id = %self.id, error = %err, "cannot record job failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::event_bus::Subscription;
    use crate::app::test_support::FakeStages;
    use crate::domain::Steps;
    use std::time::Duration;

    struct Harness {
        registry: Arc<TaskRegistry>,
        bus: Arc<EventBus>,
        executor: PipelineExecutor,
        tmp: tempfile::TempDir,
    }

    impl Harness {
        fn new(stages: &FakeStages) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let registry = Arc::new(TaskRegistry::new());
            let bus = Arc::new(EventBus::new(Arc::clone(&registry)));
            let executor = PipelineExecutor::new(
                Arc::clone(&registry),
                Arc::clone(&bus),
                stages.set(),
                tmp.path(),
            );
            Self {
                registry,
                bus,
                executor,
                tmp,
            }
        }

        fn work_dir(&self) -> &std::path::Path {
            self.tmp.path()
        }

        fn submit(&self) -> (JobId, Subscription) {
            let id = self.registry.create();
            self.bus.open(id);
            (id, self.bus.subscribe(id).unwrap())
        }
    }

    fn request(mode: Mode, steps: Steps) -> StageRequest {
        StageRequest::new(Some("https://example.com/track".into()), mode, steps)
    }

    async fn drain(mut sub: Subscription) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(event) =
            tokio::time::timeout(Duration::from_secs(1), sub.next()).await.unwrap()
        {
            events.push(event);
        }
        events
    }

    fn progress_values(events: &[JobEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Progress { pct } => Some(*pct),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn full_split_runs_in_order_and_packages() {
        let stages = FakeStages::default();
        let h = Harness::new(&stages);
        let (id, sub) = h.submit();

        h.executor
            .execute(id, request(Mode::FullSplit, Steps::default()))
            .await;

        assert_eq!(stages.calls(), ["acquire", "separate", "analyze", "package"]);
        let job = h.registry.get(id).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.progress, 100);
        assert!(job.artifact.unwrap().path().ends_with("package.zip"));
        assert_eq!(job.log.first().map(String::as_str), Some("Analyzing link"));
        assert!(job.log.contains(&"Downloaded: song.wav".to_string()));
        assert!(job.log.contains(&"Key=A, BPM≈124.0".to_string()));
        assert_eq!(job.log.last().map(String::as_str), Some("Process complete !"));

        let workspace = JobWorkspace::new(h.work_dir(), id);
        assert_eq!(
            stages.packaged(),
            [
                PackageEntry::new(workspace.stems_dir().join("htdemucs").join("song"), "stems"),
                PackageEntry::new(workspace.raw_dir(), "raw"),
            ]
        );

        let events = drain(sub).await;
        assert!(matches!(
            events.last(),
            Some(JobEvent::Done { artifact: Some(_) })
        ));
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_hits_100_only_on_done() {
        let stages = FakeStages::default();
        let h = Harness::new(&stages);
        let (id, sub) = h.submit();

        h.executor
            .execute(id, request(Mode::DrumKit, Steps::default()))
            .await;

        let values = progress_values(&drain(sub).await);
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");
        assert_eq!(values.last(), Some(&100));
        assert_eq!(values.iter().filter(|&&v| v == 100).count(), 1);
    }

    #[tokio::test]
    async fn details_only_without_audio_fails_before_analysis() {
        let stages = FakeStages::default();
        let h = Harness::new(&stages);
        let (id, sub) = h.submit();
        let steps = Steps {
            download: false,
            ..Steps::default()
        };

        h.executor.execute(id, request(Mode::DetailsOnly, steps)).await;

        assert!(stages.calls().is_empty());
        let job = h.registry.get(id).unwrap();
        assert_eq!(job.state, JobState::Error);
        assert_eq!(job.message.as_deref(), Some("No audio available for analysis."));
        assert!(job.progress < 100);
        assert_eq!(
            job.log.last().map(String::as_str),
            Some("[error] No audio available for analysis.")
        );
        assert!(matches!(
            drain(sub).await.last(),
            Some(JobEvent::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn details_only_downloads_when_allowed() {
        let stages = FakeStages::default();
        let h = Harness::new(&stages);
        let (id, _sub) = h.submit();
        let steps = Steps {
            package: false,
            ..Steps::default()
        };

        h.executor.execute(id, request(Mode::DetailsOnly, steps)).await;

        assert_eq!(stages.calls(), ["acquire", "analyze"]);
        let job = h.registry.get(id).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert!(job.artifact.is_none());
    }

    #[tokio::test]
    async fn separation_failure_stops_pipeline() {
        let stages = FakeStages::failing_at("separate");
        let h = Harness::new(&stages);
        let (id, sub) = h.submit();

        h.executor
            .execute(id, request(Mode::FullSplit, Steps::default()))
            .await;

        assert_eq!(stages.calls(), ["acquire", "separate"]);
        let job = h.registry.get(id).unwrap();
        assert_eq!(job.state, JobState::Error);
        assert_eq!(job.message.as_deref(), Some("separate exploded"));
        assert!(job.artifact.is_none());
        assert!(job.progress < 100);

        let events = drain(sub).await;
        assert_eq!(
            events.last(),
            Some(&JobEvent::Failed {
                message: "separate exploded".into()
            })
        );
        assert!(!progress_values(&events).contains(&100));
    }

    #[tokio::test]
    async fn drum_kit_always_classifies_and_packages() {
        let stages = FakeStages::default();
        let h = Harness::new(&stages);
        let (id, _sub) = h.submit();
        let steps = Steps {
            analyze: false,
            package: false,
            ..Steps::default()
        };

        h.executor.execute(id, request(Mode::DrumKit, steps)).await;

        assert_eq!(
            stages.calls(),
            ["acquire", "separate", "analyze", "classify", "package"]
        );
        assert!(h.registry.get(id).unwrap().artifact.is_some());
    }

    #[tokio::test]
    async fn audio_only_without_package_has_no_artifact() {
        let stages = FakeStages::default();
        let h = Harness::new(&stages);
        let (id, _sub) = h.submit();

        h.executor
            .execute(id, request(Mode::AudioOnly, Steps::default()))
            .await;

        // AudioOnly never splits, even with `split` set
        assert_eq!(stages.calls(), ["acquire", "analyze", "package"]);
        assert_eq!(h.registry.get(id).unwrap().state, JobState::Done);
    }

    #[tokio::test]
    async fn abort_fails_a_queued_job() {
        let stages = FakeStages::default();
        let h = Harness::new(&stages);
        let (id, sub) = h.submit();

        h.executor.abort(id, "worker panicked");

        let job = h.registry.get(id).unwrap();
        assert_eq!(job.state, JobState::Error);
        assert_eq!(job.message.as_deref(), Some("worker panicked"));
        assert_eq!(
            drain(sub).await,
            vec![
                JobEvent::log("[error] worker panicked"),
                JobEvent::Failed {
                    message: "worker panicked".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn stream_lines_match_status_log() {
        let stages = FakeStages::failing_at("analyze");
        let h = Harness::new(&stages);
        let (id, sub) = h.submit();

        let live = tokio::spawn(drain(sub));
        h.executor
            .execute(id, request(Mode::FullSplit, Steps::default()))
            .await;
        let events = live.await.unwrap();

        let streamed: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                JobEvent::Log { line } => Some(line.clone()),
                _ => None,
            })
            .collect();
        let log = h.registry.get(id).unwrap().log;
        assert_eq!(streamed, log);
        assert_eq!(log.last().map(String::as_str), Some("[error] analyze exploded"));
    }

    #[tokio::test]
    async fn terminal_job_is_not_rerun() {
        let stages = FakeStages::default();
        let h = Harness::new(&stages);
        let (id, _sub) = h.submit();
        let req = request(Mode::AudioOnly, Steps::none());

        h.executor.execute(id, req.clone()).await;
        assert_eq!(h.registry.get(id).unwrap().state, JobState::Done);

        h.executor.execute(id, req).await;
        let job = h.registry.get(id).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.progress, 100);
    }
}
