use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{StageError, StoreError};
use crate::job::{ArtifactRef, Job, JobFailure, JobId, JobMutation, Stage};
use crate::sanitize;
use crate::stages::{StageExecutor, StageSet};
use crate::storage::ArtifactStorage;
use crate::store::JobStore;

use super::config::PipelineConfig;
use super::context::JobContext;
use super::progress::ProgressReporter;

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Extract => "Extracting text from document...",
        Stage::Summarize => "Summarizing content...",
        Stage::Synthesize => "Synthesizing narration...",
        Stage::Render => "Rendering video...",
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Sequences the stage executors for each job and is the only writer of
/// job records after creation. Every enqueued job gets its own task and starts
/// at once; a slow or hung job never holds another one back.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<JobStore>,
    stages: StageSet,
    storage: ArtifactStorage,
    progress: Arc<dyn ProgressReporter>,
    config: Arc<PipelineConfig>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<JobStore>,
        stages: StageSet,
        storage: ArtifactStorage,
        progress: Arc<dyn ProgressReporter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            stages,
            storage,
            progress,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Spawns the job's pipeline as its own task and returns immediately.
    pub fn enqueue(&self, job_id: JobId) -> JoinHandle<Result<Arc<Job>, StoreError>> {
        let this = self.clone();
        let span = info_span!("pipeline", job_id = %job_id);
        tokio::spawn(async move { this.run(&job_id).await }.instrument(span))
    }

    /// Runs every remaining stage of a job and returns the final snapshot.
    ///
    /// Stage failures end in a `Failed` record and an `Ok` return. `Err` is
    /// only returned when the store rejects an update, which means the job
    /// was never created or was mutated by someone else.
    pub async fn run(&self, job_id: &JobId) -> Result<Arc<Job>, StoreError> {
        let mut job = self.store.get(job_id).ok_or_else(|| {
            let err = StoreError::InternalInconsistency {
                job_id: job_id.clone(),
                reason: "job was enqueued before it was created".to_string(),
            };
            error!(error = %err, "Cannot run unknown job");
            err
        })?;
        if job.is_finished() {
            debug!(status = %job.status, "Job already finished");
            return Ok(job);
        }

        info!(
            input = %sanitize::redact_path(&job.input_ref.path()),
            filename = job.filename.as_deref().unwrap_or("unknown"),
            "Starting conversion"
        );

        let work_dir = match self.storage.prepare_work_dir(job_id).await {
            Ok(dir) => dir,
            Err(e) => {
                let failure = JobFailure::new(job.stage, e.to_string());
                return self.fail(job_id, failure);
            }
        };
        let video_path = self.storage.video_path(job_id);

        while !job.is_finished() {
            let stage = job.stage;
            job = self
                .run_stage(&job, stage, &work_dir, &video_path)
                .instrument(info_span!("stage", stage = %stage))
                .await?;
        }

        match &job.error {
            None => info!(attempts = job.attempts, "Conversion completed"),
            Some(failure) => warn!(stage = %failure.stage, error = %failure.message, "Conversion failed"),
        }
        Ok(job)
    }

    async fn run_stage(
        &self,
        job: &Job,
        stage: Stage,
        work_dir: &Path,
        video_path: &Path,
    ) -> Result<Arc<Job>, StoreError> {
        let executor = self.stages.get(stage);
        let policy = self.config.retry;
        let mut attempt = 1;

        loop {
            let started = self.commit(&job.id, JobMutation::StageStarted(stage), stage_message(stage))?;
            let ctx = JobContext::new(&started, work_dir, video_path, attempt);

            match self.invoke(executor.as_ref(), &started.working_ref, &ctx).await {
                Ok(artifact) if artifact.kind == stage.output_kind() => {
                    debug!(artifact = %sanitize::redact_path(&artifact.path()), "Stage succeeded");
                    let message = if stage.is_last() {
                        "Conversion completed"
                    } else {
                        "Stage completed"
                    };
                    return self.commit(
                        &job.id,
                        JobMutation::StageSucceeded { stage, artifact },
                        message,
                    );
                }
                Ok(artifact) => {
                    let failure = JobFailure::new(
                        stage,
                        format!(
                            "Stage produced {} instead of {}",
                            artifact.kind,
                            stage.output_kind()
                        ),
                    );
                    return self.fail(&job.id, failure);
                }
                Err(e) if policy.should_retry(attempt, &e) => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Stage failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return self.fail(&job.id, JobFailure::new(stage, e.to_string()));
                }
            }
        }
    }

    /// One executor call with timeout and panic isolation.
    async fn invoke(
        &self,
        executor: &dyn StageExecutor,
        input: &ArtifactRef,
        ctx: &JobContext,
    ) -> Result<ArtifactRef, StageError> {
        let call = AssertUnwindSafe(executor.execute(input, ctx)).catch_unwind();

        let outcome = match self.config.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(StageError::Timeout(limit)),
            },
            None => call.await,
        };

        outcome.unwrap_or_else(|payload| Err(StageError::Panicked(panic_message(payload))))
    }

    fn fail(&self, job_id: &JobId, failure: JobFailure) -> Result<Arc<Job>, StoreError> {
        self.commit(job_id, JobMutation::Failed(failure), "Conversion failed")
    }

    /// Writes a mutation and publishes the resulting snapshot. Publishing
    /// happens after the write so subscribers see stages in store order.
    fn commit(
        &self,
        job_id: &JobId,
        mutation: JobMutation,
        message: &str,
    ) -> Result<Arc<Job>, StoreError> {
        match self.store.update(job_id, mutation) {
            Ok(job) => {
                self.progress.report(&job, message);
                Ok(job)
            }
            Err(e) => {
                error!(error = %e, "Job store rejected update");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ArtifactKind, JobStatus};
    use crate::pipeline::progress::{NoopProgress, RecordingProgress};
    use crate::pipeline::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    enum Behavior {
        Succeed,
        Fail(&'static str),
        FailTransient(u32),
        Hang,
        /// Hangs for the named job only.
        HangFor(&'static str),
        Panic,
        WrongKind,
    }

    struct Scripted {
        stage: Stage,
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(stage: Stage, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                stage,
                behavior,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl StageExecutor for Scripted {
        fn stage(&self) -> Stage {
            self.stage
        }

        async fn execute(
            &self,
            _input: &ArtifactRef,
            ctx: &JobContext,
        ) -> Result<ArtifactRef, StageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let produced = ArtifactRef::from_path(
                self.stage.output_kind(),
                &ctx.work_file(self.stage.as_str()),
            );
            match &self.behavior {
                Behavior::Succeed => Ok(produced),
                Behavior::Fail(msg) => Err(StageError::InvalidInput(msg.to_string())),
                Behavior::FailTransient(times) if call <= *times => {
                    Err(StageError::Remote("503 Service Unavailable".to_string()))
                }
                Behavior::FailTransient(_) => Ok(produced),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(produced)
                }
                Behavior::HangFor(id) if ctx.job_id.as_str() == *id => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(produced)
                }
                Behavior::HangFor(_) => Ok(produced),
                Behavior::Panic => panic!("executor exploded"),
                Behavior::WrongKind => Ok(ArtifactRef::new(ArtifactKind::Video, "/tmp/bogus")),
            }
        }
    }

    struct Fixture {
        _temp: TempDir,
        store: Arc<JobStore>,
        storage: ArtifactStorage,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let storage = ArtifactStorage::new(
            temp.path().join("input"),
            temp.path().join("work"),
            temp.path().join("output"),
            "/videos",
        );
        Fixture {
            _temp: temp,
            store: Arc::new(JobStore::new()),
            storage,
        }
    }

    fn stage_set(overrides: Vec<Arc<Scripted>>) -> StageSet {
        let pick = |stage: Stage| -> Arc<dyn StageExecutor> {
            match overrides.iter().find(|s| s.stage == stage) {
                Some(found) => Arc::clone(found) as Arc<dyn StageExecutor>,
                None => Scripted::new(stage, Behavior::Succeed) as Arc<dyn StageExecutor>,
            }
        };
        StageSet::new(
            pick(Stage::Extract),
            pick(Stage::Summarize),
            pick(Stage::Synthesize),
            pick(Stage::Render),
        )
        .unwrap()
    }

    fn orchestrator(
        fx: &Fixture,
        stages: StageSet,
        progress: Arc<dyn ProgressReporter>,
        config: PipelineConfig,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&fx.store),
            stages,
            fx.storage.clone(),
            progress,
            config,
        )
    }

    fn submit(fx: &Fixture, id: &str) -> JobId {
        let job_id = JobId::from(id);
        fx.store
            .create(
                job_id.clone(),
                ArtifactRef::from_path(ArtifactKind::Document, &fx.storage.upload_path(&job_id)),
            )
            .unwrap();
        job_id
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            stage_timeout: None,
            retry: RetryPolicy::none(),
        }
    }

    #[tokio::test]
    async fn test_successful_run_completes_job() {
        let fx = fixture();
        let progress = Arc::new(RecordingProgress::new());
        let orch = orchestrator(&fx, stage_set(vec![]), progress.clone(), config());
        let id = submit(&fx, "ok");

        let job = orch.run(&id).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_ref.as_ref().unwrap().kind, ArtifactKind::Video);
        assert!(job.error.is_none());

        let stages: Vec<Stage> = progress.events().iter().map(|e| e.stage).collect();
        assert!(stages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.events().len(), 8);
        assert!(progress.events().last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_failure_halts_pipeline() {
        let fx = fixture();
        let render = Scripted::new(Stage::Render, Behavior::Succeed);
        let stages = stage_set(vec![
            Scripted::new(Stage::Synthesize, Behavior::Fail("voice unavailable")),
            Arc::clone(&render),
        ]);
        let orch = orchestrator(&fx, stages, Arc::new(NoopProgress), config());
        let id = submit(&fx, "fail");

        let job = orch.run(&id).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        let failure = job.error.as_ref().unwrap();
        assert_eq!(failure.stage, Stage::Synthesize);
        assert!(failure.message.contains("voice unavailable"));
        assert!(job.output_ref.is_none());
        assert_eq!(render.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transient_errors_retry_only_current_stage() {
        let fx = fixture();
        let extract = Scripted::new(Stage::Extract, Behavior::Succeed);
        let summarize = Scripted::new(Stage::Summarize, Behavior::FailTransient(2));
        let stages = stage_set(vec![Arc::clone(&extract), Arc::clone(&summarize)]);
        let mut cfg = config();
        cfg.retry = RetryPolicy::new(3, Duration::from_millis(1));
        let orch = orchestrator(&fx, stages, Arc::new(NoopProgress), cfg);
        let id = submit(&fx, "retry");

        let job = orch.run(&id).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(extract.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summarize.calls.load(Ordering::SeqCst), 3);
        assert_eq!(job.attempts, 6);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let fx = fixture();
        let summarize = Scripted::new(Stage::Summarize, Behavior::FailTransient(10));
        let stages = stage_set(vec![Arc::clone(&summarize)]);
        let mut cfg = config();
        cfg.retry = RetryPolicy::new(2, Duration::ZERO);
        let orch = orchestrator(&fx, stages, Arc::new(NoopProgress), cfg);
        let id = submit(&fx, "bounded");

        let job = orch.run(&id).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(summarize.calls.load(Ordering::SeqCst), 2);
        assert!(job.error.as_ref().unwrap().message.contains("503"));
    }

    #[tokio::test]
    async fn test_timeout_fails_stage() {
        let fx = fixture();
        let stages = stage_set(vec![Scripted::new(Stage::Render, Behavior::Hang)]);
        let mut cfg = config();
        cfg.stage_timeout = Some(Duration::from_millis(20));
        let orch = orchestrator(&fx, stages, Arc::new(NoopProgress), cfg);
        let id = submit(&fx, "slow");

        let job = orch.run(&id).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        let failure = job.error.as_ref().unwrap();
        assert_eq!(failure.stage, Stage::Render);
        assert!(failure.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_panicking_executor_fails_job_only() {
        let fx = fixture();
        let stages = stage_set(vec![Scripted::new(Stage::Extract, Behavior::Panic)]);
        let orch = orchestrator(&fx, stages, Arc::new(NoopProgress), config());
        let id = submit(&fx, "panic");

        let job = orch.enqueue(id.clone()).await.unwrap().unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_ref().unwrap().message.contains("executor exploded"));
    }

    #[tokio::test]
    async fn test_wrong_artifact_kind_fails_stage() {
        let fx = fixture();
        let stages = stage_set(vec![Scripted::new(Stage::Summarize, Behavior::WrongKind)]);
        let orch = orchestrator(&fx, stages, Arc::new(NoopProgress), config());
        let id = submit(&fx, "kind");

        let job = orch.run(&id).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_ref().unwrap().stage, Stage::Summarize);
        assert!(job.error.as_ref().unwrap().message.contains("instead of summary"));
    }

    #[tokio::test]
    async fn test_hung_job_does_not_hold_back_others() {
        let fx = fixture();
        let stages = stage_set(vec![Scripted::new(
            Stage::Summarize,
            Behavior::HangFor("stuck"),
        )]);
        let orch = orchestrator(&fx, stages, Arc::new(NoopProgress), config());

        let stuck_id = submit(&fx, "stuck");
        let stuck_handle = orch.enqueue(stuck_id.clone());

        let mut others = Vec::new();
        for i in 0..16 {
            let id = submit(&fx, &format!("other-{}", i));
            others.push((id.clone(), orch.enqueue(id)));
        }

        for (id, handle) in others {
            let job = tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap_or_else(|_| panic!("{} waited behind the stuck job", id))
                .unwrap()
                .unwrap();
            assert_eq!(job.status, JobStatus::Completed);
        }

        let stuck = fx.store.get(&stuck_id).unwrap();
        assert_eq!(stuck.status, JobStatus::Running);
        assert_eq!(stuck.stage, Stage::Summarize);
        stuck_handle.abort();
    }

    #[tokio::test]
    async fn test_unknown_job_is_internal_inconsistency() {
        let fx = fixture();
        let orch = orchestrator(&fx, stage_set(vec![]), Arc::new(NoopProgress), config());

        let err = orch.run(&JobId::from("ghost")).await.unwrap_err();
        assert!(matches!(err, StoreError::InternalInconsistency { .. }));
    }

    #[tokio::test]
    async fn test_finished_job_is_not_rerun() {
        let fx = fixture();
        let extract = Scripted::new(Stage::Extract, Behavior::Succeed);
        let orch = orchestrator(
            &fx,
            stage_set(vec![Arc::clone(&extract)]),
            Arc::new(NoopProgress),
            config(),
        );
        let id = submit(&fx, "twice");

        orch.run(&id).await.unwrap();
        let again = orch.run(&id).await.unwrap();

        assert_eq!(again.status, JobStatus::Completed);
        assert_eq!(extract.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic payload");
    }
}
