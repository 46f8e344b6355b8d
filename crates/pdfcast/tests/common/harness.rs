//! Isolated service instances driven by scripted stage executors.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use pdfcast::config::Config;
use pdfcast::{
    ArtifactRef, ConversionService, JobContext, JobId, PollResponse, Stage, StageError,
    StageExecutor, StageSet,
};

use super::builders::test_config;

/// A closed door stage executors wait behind until the test opens it.
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    pub fn closed() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Lets `n` more executions through.
    pub fn open(&self, n: usize) {
        self.permits.add_permits(n);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

#[derive(Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    /// Fails with a transient error this many times, then succeeds.
    Flaky(u32),
    Delay(Duration),
    Gated(Gate),
    /// Only the first execution waits behind the gate.
    HoldFirst(Gate),
}

struct FakeExecutor {
    stage: Stage,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    failures_left: AtomicU32,
    held: AtomicBool,
}

#[async_trait]
impl StageExecutor for FakeExecutor {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn execute(&self, input: &ArtifactRef, ctx: &JobContext) -> Result<ArtifactRef, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if input.kind != self.stage.input_kind() {
            return Err(StageError::InvalidInput(format!(
                "{} received a {} artifact",
                self.stage, input.kind
            )));
        }

        match &self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail(message) => return Err(StageError::Remote(message.clone())),
            Behavior::Flaky(_) => {
                let left = self.failures_left.load(Ordering::SeqCst);
                if left > 0 {
                    self.failures_left.store(left - 1, Ordering::SeqCst);
                    return Err(StageError::Remote("service unavailable".to_string()));
                }
            }
            Behavior::Delay(delay) => tokio::time::sleep(*delay).await,
            Behavior::Gated(gate) => gate.pass().await,
            Behavior::HoldFirst(gate) => {
                if !self.held.swap(true, Ordering::SeqCst) {
                    gate.pass().await;
                }
            }
        }

        let path = if self.stage.is_last() {
            ctx.video_path.clone()
        } else {
            ctx.work_file(&format!("{}.out", self.stage.as_str().to_lowercase()))
        };
        tokio::fs::write(&path, format!("{} output for {}", self.stage, ctx.job_id))
            .await
            .map_err(|source| StageError::WriteArtifact {
                path: path.clone(),
                source,
            })?;
        Ok(ArtifactRef::from_path(self.stage.output_kind(), &path))
    }
}

/// Per-stage scripted executors. Stages without a script succeed at once.
pub struct FakeStages {
    behaviors: HashMap<Stage, Behavior>,
    calls: HashMap<Stage, Arc<AtomicUsize>>,
}

impl FakeStages {
    pub fn new() -> Self {
        let calls = Stage::ALL
            .iter()
            .map(|stage| (*stage, Arc::new(AtomicUsize::new(0))))
            .collect();
        Self {
            behaviors: HashMap::new(),
            calls,
        }
    }

    pub fn fail_at(mut self, stage: Stage, message: &str) -> Self {
        self.behaviors
            .insert(stage, Behavior::Fail(message.to_string()));
        self
    }

    pub fn flaky_at(mut self, stage: Stage, failures: u32) -> Self {
        self.behaviors.insert(stage, Behavior::Flaky(failures));
        self
    }

    pub fn delay_at(mut self, stage: Stage, delay: Duration) -> Self {
        self.behaviors.insert(stage, Behavior::Delay(delay));
        self
    }

    pub fn gate_at(mut self, stage: Stage, gate: &Gate) -> Self {
        self.behaviors.insert(stage, Behavior::Gated(gate.clone()));
        self
    }

    /// Holds the first job to reach `stage` until the gate opens; later jobs
    /// pass straight through.
    pub fn hold_first_at(mut self, stage: Stage, gate: &Gate) -> Self {
        self.behaviors.insert(stage, Behavior::HoldFirst(gate.clone()));
        self
    }

    /// Shared invocation counters, one per stage.
    pub fn counters(&self) -> HashMap<Stage, Arc<AtomicUsize>> {
        self.calls.clone()
    }

    pub fn executor(&self, stage: Stage) -> Arc<dyn StageExecutor> {
        let behavior = self
            .behaviors
            .get(&stage)
            .cloned()
            .unwrap_or(Behavior::Succeed);
        let failures = match behavior {
            Behavior::Flaky(n) => n,
            _ => 0,
        };
        Arc::new(FakeExecutor {
            stage,
            behavior,
            calls: Arc::clone(&self.calls[&stage]),
            failures_left: AtomicU32::new(failures),
            held: AtomicBool::new(false),
        })
    }

    pub fn build(&self) -> StageSet {
        StageSet::new(
            self.executor(Stage::Extract),
            self.executor(Stage::Summarize),
            self.executor(Stage::Synthesize),
            self.executor(Stage::Render),
        )
        .expect("fake executors report their own stage")
    }
}

/// An isolated service instance with its own directories.
pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Config,
    pub service: ConversionService,
    pub calls: HashMap<Stage, Arc<AtomicUsize>>,
}

impl TestHarness {
    pub fn new(stages: FakeStages) -> Self {
        Self::with_config(stages, |_| {})
    }

    /// Builds the harness after letting the test adjust the configuration.
    pub fn with_config(stages: FakeStages, adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = test_config(temp_dir.path());
        adjust(&mut config);
        Self::with_stage_set(temp_dir, config, stages.build(), stages.counters())
    }

    pub fn with_stage_set(
        temp_dir: TempDir,
        config: Config,
        stages: StageSet,
        calls: HashMap<Stage, Arc<AtomicUsize>>,
    ) -> Self {
        let service =
            ConversionService::with_stages(&config, stages).expect("Failed to build service");
        Self {
            temp_dir,
            config,
            service,
            calls,
        }
    }

    pub fn calls(&self, stage: Stage) -> usize {
        self.calls
            .get(&stage)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Polls until the job reaches a terminal state or `limit` elapses.
    pub async fn wait_for_terminal(&self, job_id: &JobId, limit: Duration) -> PollResponse {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let response = self.service.poll(job_id).expect("job exists");
            if response.is_terminal() {
                return response;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("job {} still {:?} after {:?}", job_id, response, limit);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Polls until the job is running the given stage.
    pub async fn wait_for_stage(&self, job_id: &JobId, stage: Stage) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let view = self.service.get_status(job_id).expect("job exists");
            if view.stage == stage && view.status == pdfcast::JobStatus::Running {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("job {} never reached {} (at {:?})", job_id, stage, view);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
