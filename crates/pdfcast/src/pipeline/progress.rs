use crate::broadcast::JobProgressBroadcaster;
use crate::job::Job;

/// Receives every job snapshot the orchestrator commits, in commit order.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, job: &Job, message: &str);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _job: &Job, _message: &str) {}
}

/// Bridges orchestrator updates to the broadcast channel.
pub struct BroadcastProgress {
    broadcaster: JobProgressBroadcaster,
}

impl BroadcastProgress {
    pub fn new(broadcaster: JobProgressBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, job: &Job, message: &str) {
        self.broadcaster.publish(job, message);
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingProgress;
