//! Broadcasting of job progress for subscribers that prefer push over polling.

pub mod job_progress;

pub use job_progress::{JobProgressBroadcaster, JobProgressEvent};
