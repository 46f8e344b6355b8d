//! Job data model: identifiers, stages, artifacts and the lifecycle state
//! machine shared by the store, the orchestrator and the status service.

pub mod artifact;
pub mod record;
pub mod stage;

pub use artifact::{ArtifactKind, ArtifactRef};
pub use record::{Job, JobFailure, JobId, JobMutation};
pub use stage::{JobStatus, Stage};
