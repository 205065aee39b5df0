//! Domain model (ids, jobs, requests, events, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod job;
pub mod request;

pub use self::errors::{ForgeError, StageError, StageErrorKind};
pub use self::events::JobEvent;
pub use self::ids::{JobId, ParseJobIdError};
pub use self::job::{ArtifactRef, Job, JobState};
pub use self::request::{Mode, StageRequest, Steps};
