//! App - the orchestration engine.
//!
//! # Components
//! - **TaskRegistry**: job states, the single source of truth for status
//! - **EventBus**: per-job log/progress fan-out with backlog replay
//! - **PipelinePlan**: stage selection from mode and step toggles
//! - **PipelineExecutor**: drives the stage adapters for one job
//! - **WorkerPool**: bounded set of executor slots
//! - **RetentionSweeper**: optional cleanup of finished jobs
//! - **EngineBuilder / Engine**: wiring and the public surface

pub mod builder;
pub mod event_bus;
pub mod executor;
pub mod pipeline;
pub mod registry;
pub mod sweeper;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::builder::{BuildError, Engine, EngineBuilder};
pub use self::event_bus::{EventBus, Subscription};
pub use self::executor::PipelineExecutor;
pub use self::pipeline::{PipelinePlan, StageKind};
pub use self::registry::{JobDelta, StateCounts, TaskRegistry};
pub use self::sweeper::RetentionSweeper;
pub use self::worker::WorkerPool;
