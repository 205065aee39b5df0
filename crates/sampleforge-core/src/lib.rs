//! sampleforge-core
//!
//! Job orchestration for audio processing pipelines: submit a request, run
//! its stages in the background, watch progress live, collect the package.
//!
//! # Modules
//! - **domain**: ids, jobs, requests, events, errors
//! - **ports**: seams (`Clock`, `IdGenerator`, `StageAdapter`)
//! - **app**: registry, event bus, executor, worker pool, engine builder
//! - **impls**: default adapters backed by external programs
//! - **config**: engine and tool configuration

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::app::{BuildError, Engine, EngineBuilder, StateCounts, Subscription};
pub use self::config::{EngineConfig, ToolPaths};
pub use self::domain::{
    ArtifactRef, ForgeError, Job, JobEvent, JobId, JobState, Mode, StageError, StageErrorKind,
    StageRequest, Steps,
};
