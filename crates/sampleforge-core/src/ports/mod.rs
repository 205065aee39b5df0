//! Ports - seams between the orchestration core and the outside world.
//!
//! - `Clock` / `IdGenerator`: time and id allocation, swappable in tests.
//! - `StageAdapter`: the narrow contract every external processing stage
//!   implements. Adapters receive explicit inputs and return explicit
//!   outputs; they never touch the registry or the event bus.

pub mod clock;
pub mod id_generator;
pub mod stage;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::stage::{
    AcquireInput, AnalyzeInput, AudioAnalysis, ClassifyInput, PackageEntry, PackageInput,
    SeparateInput, StageAdapter, StageSet,
};
