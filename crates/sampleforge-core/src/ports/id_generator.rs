//! IdGenerator port - job id allocation.

use std::time::SystemTime;

use parking_lot::Mutex;
use ulid::{Generator, Ulid};

use crate::domain::JobId;
use crate::ports::Clock;

/// Allocates job ids. Called from request handlers, hence `Send + Sync`.
pub trait IdGenerator: Send + Sync {
    fn generate_job_id(&self) -> JobId;
}

/// Monotonic ULIDs stamped with the clock's time.
///
/// Ids handed out by one generator sort in submission order, also within a
/// millisecond or when the clock stands still.
pub struct UlidGenerator<C> {
    clock: C,
    last: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: Mutex::new(Generator::new()),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_id(&self) -> JobId {
        let now = self.clock.now();
        let stamped = self.last.lock().generate_from_datetime(SystemTime::from(now));
        // 80 random bits exhausted within one millisecond: start a fresh sequence
        let ulid = stamped
            .unwrap_or_else(|_| Ulid::from_parts(now.timestamp_millis() as u64, rand::random()));
        JobId::from(ulid)
    }
}
