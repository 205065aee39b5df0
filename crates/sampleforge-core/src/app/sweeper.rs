//! RetentionSweeper - forgets finished jobs after a retention period.
//!
//! Only terminal jobs are swept. Their registry entry, event channel and
//! working directory go together, so a swept id answers 404 everywhere.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event_bus::EventBus;
use super::registry::TaskRegistry;
use crate::domain::JobId;
use crate::impls::workspace::JobWorkspace;

pub struct RetentionSweeper {
    registry: Arc<TaskRegistry>,
    bus: Arc<EventBus>,
    work_dir: PathBuf,
    retention: Duration,
}

impl RetentionSweeper {
    pub fn new(
        registry: Arc<TaskRegistry>,
        bus: Arc<EventBus>,
        work_dir: impl Into<PathBuf>,
        retention: Duration,
    ) -> Self {
        Self {
            registry,
            bus,
            work_dir: work_dir.into(),
            retention,
        }
    }

    /// One pass. Returns the removed ids.
    pub fn sweep_once(&self) -> Vec<JobId> {
        let retention = match chrono::Duration::from_std(self.retention) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "retention out of range, sweep skipped");
                return Vec::new();
            }
        };
        let Some(cutoff) = self.registry.now().checked_sub_signed(retention) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        for id in self.registry.terminal_before(cutoff) {
            if self.registry.remove_terminal(id).is_none() {
                continue;
            }
            self.bus.remove(id);

            let workspace = JobWorkspace::new(&self.work_dir, id);
            if workspace.root().exists() {
                if let Err(e) = std::fs::remove_dir_all(workspace.root()) {
                    warn!(job_id = %id, error = %e, "cannot delete job directory");
                }
            }
            debug!(job_id = %id, "job swept");
            removed.push(id);
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "expired jobs removed");
        }
        removed
    }

    /// Run `sweep_once` every `interval` until `shutdown` flips to true.
    pub fn spawn(self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("retention sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobState;
    use crate::ports::{Clock, SystemClock, UlidGenerator};
    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;

    /// Clock the test moves forward by hand.
    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, by: chrono::Duration) {
            let mut now = self.0.lock();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    fn registry() -> (Arc<TaskRegistry>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock(Mutex::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )));
        let registry = TaskRegistry::with_ports(
            Arc::new(UlidGenerator::new(SystemClock)),
            clock.clone(),
        );
        (Arc::new(registry), clock)
    }

    fn finished(registry: &TaskRegistry) -> JobId {
        let id = registry.create();
        registry.mark_running(id).unwrap();
        registry.complete(id, None).unwrap();
        id
    }

    fn sweeper(
        registry: &Arc<TaskRegistry>,
        bus: &Arc<EventBus>,
        dir: &std::path::Path,
    ) -> RetentionSweeper {
        RetentionSweeper::new(
            Arc::clone(registry),
            Arc::clone(bus),
            dir,
            Duration::from_secs(3_600),
        )
    }

    #[test]
    fn removes_only_expired_terminal_jobs() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, clock) = registry();
        let bus = Arc::new(EventBus::new(Arc::clone(&registry)));

        let done = finished(&registry);
        bus.open(done);
        let running = registry.create();
        registry.mark_running(running).unwrap();
        let workspace = JobWorkspace::new(tmp.path(), done);
        std::fs::create_dir_all(workspace.raw_dir()).unwrap();

        clock.advance(chrono::Duration::hours(2));
        assert_eq!(sweeper(&registry, &bus, tmp.path()).sweep_once(), vec![done]);

        assert!(!registry.contains(done));
        assert_eq!(registry.get(running).unwrap().state, JobState::Running);
        assert!(bus.subscribe(done).is_err());
        assert!(!workspace.root().exists());
    }

    #[test]
    fn recent_jobs_survive() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, clock) = registry();
        let bus = Arc::new(EventBus::new(Arc::clone(&registry)));
        finished(&registry);

        clock.advance(chrono::Duration::minutes(30));
        assert!(sweeper(&registry, &bus, tmp.path()).sweep_once().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn loop_stops_on_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let (registry, _clock) = registry();
        let bus = Arc::new(EventBus::new(Arc::clone(&registry)));
        let (tx, rx) = watch::channel(false);

        let handle = sweeper(&registry, &bus, tmp.path())
            .spawn(Duration::from_millis(10), rx);
        tx.send_replace(true);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
