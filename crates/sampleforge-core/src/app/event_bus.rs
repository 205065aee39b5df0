//! EventBus - per-job fan-out of log and progress events.
//!
//! The bus stores no job data. A published event is written to the job in
//! the [`TaskRegistry`] and then a per-job `watch` counter is bumped. Every
//! subscriber keeps its own cursor into the job's log and reads from the
//! registry when woken, so
//! - publishing never waits on subscribers and never drops events,
//! - all subscribers see log lines in the same order as `Job.log`,
//! - a late subscriber first gets a replay, then continues from the point
//!   where it attached.
//!
//! Progress is a level, not a history: a subscriber that falls behind gets
//! the latest value once, after the lines it missed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::warn;

use super::registry::{JobDelta, TaskRegistry};
use crate::domain::{ForgeError, JobEvent, JobId};

pub struct EventBus {
    registry: Arc<TaskRegistry>,
    channels: RwLock<HashMap<JobId, Arc<watch::Sender<u64>>>>,
}

impl EventBus {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Create the channel for a job. Opening twice keeps the first channel.
    pub fn open(&self, id: JobId) {
        self.channels
            .write()
            .entry(id)
            .or_insert_with(|| Arc::new(watch::channel(0).0));
    }

    /// Record the event on the job and wake subscribers.
    ///
    /// Log lines published after the job finished are discarded.
    pub fn publish(&self, id: JobId, event: JobEvent) -> Result<(), ForgeError> {
        let wake = self.sender(id)?;
        let recorded = match event {
            JobEvent::Log { line } => self.registry.append_log(id, line),
            JobEvent::Progress { pct } => self.registry.set_progress(id, pct),
            JobEvent::Done { artifact } => self.registry.complete(id, artifact),
            JobEvent::Failed { message } => self.registry.fail(id, &message),
        };
        match recorded {
            Err(ForgeError::AlreadyFinished(_)) => {
                warn!(job_id = %id, "log line after terminal event dropped");
                return Ok(());
            }
            other => other?,
        }
        wake.send_modify(|version| *version += 1);
        Ok(())
    }

    /// Attach a new observer.
    pub fn subscribe(&self, id: JobId) -> Result<Subscription, ForgeError> {
        let rx = self.sender(id)?.subscribe();
        if !self.registry.contains(id) {
            return Err(ForgeError::UnknownTask(id));
        }

        Ok(Subscription {
            id,
            registry: Arc::clone(&self.registry),
            rx,
            pending: VecDeque::new(),
            cursor: 0,
            progress: 0,
            finished: false,
        })
    }

    /// Number of attached observers.
    pub fn subscriber_count(&self, id: JobId) -> Result<usize, ForgeError> {
        Ok(self.sender(id)?.receiver_count())
    }

    /// Forget a job's channel. Attached subscribers end after what they have.
    pub fn remove(&self, id: JobId) {
        self.channels.write().remove(&id);
    }

    fn sender(&self, id: JobId) -> Result<Arc<watch::Sender<u64>>, ForgeError> {
        self.channels
            .read()
            .get(&id)
            .cloned()
            .ok_or(ForgeError::UnknownTask(id))
    }
}

/// One observer of one job. Dropping it unsubscribes.
pub struct Subscription {
    id: JobId,
    registry: Arc<TaskRegistry>,
    rx: watch::Receiver<u64>,
    pending: VecDeque<JobEvent>,
    cursor: usize,
    progress: u8,
    finished: bool,
}

impl Subscription {
    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn next(&mut self) -> Option<JobEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                self.finished |= event.is_terminal();
                return Some(event);
            }
            if self.finished {
                return None;
            }

            // mark seen before looking, so a publish racing with the read still wakes us
            self.rx.borrow_and_update();
            match self.registry.delta(self.id, self.cursor) {
                Ok(delta) => self.absorb(delta),
                Err(_) => return None,
            }
            if self.pending.is_empty() && self.rx.changed().await.is_err() {
                return None;
            }
        }
    }

    pub fn unsubscribe(self) {}

    fn absorb(&mut self, delta: JobDelta) {
        self.cursor += delta.lines.len();
        self.pending
            .extend(delta.lines.into_iter().map(JobEvent::log));
        if delta.progress > self.progress {
            self.progress = delta.progress;
            self.pending.push_back(JobEvent::progress(delta.progress));
        }
        if let Some(terminal) = delta.terminal {
            self.pending.push_back(terminal);
        }
    }
}
