//! TaskRegistry - single source of truth for job state.
//!
//! Every operation takes the lock, mutates or clones, and releases it before
//! returning. Nothing awaits while holding the lock, so status reads never
//! wait on running stages.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactRef, ForgeError, Job, JobEvent, JobId, JobState};
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

/// Number of jobs per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub error: usize,
    pub canceled: usize,
}

/// What a job recorded after a given log position.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDelta {
    /// Log lines from the requested position on.
    pub lines: Vec<String>,
    pub progress: u8,
    /// `Done` or `Failed` once the job is terminal.
    pub terminal: Option<JobEvent>,
}

pub struct TaskRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::with_ports(Arc::new(UlidGenerator::new(SystemClock)), Arc::new(SystemClock))
    }

    pub fn with_ports(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            ids,
            clock,
        }
    }

    /// Allocate a new job in `Queued`.
    pub fn create(&self) -> JobId {
        let now = self.clock.now();
        let mut jobs = self.jobs.write();
        // ULIDs carry 80 random bits; the loop only guards the theoretical clash.
        let mut id = self.ids.generate_job_id();
        while jobs.contains_key(&id) {
            id = self.ids.generate_job_id();
        }
        jobs.insert(id, Job::new(id, now));
        id
    }

    /// Snapshot of the job.
    pub fn get(&self, id: JobId) -> Result<Job, ForgeError> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or(ForgeError::UnknownTask(id))
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.read().contains_key(&id)
    }

    /// Apply a state transition from the legal table.
    ///
    /// Entering `Done` pins progress at 100 in the same critical section so
    /// no reader sees `Done` with less.
    pub fn transition(
        &self,
        id: JobId,
        next: JobState,
        message: Option<String>,
    ) -> Result<(), ForgeError> {
        self.update(id, |job, now| {
            if !job.state.can_transition_to(next) {
                return Err(ForgeError::InvalidTransition {
                    from: job.state,
                    to: next,
                });
            }
            job.state = next;
            if message.is_some() {
                job.message = message;
            }
            if next == JobState::Done {
                job.progress = 100;
            }
            job.updated_at = now;
            Ok(())
        })
    }

    /// `Queued -> Running`; no-op when already running.
    pub fn mark_running(&self, id: JobId) -> Result<(), ForgeError> {
        self.update(id, |job, now| match job.state {
            JobState::Running => Ok(()),
            JobState::Queued => {
                job.state = JobState::Running;
                job.updated_at = now;
                Ok(())
            }
            from => Err(ForgeError::InvalidTransition {
                from,
                to: JobState::Running,
            }),
        })
    }

    /// `Running -> Done` with the optional artifact, progress 100.
    pub fn complete(&self, id: JobId, artifact: Option<ArtifactRef>) -> Result<(), ForgeError> {
        self.update(id, |job, now| {
            if !job.state.can_transition_to(JobState::Done) {
                return Err(ForgeError::InvalidTransition {
                    from: job.state,
                    to: JobState::Done,
                });
            }
            job.state = JobState::Done;
            job.progress = 100;
            job.artifact = artifact;
            job.updated_at = now;
            Ok(())
        })
    }

    /// Accepts `current <= pct <= 100` while non-terminal.
    pub fn set_progress(&self, id: JobId, pct: u8) -> Result<(), ForgeError> {
        self.update(id, |job, now| {
            if job.is_terminal() || pct > 100 || pct < job.progress {
                return Err(ForgeError::ProgressRejected {
                    requested: pct,
                    current: job.progress,
                    state: job.state,
                });
            }
            job.progress = pct;
            job.updated_at = now;
            Ok(())
        })
    }

    /// Append one line to the job log. Finished jobs take no more lines.
    pub fn append_log(&self, id: JobId, line: impl Into<String>) -> Result<(), ForgeError> {
        let line = line.into();
        self.update(id, |job, now| {
            if job.is_terminal() {
                return Err(ForgeError::AlreadyFinished(id));
            }
            job.log.push(line);
            job.updated_at = now;
            Ok(())
        })
    }

    /// End the job in `Error`: state, message and the `[error]` log line
    /// change together. A queued job passes through `Running` first.
    pub fn fail(&self, id: JobId, message: &str) -> Result<(), ForgeError> {
        self.update(id, |job, now| {
            if job.state == JobState::Queued {
                job.state = JobState::Running;
            }
            if !job.state.can_transition_to(JobState::Error) {
                return Err(ForgeError::InvalidTransition {
                    from: job.state,
                    to: JobState::Error,
                });
            }
            job.state = JobState::Error;
            job.message = Some(message.to_string());
            job.log.push(format!("[error] {message}"));
            job.updated_at = now;
            Ok(())
        })
    }

    /// Log lines from position `from` on, plus current progress and the
    /// terminal outcome. Clones only the new lines.
    pub fn delta(&self, id: JobId, from: usize) -> Result<JobDelta, ForgeError> {
        let jobs = self.jobs.read();
        let job = jobs.get(&id).ok_or(ForgeError::UnknownTask(id))?;
        let terminal = match job.state {
            JobState::Done => Some(JobEvent::Done {
                artifact: job.artifact.clone(),
            }),
            JobState::Error | JobState::Canceled => Some(JobEvent::Failed {
                message: job
                    .message
                    .clone()
                    .unwrap_or_else(|| job.state.to_string()),
            }),
            JobState::Queued | JobState::Running => None,
        };
        Ok(JobDelta {
            lines: job.log.get(from..).map(<[String]>::to_vec).unwrap_or_default(),
            progress: job.progress,
            terminal,
        })
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for job in self.jobs.read().values() {
            match job.state {
                JobState::Queued => counts.queued += 1,
                JobState::Running => counts.running += 1,
                JobState::Done => counts.done += 1,
                JobState::Error => counts.error += 1,
                JobState::Canceled => counts.canceled += 1,
            }
        }
        counts
    }

    /// Terminal jobs last touched before `cutoff`.
    pub fn terminal_before(&self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .jobs
            .read()
            .values()
            .filter(|job| job.is_terminal() && job.updated_at < cutoff)
            .map(|job| job.id)
            .collect();
        ids.sort();
        ids
    }

    /// Drop a terminal job. Queued and running jobs are kept.
    pub fn remove_terminal(&self, id: JobId) -> Option<Job> {
        let mut jobs = self.jobs.write();
        match jobs.get(&id) {
            Some(job) if job.is_terminal() => jobs.remove(&id),
            _ => None,
        }
    }

    /// Drop a job no worker has picked up yet.
    pub fn remove_queued(&self, id: JobId) -> Option<Job> {
        let mut jobs = self.jobs.write();
        match jobs.get(&id) {
            Some(job) if job.state == JobState::Queued => jobs.remove(&id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn update<F>(&self, id: JobId, f: F) -> Result<(), ForgeError>
    where
        F: FnOnce(&mut Job, DateTime<Utc>) -> Result<(), ForgeError>,
    {
        let now = self.clock.now();
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id).ok_or(ForgeError::UnknownTask(id))?;
        f(job, now)
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
