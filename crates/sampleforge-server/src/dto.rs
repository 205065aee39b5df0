//! Wire shapes of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sampleforge_core::{Job, JobId};

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub task_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Job snapshot as returned by `GET /status/{task_id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusView {
    pub task_id: String,
    pub state: String,
    pub progress: u8,
    pub message: Option<String>,
    pub zip_url: Option<String>,
    pub logs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for StatusView {
    fn from(job: Job) -> Self {
        let zip_url = job.artifact.as_ref().map(|_| download_url(job.id));
        Self {
            task_id: job.id.to_string(),
            state: job.state.as_str().to_string(),
            progress: job.progress,
            message: job.message,
            zip_url,
            logs: job.log,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

pub fn download_url(id: JobId) -> String {
    format!("/downloads/{id}")
}
