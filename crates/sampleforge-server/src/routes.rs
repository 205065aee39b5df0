//! HTTP gateway: thin mapping from requests onto the engine.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::dto::{ErrorBody, ProcessResponse, StatusView, StreamQuery, download_url};
use sampleforge_core::{Engine, ForgeError, JobEvent, JobId, StageRequest, StateCounts};

const KEEP_ALIVE: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/process", post(process))
        .route("/status/{task_id}", get(status))
        .route("/logs/stream", get(stream_logs))
        .route("/downloads/{task_id}", get(download))
        .route("/health", get(health))
        .with_state(state)
        // browser front ends are served from another origin
        .layer(CorsLayer::permissive())
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Unavailable,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, what.to_string()),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ForgeError::ShuttingDown.to_string(),
            ),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Unparseable ids are as unknown as ids never issued.
fn job_id(raw: &str, not_found: &'static str) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound(not_found))
}

fn unknown_or_internal(err: ForgeError, not_found: &'static str) -> ApiError {
    match err {
        ForgeError::UnknownTask(_) => ApiError::NotFound(not_found),
        ForgeError::ShuttingDown => ApiError::Unavailable,
        other => {
            error!(error = %other, "unexpected engine error");
            ApiError::Internal(other.to_string())
        }
    }
}

async fn process(
    State(state): State<AppState>,
    Json(request): Json<StageRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let id = state
        .engine
        .submit(request)
        .map_err(|e| unknown_or_internal(e, "unknown task"))?;
    Ok(Json(ProcessResponse {
        task_id: id.to_string(),
    }))
}

async fn status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
    let id = job_id(&task_id, "unknown task")?;
    let job = state
        .engine
        .status(id)
        .map_err(|e| unknown_or_internal(e, "unknown task"))?;
    Ok(Json(StatusView::from(job)))
}

async fn stream_logs(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let id = job_id(&query.task_id, "unknown task")?;
    let subscription = state
        .engine
        .subscribe(id)
        .map_err(|e| unknown_or_internal(e, "unknown task"))?;

    let connected = stream::once(async {
        Ok::<_, Infallible>(Event::default().event("log").data("connected"))
    });
    let events = stream::unfold(subscription, |mut sub| async move {
        let event = sub.next().await?;
        Some((event, sub))
    })
    .filter_map(move |event| future::ready(sse_event(id, event).map(Ok::<_, Infallible>)));

    Ok(Sse::new(connected.chain(events)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE)))
}

/// SSE framing of one event. `Failed` has no frame of its own: its
/// `[error]` line is already part of the job log.
fn sse_event(id: JobId, event: JobEvent) -> Option<Event> {
    let event = match event {
        JobEvent::Log { line } => Event::default().event("log").data(line),
        JobEvent::Progress { pct } => Event::default()
            .event("progress")
            .data(json!({ "pct": pct }).to_string()),
        JobEvent::Done { artifact } => {
            let payload = match artifact {
                Some(_) => json!({ "zip_url": download_url(id) }),
                None => json!({}),
            };
            Event::default().event("done").data(payload.to_string())
        }
        JobEvent::Failed { .. } => return None,
    };
    Some(event)
}

async fn download(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = job_id(&task_id, "no zip")?;
    let artifact = state
        .engine
        .artifact(id)
        .map_err(|e| unknown_or_internal(e, "no zip"))?
        .ok_or(ApiError::NotFound("no zip"))?;

    let file = match tokio::fs::File::open(artifact.path()).await {
        Ok(file) => file,
        Err(e) => {
            warn!(job_id = %id, path = %artifact.path().display(), error = %e, "artifact unreadable");
            return Err(ApiError::NotFound("missing zip"));
        }
    };
    let mut builder = axum::http::Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name()),
        );
    if let Ok(meta) = file.metadata().await {
        builder = builder.header(header::CONTENT_LENGTH, meta.len());
    }
    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[derive(Debug, Serialize)]
struct HealthView {
    status: &'static str,
    jobs: StateCounts,
}

async fn health(State(state): State<AppState>) -> Json<HealthView> {
    Json(HealthView {
        status: "ok",
        jobs: state.engine.counts(),
    })
}
