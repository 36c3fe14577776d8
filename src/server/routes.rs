use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ReplayError;
use crate::manifest::manifest_files;
use crate::orchestrator::ReplayOrchestrator;
use crate::state_machine::{JobPatch, TaggedJob, VersionTag};

type AppState = Arc<ReplayOrchestrator>;

pub fn router(orchestrator: AppState) -> Router {
    Router::new()
        .route("/job", get(job_get).post(job_post))
        .route("/status", get(status))
        .route("/config", get(config_get).post(config_post))
        .route("/summary", get(summary))
        .route("/restart", post(restart))
        .route("/hosts", get(hosts_get).post(hosts_post).delete(hosts_delete))
        .route("/healthcheck", get(healthcheck))
        .with_state(orchestrator)
}

#[derive(Debug)]
enum ApiError {
    Replay(ReplayError),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<ReplayError> for ApiError {
    fn from(err: ReplayError) -> Self {
        ApiError::Replay(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Replay(err) => {
                let (status, code) = match err {
                    ReplayError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
                    ReplayError::ConcurrencyConflict { .. } => {
                        (StatusCode::BAD_REQUEST, ErrorCode::Conflict)
                    }
                    ReplayError::InvalidPatch(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidPatch),
                    ReplayError::Config(_) => (StatusCode::BAD_REQUEST, ErrorCode::Config),
                    ReplayError::Busy { .. } => (StatusCode::CONFLICT, ErrorCode::Busy),
                    ReplayError::NoHosts => (StatusCode::CONFLICT, ErrorCode::NoHosts),
                    ReplayError::Io(_) | ReplayError::Json(_) | ReplayError::Toml(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal)
                    }
                };
                (status, code, err.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadRequest, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal, msg),
        };
        warn!(status = status.as_u16(), ?code, error = %message, "Request rejected");
        (status, Json(ErrorBody { error: message, code })).into_response()
    }
}

/// Machine-readable error kind sent next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Conflict,
    InvalidPatch,
    Config,
    Busy,
    NoHosts,
    BadRequest,
    Internal,
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorCode,
}

/// Runs blocking manifest I/O off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("manifest task failed: {e}")))?
        .map_err(ApiError::from)
}

fn parse_id(raw: &str, kind: &str) -> Result<usize, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::NotFound(format!("{kind} {raw:?}")))
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON data: {e}")))
}

/// Tag supplied by the worker, from `If-Match` or the legacy `ETag` request header.
fn supplied_tag(headers: &HeaderMap) -> Result<VersionTag, ApiError> {
    let raw = headers
        .get(header::IF_MATCH)
        .or_else(|| headers.get(header::ETAG))
        .ok_or_else(|| ApiError::BadRequest("missing ETag header".into()))?;
    let raw = raw
        .to_str()
        .map_err(|_| ApiError::BadRequest("ETag header is not valid text".into()))?;
    Ok(raw.parse::<VersionTag>()?)
}

fn tagged_response(tagged: TaggedJob) -> Response {
    ([(header::ETAG, tagged.tag.to_header())], Json(tagged.job)).into_response()
}

#[derive(Debug, Deserialize)]
struct JobQuery {
    jobid: Option<String>,
    nextjob: Option<String>,
}

async fn job_get(
    State(orch): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Result<Response, ApiError> {
    if let Some(raw) = query.jobid {
        let job_id = parse_id(&raw, "job")?;
        let tagged = orch
            .jobs()
            .get_tagged(job_id)
            .ok_or_else(|| ReplayError::job_not_found(job_id))?;
        return Ok(tagged_response(tagged));
    }
    if query.nextjob.is_some() {
        let tagged = orch
            .jobs()
            .next_job()
            .ok_or_else(|| ApiError::NotFound("no job available".into()))?;
        return Ok(tagged_response(tagged));
    }
    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, "/job?nextjob")],
    )
        .into_response())
}

async fn job_post(
    State(orch): State<AppState>,
    Query(query): Query<JobQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let raw = query
        .jobid
        .ok_or_else(|| ApiError::NotFound("jobid parameter is missing".into()))?;
    let job_id = parse_id(&raw, "job")?;
    let tag = supplied_tag(&headers)?;
    let patch = JobPatch::from_json(&body)?;

    let tagged = orch.jobs().update(job_id, &tag, &patch)?;
    Ok((
        [(header::ETAG, tagged.tag.to_header())],
        Json(json!({ "status": "updated" })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct SliceQuery {
    sliceid: Option<String>,
    files: Option<String>,
}

async fn status(
    State(orch): State<AppState>,
    Query(query): Query<SliceQuery>,
) -> Result<Response, ApiError> {
    let jobs = match query.sliceid {
        Some(raw) => {
            let job_id = parse_id(&raw, "job")?;
            let job = orch
                .jobs()
                .get(job_id)
                .ok_or_else(|| ReplayError::job_not_found(job_id))?;
            vec![job]
        }
        None => orch.jobs().all(),
    };
    Ok(Json(jobs).into_response())
}

async fn config_get(
    State(orch): State<AppState>,
    Query(query): Query<SliceQuery>,
) -> Result<Response, ApiError> {
    if query.files.is_some() {
        // Candidates live next to the manifest currently loaded.
        let dir = orch
            .manifest_path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let files = blocking(move || manifest_files(dir)).await?;
        return Ok(Json(files).into_response());
    }
    match query.sliceid {
        Some(raw) => {
            let slice_id = parse_id(&raw, "slice")?;
            let slice = orch
                .slice(slice_id)
                .ok_or_else(|| ReplayError::slice_not_found(slice_id))?;
            Ok(Json(slice).into_response())
        }
        None => Ok(Json(orch.slices()).into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct IntegrityReport {
    end_block_num: u64,
    #[serde(alias = "leap_version", alias = "spring_version")]
    target_version: String,
    integrity_hash: String,
}

async fn config_post(State(orch): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let report: IntegrityReport = parse_json(&body)?;
    let slice_id = blocking(move || {
        orch.record_integrity_hash(
            report.end_block_num,
            &report.target_version,
            &report.integrity_hash,
        )
    })
    .await?;
    Ok(Json(json!({
        "sliceid": slice_id,
        "message": "updated integrity hash",
    }))
    .into_response())
}

async fn summary(State(orch): State<AppState>) -> Response {
    Json(orch.jobs().summary()).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct RestartRequest {
    config_file_path: Option<PathBuf>,
    #[serde(default)]
    forced: bool,
}

/// Same fields as [`RestartRequest`] given as query parameters; `forced`
/// accepts `yes`/`true`/`1`/`on`.
#[derive(Debug, Deserialize)]
struct RestartQuery {
    config_file_path: Option<PathBuf>,
    forced: Option<String>,
}

fn parse_flag(raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Ok(true),
        "no" | "false" | "0" | "off" | "" => Ok(false),
        other => Err(ApiError::BadRequest(format!("forced must be yes or no, got {other:?}"))),
    }
}

async fn restart(
    State(orch): State<AppState>,
    Query(query): Query<RestartQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: RestartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RestartRequest::default()
    } else {
        parse_json(&body)?
    };
    let path = request
        .config_file_path
        .or(query.config_file_path)
        .ok_or_else(|| ApiError::BadRequest("config_file_path is missing".into()))?;
    let forced = match query.forced {
        Some(raw) => request.forced || parse_flag(&raw)?,
        None => request.forced,
    };
    info!(manifest = %path.display(), forced, "Restart requested");

    let reset = orch.clone();
    let generation = blocking(move || reset.reset_from_path(&path, forced)).await?;
    Ok(Json(json!({
        "generation": generation,
        "jobs": orch.jobs().len(),
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
struct HostsRequest {
    count: u32,
}

async fn hosts_get(State(orch): State<AppState>) -> Response {
    Json(json!({ "host_count": orch.host_count() })).into_response()
}

async fn hosts_post(State(orch): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: HostsRequest = parse_json(&body)?;
    let count = orch.provision_hosts(request.count)?;
    Ok(Json(json!({ "host_count": count })).into_response())
}

async fn hosts_delete(State(orch): State<AppState>) -> Result<Response, ApiError> {
    orch.teardown_hosts()?;
    Ok(Json(json!({ "host_count": 0 })).into_response())
}

async fn healthcheck() -> &'static str {
    "OK"
}
