//! HTTP client used by replay hosts and the operator CLI to talk to a
//! running coordinator.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, header};
use serde::Serialize;
use thiserror::Error;

use crate::server::routes::{ErrorBody, ErrorCode};
use crate::state_machine::{Job, JobPatch, TaggedJob, VersionTag};
use crate::summary::RunSummary;

pub const DEFAULT_URL: &str = "http://127.0.0.1:4000";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The coordinator rejected the tag; fetch the job again and retry.
    #[error("stale tag: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("coordinator returned status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("response is missing the ETag header")]
    MissingTag,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct IntegrityReport<'a> {
    end_block_num: u64,
    target_version: &'a str,
    integrity_hash: &'a str,
}

pub struct CoordinatorClient {
    client: Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Claims the next job. `Ok(None)` when the coordinator has none left.
    pub async fn next_job(&self) -> Result<Option<TaggedJob>, ClientError> {
        let response = self
            .client
            .get(self.url("/job?nextjob"))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        tagged_job(check(response).await?).await.map(Some)
    }

    pub async fn get_job(&self, job_id: usize) -> Result<TaggedJob, ClientError> {
        let response = self
            .client
            .get(self.url("/job"))
            .query(&[("jobid", job_id)])
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        tagged_job(check(response).await?).await
    }

    /// Sends a conditional update and returns the tag for the next round-trip.
    pub async fn update_job(
        &self,
        job_id: usize,
        tag: &VersionTag,
        patch: &JobPatch,
    ) -> Result<VersionTag, ClientError> {
        let response = self
            .client
            .post(self.url("/job"))
            .query(&[("jobid", job_id)])
            .header(header::IF_MATCH, tag.to_header())
            .json(patch)
            .send()
            .await?;
        let response = check(response).await?;
        response_tag(&response)
    }

    pub async fn summary(&self) -> Result<RunSummary, ClientError> {
        let response = self.client.get(self.url("/summary")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Reports a computed integrity hash; returns the slice id it was stored on.
    pub async fn post_integrity_hash(
        &self,
        end_block: u64,
        version: &str,
        hash: &str,
    ) -> Result<usize, ClientError> {
        let report = IntegrityReport {
            end_block_num: end_block,
            target_version: version,
            integrity_hash: hash,
        };
        let response = self.client.post(self.url("/config")).json(&report).send().await?;
        let body: serde_json::Value = check(response).await?.json().await?;
        body.get("sliceid")
            .and_then(|v| v.as_u64())
            .map(|id| id as usize)
            .ok_or_else(|| ClientError::Rejected {
                status: 200,
                message: format!("unexpected reply {body}"),
            })
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (Some(body.code), body.error),
        Err(_) => (None, text),
    };
    Err(match (status, code) {
        (StatusCode::NOT_FOUND, _) => ClientError::NotFound(message),
        (_, Some(ErrorCode::Conflict)) => ClientError::Conflict(message),
        _ => ClientError::Rejected {
            status: status.as_u16(),
            message,
        },
    })
}

fn response_tag(response: &Response) -> Result<VersionTag, ClientError> {
    response
        .headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or(ClientError::MissingTag)
}

async fn tagged_job(response: Response) -> Result<TaggedJob, ClientError> {
    let tag = response_tag(&response)?;
    let job: Job = response.json().await?;
    Ok(TaggedJob { job, tag })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::sample_registry;
    use crate::orchestrator::ReplayOrchestrator;
    use crate::server::router;
    use crate::state_machine::JobStatus;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_job() -> Job {
        Job::from_slice(uuid::Uuid::new_v4(), sample_registry(1, "1.0").get(0).unwrap())
    }

    #[tokio::test]
    async fn next_job_reads_tag() {
        let server = MockServer::start().await;
        let job = sample_job();
        Mock::given(method("GET"))
            .and(path("/job"))
            .and(query_param("nextjob", ""))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"abc\"")
                    .set_body_json(&job),
            )
            .mount(&server)
            .await;

        let client = CoordinatorClient::new(server.uri()).unwrap();
        let tagged = client.next_job().await.unwrap().unwrap();
        assert_eq!(tagged.tag.as_str(), "abc");
        assert_eq!(tagged.job, job);
    }

    #[tokio::test]
    async fn next_job_none_when_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/job"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no job available"))
            .mount(&server)
            .await;

        let client = CoordinatorClient::new(server.uri()).unwrap();
        assert!(client.next_job().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_sends_if_match_and_patch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job"))
            .and(query_param("jobid", "3"))
            .and(header_eq("if-match", "\"t0\""))
            .and(body_json(serde_json::json!({"status": "COMPLETE"})))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"t1\""))
            .mount(&server)
            .await;

        let client = CoordinatorClient::new(server.uri()).unwrap();
        let tag = client
            .update_job(
                3,
                &"t0".parse().unwrap(),
                &JobPatch::new().update_status(JobStatus::Complete),
            )
            .await
            .unwrap();
        assert_eq!(tag.as_str(), "t1");
    }

    #[tokio::test]
    async fn stale_tag_maps_to_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "Stale tag for job 0, fetch the job again and retry",
                "code": "conflict",
            })))
            .mount(&server)
            .await;

        let client = CoordinatorClient::new(server.uri()).unwrap();
        let err = client
            .update_job(0, &"old".parse().unwrap(), &JobPatch::new().update_last_block(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Conflict(ref m) if m.starts_with("Stale tag")));
    }

    #[tokio::test]
    async fn invalid_patch_is_not_a_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/job"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "Invalid patch: Stale tag mentioned in a worker message",
                "code": "invalid_patch",
            })))
            .mount(&server)
            .await;

        let client = CoordinatorClient::new(server.uri()).unwrap();
        let err = client
            .update_job(0, &"t".parse().unwrap(), &JobPatch::new().update_last_block(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn server_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/summary"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = CoordinatorClient::new(server.uri()).unwrap();
        let err = client.summary().await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn worker_round_trip_against_coordinator() {
        let orchestrator = Arc::new(ReplayOrchestrator::new(sample_registry(2, "1.0")));
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, router(orchestrator)).await.unwrap();
        });

        let client = CoordinatorClient::new(format!("http://{addr}/")).unwrap();
        let claimed = client.next_job().await.unwrap().unwrap();
        assert_eq!(claimed.job.job_id, 0);

        let patch = JobPatch::new()
            .update_status(JobStatus::Complete)
            .update_last_block(claimed.job.end_block_num);
        let t1 = client.update_job(0, &claimed.tag, &patch).await.unwrap();
        assert_ne!(t1, claimed.tag);

        let again = client.update_job(0, &claimed.tag, &patch).await.unwrap_err();
        assert!(matches!(again, ClientError::Conflict(_)));

        let bad = client
            .update_job(0, &t1, &JobPatch::new().update_start_time(chrono::Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(bad, ClientError::Rejected { status: 400, .. }));

        let fetched = client.get_job(0).await.unwrap();
        assert_eq!(fetched.tag, t1);
        assert_eq!(fetched.job.status, JobStatus::Complete);

        let summary = client.summary().await.unwrap();
        assert_eq!(summary.complete, 1);
        assert_eq!(summary.waiting, 1);

        assert!(matches!(
            client.post_integrity_hash(999, "1.0", "x").await,
            Err(ClientError::NotFound(_))
        ));

        server.abort();
        let _ = server.await;
    }
}
