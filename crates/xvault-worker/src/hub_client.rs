//! Thin HTTP client for the Worker→Hub internal API (spec.md §6).
//!
//! Every call carries `worker_id` in its body per the Hub's internal routes;
//! there is no separate bearer-token scheme yet, see the `// TODO` on
//! `xvault_hub::main::build_router`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use xvault_core::error::ErrorKind;
use xvault_core::model::job::{Job, JobStatus};

use crate::error::PipelineError;

/// Claim requests use a short deadline so a wedged Hub doesn't tie up a
/// worker's claim slot (spec.md §5, design 10s).
const CLAIM_TIMEOUT: Duration = Duration::from_secs(10);

/// Ordinary internal-API calls get a longer deadline than a claim attempt;
/// the Hub's own handlers are single round-trip database operations.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    worker_id: String,
}

impl HubClient {
    #[must_use]
    pub fn new(base_url: String, worker_id: String) -> Self {
        Self { http: reqwest::Client::new(), base_url, worker_id }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn register(&self, name: &str, storage_base_path: &str, capabilities: &[String]) -> Result<(), PipelineError> {
        #[derive(Serialize)]
        struct Req<'a> {
            worker_id: &'a str,
            name: &'a str,
            storage_base_path: &'a str,
            capabilities: &'a [String],
        }
        self.post_void(
            "/internal/workers/register",
            &Req { worker_id: &self.worker_id, name, storage_base_path, capabilities },
            DEFAULT_TIMEOUT,
        )
        .await
    }

    pub async fn heartbeat(&self, status: &str, system_metrics: Option<Value>) -> Result<(), PipelineError> {
        #[derive(Serialize)]
        struct Req<'a> {
            worker_id: &'a str,
            status: &'a str,
            system_metrics: Option<Value>,
        }
        self.post_void(
            "/internal/workers/heartbeat",
            &Req { worker_id: &self.worker_id, status, system_metrics },
            DEFAULT_TIMEOUT,
        )
        .await
    }

    /// Returns `Ok(None)` when the Hub reports `NOT_FOUND` (no queued job),
    /// rather than surfacing `JobError::NoJob` as a pipeline failure.
    pub async fn claim(&self) -> Result<Option<Job>, PipelineError> {
        #[derive(Serialize)]
        struct Req<'a> {
            worker_id: &'a str,
        }
        let resp = self
            .http
            .post(self.url("/internal/jobs/claim"))
            .timeout(CLAIM_TIMEOUT)
            .json(&Req { worker_id: &self.worker_id })
            .send()
            .await
            .map_err(|e| PipelineError::HubRequest(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let job: Job = handle_response(resp).await?;
        Ok(Some(job))
    }

    pub async fn renew_lease(&self, job_id: &str) -> Result<DateTime<Utc>, PipelineError> {
        #[derive(Serialize)]
        struct Req<'a> {
            worker_id: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            lease_expires_at: DateTime<Utc>,
        }
        let resp = self
            .http
            .post(self.url(&format!("/internal/jobs/{job_id}/lease")))
            .timeout(DEFAULT_TIMEOUT)
            .json(&Req { worker_id: &self.worker_id })
            .send()
            .await
            .map_err(|e| PipelineError::HubRequest(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::BAD_REQUEST || resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::LeaseLost(format!("renew rejected: {}", resp.status())));
        }
        let body = handle_response::<Resp>(resp).await?;
        Ok(body.lease_expires_at)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn complete(
        &self,
        job_id: &str,
        status: JobStatus,
        error_code: Option<ErrorKind>,
        error_message: Option<String>,
        snapshot: Option<CompletedSnapshotReport>,
    ) -> Result<(), PipelineError> {
        #[derive(Serialize)]
        struct Req<'a> {
            worker_id: &'a str,
            status: JobStatus,
            error_code: Option<ErrorKind>,
            error_message: Option<String>,
            snapshot: Option<CompletedSnapshotReport>,
        }
        self.post_void(
            &format!("/internal/jobs/{job_id}/complete"),
            &Req { worker_id: &self.worker_id, status, error_code, error_message, snapshot },
            DEFAULT_TIMEOUT,
        )
        .await
    }

    pub async fn get_credential(&self, credential_id: &str) -> Result<CredentialCiphertext, PipelineError> {
        let resp = self
            .http
            .get(self.url(&format!("/internal/credentials/{credential_id}")))
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| PipelineError::HubRequest(e.to_string()))?;
        handle_response(resp).await
    }

    pub async fn get_public_key(&self, tenant_id: &str) -> Result<String, PipelineError> {
        #[derive(Deserialize)]
        struct Resp {
            public_key: String,
        }
        let resp = self
            .http
            .get(self.url(&format!("/internal/tenants/{tenant_id}/public-key")))
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| PipelineError::HubRequest(e.to_string()))?;
        let body: Resp = handle_response(resp).await?;
        Ok(body.public_key)
    }

    async fn post_void(&self, path: &str, body: &impl Serialize, timeout: Duration) -> Result<(), PipelineError> {
        let resp = self
            .http
            .post(self.url(path))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::HubRequest(e.to_string()))?;
        check_ok(resp).await
    }
}

/// For endpoints whose Axum handler returns `Result<(), AppError>`, no
/// JSON body on success, just a status code.
async fn check_ok(resp: reqwest::Response) -> Result<(), PipelineError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PipelineError::HubRequest(format!("hub returned {status}: {body}")))
}

async fn handle_response<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, PipelineError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| PipelineError::HubRequest(e.to_string()))?;
    if !status.is_success() {
        return Err(PipelineError::HubRequest(format!("hub returned {status}: {body}")));
    }
    serde_json::from_str(&body).map_err(|e| PipelineError::HubRequest(format!("bad response body: {e}")))
}

#[derive(Deserialize)]
pub struct CredentialCiphertext {
    pub ciphertext_b64: String,
    pub key_id: String,
}

#[derive(Serialize)]
pub struct CompletedSnapshotReport {
    pub size_bytes: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub manifest: Value,
    pub encryption_algorithm: String,
    pub encryption_key_id: String,
    pub local_path: String,
}
