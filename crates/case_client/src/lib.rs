use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{CandidateDiagnosis, CaseId, CaseInput, FeedbackStats},
    protocol::{
        CaseStatus, CaseStatusResponse, CreateCaseRequest, CreateCaseResponse, FeedbackAck,
        FeedbackRequest,
    },
};
use tracing::{debug, info, warn};
use url::Url;

pub mod config;
pub mod error;
pub mod notification;
pub mod selection;
pub mod workflow;

pub use config::WorkflowConfig;
pub use error::{BackendError, FeedbackError, PollError, StatsError, SubmissionError};
pub use notification::{Notification, NotificationKind, NotificationManager};
pub use selection::CandidateSelection;
pub use workflow::{CaseWorkflow, IntentOutcome, RejectReason, WorkflowPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaseHandle {
    pub case_id: CaseId,
}

impl CaseHandle {
    pub fn new(case_id: CaseId) -> Self {
        Self { case_id }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pending { status: Option<CaseStatus> },
    Diagnosed(Vec<CandidateDiagnosis>),
}

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    PhaseChanged(WorkflowPhase),
    Notification(Option<Notification>),
}

#[async_trait]
pub trait CaseBackend: Send + Sync {
    async fn submit(&self, input: &CaseInput) -> Result<CaseHandle, SubmissionError>;
    async fn poll(&self, handle: &CaseHandle) -> Result<PollOutcome, PollError>;
    async fn send_feedback(
        &self,
        handle: &CaseHandle,
        candidate: &CandidateDiagnosis,
        accepted: bool,
    ) -> Result<FeedbackAck, FeedbackError>;
    async fn stats(&self) -> Result<FeedbackStats, StatsError>;
}

pub struct HttpCaseBackend {
    http: Client,
    base_url: String,
}

impl HttpCaseBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        Self::with_timeout(base_url, config::DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let parsed = Url::parse(base_url).map_err(|err| BackendError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

async fn decode_json<T: DeserializeOwned>(res: Response) -> Result<T, BackendError> {
    let status = res.status();
    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
        });
    }
    res.json::<T>()
        .await
        .map_err(|err| BackendError::Decode(err.to_string()))
}

#[async_trait]
impl CaseBackend for HttpCaseBackend {
    async fn submit(&self, input: &CaseInput) -> Result<CaseHandle, SubmissionError> {
        let res = self
            .http
            .post(self.endpoint("cases"))
            .json(&CreateCaseRequest::from(input))
            .send()
            .await
            .map_err(BackendError::from)?;
        let body: CreateCaseResponse = decode_json(res).await?;
        info!(case_id = %body.case_id, status = ?body.status, "case accepted by backend");
        Ok(CaseHandle::new(body.case_id))
    }

    async fn poll(&self, handle: &CaseHandle) -> Result<PollOutcome, PollError> {
        let res = self
            .http
            .get(self.endpoint(&format!("cases/{}", handle.case_id)))
            .send()
            .await
            .map_err(BackendError::from)?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PollError::CaseNotFound(handle.case_id));
        }
        let body: CaseStatusResponse = decode_json(res).await?;
        if let Some(reason) = &body.error {
            warn!(case_id = %handle.case_id, reason = %reason, "backend reported case error");
            return Err(PollError::CaseNotFound(handle.case_id));
        }
        match body.status {
            Some(CaseStatus::Diagnosed) => {
                let candidates = body.into_candidates();
                debug!(case_id = %handle.case_id, count = candidates.len(), "case diagnosed");
                Ok(PollOutcome::Diagnosed(candidates))
            }
            Some(status) => Ok(PollOutcome::Pending {
                status: Some(status),
            }),
            None => Err(BackendError::Decode("case status missing from response".into()).into()),
        }
    }

    async fn send_feedback(
        &self,
        handle: &CaseHandle,
        candidate: &CandidateDiagnosis,
        accepted: bool,
    ) -> Result<FeedbackAck, FeedbackError> {
        let res = self
            .http
            .post(self.endpoint("feedback"))
            .json(&FeedbackRequest {
                case_id: handle.case_id,
                disease: candidate.disease.clone(),
                accepted,
            })
            .send()
            .await
            .map_err(BackendError::from)?
            .error_for_status()
            .map_err(BackendError::from)?;
        // The ack body is informational; a 2xx means the verdict was stored.
        let raw = res.text().await.map_err(BackendError::from)?;
        let ack = if raw.trim().is_empty() {
            FeedbackAck::default()
        } else {
            serde_json::from_str(&raw).unwrap_or_default()
        };
        info!(case_id = %handle.case_id, disease = %candidate.disease, accepted, "feedback stored");
        Ok(ack)
    }

    async fn stats(&self) -> Result<FeedbackStats, StatsError> {
        let res = self
            .http
            .get(self.endpoint("stats"))
            .send()
            .await
            .map_err(BackendError::from)?;
        Ok(decode_json(res).await?)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
