use shared::domain::CaseId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("invalid backend url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend answered with status {status}")]
    Status { status: u16 },
    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("case submission failed: {0}")]
pub struct SubmissionError(#[from] pub BackendError);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("no active case; submit a case first")]
    NoActiveCase,
    #[error("case {0} not found")]
    CaseNotFound(CaseId),
    #[error("result poll failed: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feedback dispatch failed: {0}")]
pub struct FeedbackError(#[from] pub BackendError);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feedback statistics unavailable: {0}")]
pub struct StatsError(#[from] pub BackendError);
