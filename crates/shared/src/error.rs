use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("symptoms must not be empty")]
    EmptySymptoms,
    #[error("gender must not be empty")]
    EmptyGender,
}
