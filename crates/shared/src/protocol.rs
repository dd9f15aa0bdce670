use serde::{Deserialize, Serialize};

use crate::domain::{CandidateDiagnosis, CaseId, CaseInput, Gender};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaseRequest {
    pub age: u32,
    pub gender: Gender,
    pub symptoms: String,
}

impl From<&CaseInput> for CreateCaseRequest {
    fn from(input: &CaseInput) -> Self {
        Self {
            age: input.age(),
            gender: input.gender().clone(),
            symptoms: input.symptoms().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaseResponse {
    pub case_id: CaseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    #[serde(alias = "Pending")]
    Pending,
    #[serde(alias = "Queued")]
    Queued,
    #[serde(alias = "Processing")]
    Processing,
    #[serde(alias = "Diagnosed")]
    Diagnosed,
    #[serde(alias = "PendingReview")]
    PendingReview,
    #[serde(alias = "Rejected")]
    Rejected,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseStatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CaseStatus>,
    #[serde(
        default,
        alias = "prediction",
        skip_serializing_if = "Option::is_none"
    )]
    pub main_prediction: Option<CandidateDiagnosis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_predictions: Option<Vec<CandidateDiagnosis>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaseStatusResponse {
    /// Ranked candidates in backend order. Falls back to the main prediction
    /// alone when the ranked list is missing or empty.
    pub fn into_candidates(self) -> Vec<CandidateDiagnosis> {
        match self.other_predictions {
            Some(ranked) if !ranked.is_empty() => ranked,
            _ => self.main_prediction.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub case_id: CaseId,
    pub disease: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decision;

    #[test]
    fn diagnosed_response_keeps_backend_order() {
        let body = r#"{
            "status": "DIAGNOSED",
            "other_predictions": [
                {"disease": "Flu", "confidence": 0.82, "decision": "ACCEPT"},
                {"disease": "Cold", "confidence": 0.4, "decision": "REVIEW"}
            ]
        }"#;
        let parsed: CaseStatusResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.status, Some(CaseStatus::Diagnosed));
        let diseases: Vec<String> = parsed
            .into_candidates()
            .into_iter()
            .map(|c| c.disease)
            .collect();
        assert_eq!(diseases, vec!["Flu", "Cold"]);
    }

    #[test]
    fn empty_ranked_list_falls_back_to_main_prediction() {
        let body = r#"{
            "status": "DIAGNOSED",
            "main_prediction": {"disease": "Migraine", "confidence": 0.9, "decision": "Accept"},
            "other_predictions": []
        }"#;
        let parsed: CaseStatusResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(
            parsed.into_candidates(),
            vec![CandidateDiagnosis::new("Migraine", 0.9, Decision::Accept)]
        );
    }

    #[test]
    fn missing_predictions_yield_no_candidates() {
        let parsed: CaseStatusResponse =
            serde_json::from_str(r#"{"status": "DIAGNOSED", "main_prediction": null}"#)
                .expect("parse");
        assert!(parsed.into_candidates().is_empty());
    }

    #[test]
    fn unknown_status_values_do_not_fail_parsing() {
        let parsed: CaseStatusResponse =
            serde_json::from_str(r#"{"status": "ARCHIVED"}"#).expect("parse");
        assert_eq!(parsed.status, Some(CaseStatus::Unknown));

        let parsed: CaseStatusResponse =
            serde_json::from_str(r#"{"status": "Processing"}"#).expect("parse");
        assert_eq!(parsed.status, Some(CaseStatus::Processing));
    }

    #[test]
    fn create_case_request_carries_localized_gender() {
        let input = CaseInput::new(34, "Muško", "headache, fever").expect("input");
        let body = serde_json::to_value(CreateCaseRequest::from(&input)).expect("json");
        assert_eq!(
            body,
            serde_json::json!({"age": 34, "gender": "Muško", "symptoms": "headache, fever"})
        );
    }
}
