use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(CaseId);

/// Patient gender as entered by the operator.
///
/// The three canonical values are recognised case-insensitively; anything else
/// is kept verbatim so localized entries reach the backend unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Other,
    FreeText(String),
}

impl Gender {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::FreeText(text) => text,
        }
    }
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyGender);
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "male" => Self::Male,
            "female" => Self::Female,
            "other" => Self::Other,
            _ => Self::FreeText(trimmed.to_string()),
        })
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Gender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Accept,
    Review,
    Reject,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Review => "REVIEW",
            Self::Reject => "REJECT",
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ACCEPT" => Ok(Self::Accept),
            "REVIEW" => Ok(Self::Review),
            "REJECT" => Ok(Self::Reject),
            other => Err(format!("unknown decision '{other}'")),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDiagnosis {
    pub disease: String,
    pub confidence: f64,
    pub decision: Decision,
}

impl CandidateDiagnosis {
    pub fn new(disease: impl Into<String>, confidence: f64, decision: Decision) -> Self {
        Self {
            disease: disease.into(),
            confidence,
            decision,
        }
    }

    pub fn confidence_percent(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseInput {
    age: u32,
    gender: Gender,
    symptoms: String,
}

impl CaseInput {
    pub fn new(
        age: u32,
        gender: impl AsRef<str>,
        symptoms: impl AsRef<str>,
    ) -> Result<Self, ValidationError> {
        let symptoms = symptoms.as_ref().trim();
        if symptoms.is_empty() {
            return Err(ValidationError::EmptySymptoms);
        }
        let gender = gender.as_ref().parse::<Gender>()?;
        Ok(Self {
            age,
            gender,
            symptoms: symptoms.to_string(),
        })
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn gender(&self) -> &Gender {
        &self.gender
    }

    pub fn symptoms(&self) -> &str {
        &self.symptoms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub accepted: u64,
    pub rejected: u64,
    pub total: u64,
    pub rejection_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_input_rejects_blank_symptoms() {
        let err = CaseInput::new(34, "male", "   ").expect_err("blank symptoms");
        assert_eq!(err, ValidationError::EmptySymptoms);
    }

    #[test]
    fn case_input_rejects_blank_gender() {
        let err = CaseInput::new(34, "", "cough").expect_err("blank gender");
        assert_eq!(err, ValidationError::EmptyGender);
    }

    #[test]
    fn localized_gender_is_kept_verbatim() {
        let input = CaseInput::new(34, " Muško ", "headache, fever").expect("valid");
        assert_eq!(input.gender(), &Gender::FreeText("Muško".into()));
        assert_eq!(input.symptoms(), "headache, fever");

        let json = serde_json::to_value(&input).expect("serialize");
        assert_eq!(json["gender"], "Muško");
        assert_eq!(json["age"], 34);
    }

    #[test]
    fn canonical_gender_is_case_insensitive() {
        assert_eq!("FEMALE".parse::<Gender>(), Ok(Gender::Female));
        assert_eq!("Other".parse::<Gender>(), Ok(Gender::Other));
    }

    #[test]
    fn decision_parses_backend_spellings() {
        let parsed: Vec<Decision> =
            serde_json::from_str(r#"["ACCEPT", "Review", "reject"]"#).expect("decisions");
        assert_eq!(parsed, vec![Decision::Accept, Decision::Review, Decision::Reject]);
        assert!(serde_json::from_str::<Decision>(r#""MAYBE""#).is_err());
    }

    #[test]
    fn confidence_percent_is_clamped() {
        assert_eq!(CandidateDiagnosis::new("Flu", 0.824, Decision::Accept).confidence_percent(), 82);
        assert_eq!(CandidateDiagnosis::new("Flu", 1.7, Decision::Accept).confidence_percent(), 100);
    }
}
