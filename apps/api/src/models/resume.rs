use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::models::feedback::Feedback;

/// Prefix of every persisted résumé key. `resume:*` enumerates them all.
pub const KEY_PREFIX: &str = "resume:";

/// Store key for a résumé record: `resume:<id>`.
pub fn record_key(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeStatus {
    #[default]
    Processing,
    Success,
    Error,
}

impl ResumeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ResumeStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResumeStatus::Processing => "processing",
            ResumeStatus::Success => "success",
            ResumeStatus::Error => "error",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("record {id} is already {status} and cannot transition again")]
    AlreadyTerminal { id: String, status: &'static str },
}

/// Free-text job context supplied with an upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobDetails {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub job_description: Option<String>,
}

/// The persisted state of one analysis attempt, stored as JSON under `resume:<id>`.
///
/// Only the upload pipeline (or the analysis worker) writes it, always as a full-record
/// overwrite. Readers never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(default)]
    pub resume_path: String,
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub status: ResumeStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "lenient_feedback")]
    pub feedback: Option<Feedback>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Feedback without a numeric `overallScore` means "no valid feedback yet", not a
/// corrupted record.
fn lenient_feedback<'de, D>(deserializer: D) -> Result<Option<Feedback>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Feedback::from_stored))
}

/// Current time at millisecond precision, matching what the wire format can carry.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

impl ResumeRecord {
    /// A fresh record in `processing`, created once both uploads have succeeded.
    pub fn new(id: String, job: &JobDetails, resume_path: String, image_path: String) -> Self {
        let now = now_millis();
        Self {
            id,
            company_name: job.company_name.clone(),
            job_title: job.job_title.clone(),
            job_description: job.job_description.clone(),
            resume_path,
            image_path,
            status: ResumeStatus::Processing,
            error_message: None,
            feedback: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Minimal valid record for failure handlers that only know the id and job context.
    pub fn partial(id: String, job: &JobDetails) -> Self {
        Self::new(id, job, String::new(), String::new())
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn key(&self) -> String {
        record_key(&self.id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn mark_success(&mut self, feedback: Feedback) -> Result<(), RecordError> {
        self.ensure_processing()?;
        self.status = ResumeStatus::Success;
        self.feedback = Some(feedback);
        self.error_message = None;
        self.touch();
        Ok(())
    }

    pub fn mark_error(&mut self, message: impl Into<String>) -> Result<(), RecordError> {
        self.ensure_processing()?;
        self.status = ResumeStatus::Error;
        self.error_message = Some(message.into());
        self.touch();
        Ok(())
    }

    fn ensure_processing(&self) -> Result<(), RecordError> {
        if self.is_terminal() {
            return Err(RecordError::AlreadyTerminal {
                id: self.id.clone(),
                status: self.status.as_str(),
            });
        }
        Ok(())
    }

    /// Refreshes `updatedAt`, never moving it backwards.
    fn touch(&mut self) {
        let now = now_millis();
        self.updated_at = Some(match self.updated_at {
            Some(previous) if previous > now => previous,
            _ => now,
        });
        if self.created_at.is_none() {
            self.created_at = self.updated_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feedback::{CategoryScore, Tip, TipKind};

    fn job() -> JobDetails {
        JobDetails {
            company_name: Some("Acme".to_string()),
            job_title: Some("Backend Engineer".to_string()),
            job_description: Some("Rust, Redis, S3".to_string()),
        }
    }

    fn feedback(score: f64) -> Feedback {
        Feedback {
            overall_score: score,
            ats: Some(CategoryScore {
                score: 71.0,
                tips: vec![Tip {
                    kind: TipKind::Improve,
                    tip: "Add a skills section".to_string(),
                    explanation: None,
                }],
            }),
            tone_and_style: None,
            content: None,
            structure: None,
            skills: None,
        }
    }

    #[test]
    fn test_record_key_format() {
        assert_eq!(record_key("abc"), "resume:abc");
    }

    #[test]
    fn test_new_record_is_processing() {
        let record = ResumeRecord::new(
            "abc".to_string(),
            &job(),
            "uploads/1/cv.pdf".to_string(),
            "uploads/2/cv.png".to_string(),
        );
        assert_eq!(record.status, ResumeStatus::Processing);
        assert!(record.feedback.is_none());
        assert!(record.error_message.is_none());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_decode_encode_preserves_every_field() {
        let mut record = ResumeRecord::new(
            "abc".to_string(),
            &job(),
            "uploads/1/cv.pdf".to_string(),
            "uploads/2/cv.png".to_string(),
        );
        record.mark_success(feedback(82.0)).unwrap();
        let decoded = ResumeRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_wire_format_is_camel_case_with_millis() {
        let record = ResumeRecord::partial("abc".to_string(), &job());
        let value: serde_json::Value = serde_json::from_str(&record.encode().unwrap()).unwrap();
        assert_eq!(value["status"], "processing");
        assert_eq!(value["jobTitle"], "Backend Engineer");
        assert!(value["feedback"].is_null());
        assert!(value["errorMessage"].is_null());
        assert_eq!(
            value["createdAt"].as_i64(),
            record.created_at.map(|t| t.timestamp_millis())
        );
    }

    #[test]
    fn test_decode_minimal_record_defaults_to_processing() {
        let record = ResumeRecord::decode(r#"{"id":"abc","feedback":null}"#).unwrap();
        assert_eq!(record.status, ResumeStatus::Processing);
        assert!(record.feedback.is_none());
    }

    #[test]
    fn test_malformed_feedback_is_not_valid_feedback() {
        let record =
            ResumeRecord::decode(r#"{"id":"abc","status":"success","feedback":{"tips":[]}}"#)
                .unwrap();
        assert_eq!(record.status, ResumeStatus::Success);
        assert!(record.feedback.is_none());
    }

    #[test]
    fn test_numeric_score_keeps_feedback_despite_bad_tip() {
        let record = ResumeRecord::decode(
            r#"{"id":"abc","status":"success","feedback":{"overallScore":82,"ATS":{"score":70,"tips":[{"type":"neutral","tip":"ok"}]}}}"#,
        )
        .unwrap();
        let feedback = record.feedback.expect("feedback kept");
        assert_eq!(feedback.overall_score, 82.0);
        assert_eq!(feedback.ats.map(|c| c.tips.len()), Some(0));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(ResumeRecord::decode("{not json").is_err());
        assert!(ResumeRecord::decode(r#"{"status":"processing"}"#).is_err());
        assert!(ResumeRecord::decode(r#"{"id":"abc","status":"done"}"#).is_err());
    }

    #[test]
    fn test_terminal_record_refuses_transitions() {
        let mut record = ResumeRecord::partial("abc".to_string(), &job());
        record.mark_error("analysis failed").unwrap();
        assert_eq!(record.status, ResumeStatus::Error);
        assert_eq!(record.error_message.as_deref(), Some("analysis failed"));

        let err = record.mark_success(feedback(90.0)).unwrap_err();
        assert_eq!(
            err,
            RecordError::AlreadyTerminal {
                id: "abc".to_string(),
                status: "error",
            }
        );
        assert!(record.feedback.is_none());
    }

    #[test]
    fn test_updated_at_never_moves_backwards() {
        let mut record = ResumeRecord::partial("abc".to_string(), &job());
        let future = now_millis() + chrono::Duration::hours(1);
        record.updated_at = Some(future);
        record.mark_error("boom").unwrap();
        assert_eq!(record.updated_at, Some(future));
    }
}
