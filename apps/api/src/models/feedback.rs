//! Structured scoring result produced by the analysis service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a tip praises something or asks for a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    /// ATS tips carry no explanation; every other category does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// One scored category: `{score, tips}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f64,
    #[serde(default)]
    pub tips: Vec<Tip>,
}

/// Feedback is considered valid as soon as it carries a numeric `overallScore`.
/// Category subtrees are optional. `parse` requires them well-formed; `from_stored` does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: f64,
    #[serde(rename = "ATS", default, skip_serializing_if = "Option::is_none")]
    pub ats: Option<CategoryScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_and_style: Option<CategoryScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<CategoryScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<CategoryScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<CategoryScore>,
}

impl Feedback {
    /// Parses analysis output text as feedback. Markdown code fences around the JSON are
    /// tolerated since models add them despite instructions.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_json_fences(text))
    }

    /// Reads feedback already persisted in a record. Only `overallScore` must be numeric:
    /// a malformed category is dropped and unreadable tips are skipped.
    pub fn from_stored(value: &Value) -> Option<Self> {
        let overall_score = value.get("overallScore")?.as_f64()?;
        let category = |key: &str| value.get(key).and_then(CategoryScore::from_stored);
        Some(Self {
            overall_score,
            ats: category("ATS"),
            tone_and_style: category("toneAndStyle"),
            content: category("content"),
            structure: category("structure"),
            skills: category("skills"),
        })
    }
}

impl CategoryScore {
    fn from_stored(value: &Value) -> Option<Self> {
        let score = value.get("score")?.as_f64()?;
        let tips = value
            .get("tips")
            .and_then(Value::as_array)
            .map(|tips| {
                tips.iter()
                    .filter_map(|tip| Tip::deserialize(tip).ok())
                    .collect()
            })
            .unwrap_or_default();
        Some(Self { score, tips })
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_feedback() {
        let json = r#"{
            "overallScore": 82,
            "ATS": {"score": 75, "tips": [{"type": "good", "tip": "Clear headings"}]},
            "toneAndStyle": {"score": 80, "tips": [
                {"type": "improve", "tip": "Fewer adjectives", "explanation": "Reads as filler."}
            ]},
            "content": {"score": 85, "tips": []},
            "structure": {"score": 90, "tips": []},
            "skills": {"score": 70, "tips": []}
        }"#;
        let feedback = Feedback::parse(json).unwrap();
        assert_eq!(feedback.overall_score, 82.0);
        let ats = feedback.ats.unwrap();
        assert_eq!(ats.tips[0].kind, TipKind::Good);
        assert!(ats.tips[0].explanation.is_none());
        assert_eq!(
            feedback.tone_and_style.unwrap().tips[0].explanation.as_deref(),
            Some("Reads as filler.")
        );
    }

    #[test]
    fn test_parse_requires_numeric_overall_score() {
        assert!(Feedback::parse(r#"{"overallScore": "high"}"#).is_err());
        assert!(Feedback::parse(r#"{"ATS": {"score": 1, "tips": []}}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_category() {
        let json = r#"{"overallScore": 50, "skills": {"tips": []}}"#;
        assert!(Feedback::parse(json).is_err());
    }

    #[test]
    fn test_stored_feedback_keeps_score_and_drops_bad_parts() {
        let value: Value = serde_json::from_str(
            r#"{
                "overallScore": 82,
                "ATS": {"score": 70, "tips": [
                    {"type": "neutral", "tip": "ok"},
                    {"type": "good", "tip": "Clear headings"}
                ]},
                "skills": {"tips": []},
                "content": "n/a"
            }"#,
        )
        .unwrap();
        let feedback = Feedback::from_stored(&value).unwrap();

        assert_eq!(feedback.overall_score, 82.0);
        let ats = feedback.ats.unwrap();
        assert_eq!(ats.score, 70.0);
        assert_eq!(ats.tips.len(), 1);
        assert_eq!(ats.tips[0].tip, "Clear headings");
        assert!(feedback.skills.is_none());
        assert!(feedback.content.is_none());
    }

    #[test]
    fn test_stored_feedback_requires_numeric_overall_score() {
        let value = serde_json::json!({"overallScore": "82", "ATS": {"score": 70, "tips": []}});
        assert!(Feedback::from_stored(&value).is_none());
        assert!(Feedback::from_stored(&serde_json::json!({"tips": []})).is_none());
    }

    #[test]
    fn test_parse_fenced_output() {
        let fenced = "```json\n{\"overallScore\": 64}\n```";
        assert_eq!(Feedback::parse(fenced).unwrap().overall_score, 64.0);
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }
}
