//! Prompt templates for résumé analysis.

/// Appended to the JSON-only system prompt for feedback calls.
pub const FEEDBACK_SYSTEM: &str = "You are an expert in ATS (Applicant Tracking System) \
    and résumé analysis. Rate résumés honestly: low scores are fine when deserved.";

/// Shape the model must answer with. Mirrors `models::feedback::Feedback`.
pub const FEEDBACK_RESPONSE_FORMAT: &str = r#"{
  "overallScore": number (0-100),
  "ATS": { "score": number, "tips": [{ "type": "good" | "improve", "tip": string }] },
  "toneAndStyle": { "score": number, "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }] },
  "content": { "score": number, "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }] },
  "structure": { "score": number, "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }] },
  "skills": { "score": number, "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }] }
}"#;

/// Builds analysis instructions from the job context supplied at upload.
pub fn prepare_instructions(job_title: Option<&str>, job_description: Option<&str>) -> String {
    let job_title = job_title.filter(|s| !s.trim().is_empty()).unwrap_or("(not provided)");
    let job_description = job_description
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("(not provided)");
    format!(
        "Analyze and rate this résumé and suggest how to improve it for the role below.\n\
         Be thorough and detailed. If there are many things to improve, say so.\n\
         Give 3-4 tips per category.\n\n\
         Job title: {job_title}\n\
         Job description: {job_description}\n\n\
         Respond with JSON in exactly this format:\n{FEEDBACK_RESPONSE_FORMAT}"
    )
}
