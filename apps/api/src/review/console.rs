//! Console rendition of the review screen: prints each view change, `r` refreshes,
//! `q` (or Ctrl-C) leaves the view.

use anyhow::Result;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::reconciler::ReviewState;
use super::session::{RefreshOutcome, ReviewSession, ReviewView};
use crate::models::feedback::{CategoryScore, Feedback, TipKind};

/// Runs the view until a terminal state or the user leaves. Returns the last state seen.
pub async fn run(session: ReviewSession) -> Result<ReviewState> {
    let session = Arc::new(session);
    let mut rx = session.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!("Reviewing résumé {}", session.id());
    let mut last = session.view();
    println!("{}", render(&last));

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();
                if view != last {
                    println!("{}", render(&view));
                    last = view;
                }
                if last.state.is_terminal() {
                    break;
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line?.as_deref().map(str::trim) {
                    Some("r") => {
                        let session = Arc::clone(&session);
                        tokio::spawn(async move {
                            if session.refresh().await == RefreshOutcome::Busy {
                                println!("Refresh already in progress...");
                            }
                        });
                    }
                    Some("q") => break,
                    Some(_) => {}
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.unmount();
    Ok(last.state)
}

/// Text shown for one view state.
pub fn render(view: &ReviewView) -> String {
    let mut out = String::new();
    if let Some(image) = &view.preview_image {
        let _ = writeln!(out, "Preview: {}", image.display());
    }
    if let Some(file) = &view.resume_file {
        let _ = writeln!(out, "Résumé: {}", file.display());
    }
    match &view.state {
        ReviewState::Processing => {
            out.push_str(
                "Your résumé is being analyzed. This can take a few moments. \
                 [r] refresh status, [q] quit",
            );
        }
        ReviewState::Success(feedback) => render_feedback(&mut out, feedback),
        ReviewState::Error(message) => {
            let _ = write!(out, "Analysis failed: {message}");
        }
        ReviewState::NotFound => {
            out.push_str(view.state.message().unwrap_or_default());
        }
    }
    out
}

fn render_feedback(out: &mut String, feedback: &Feedback) {
    let _ = writeln!(out, "Overall score: {:.0}/100", feedback.overall_score);
    let categories = [
        ("ATS", &feedback.ats),
        ("Tone & Style", &feedback.tone_and_style),
        ("Content", &feedback.content),
        ("Structure", &feedback.structure),
        ("Skills", &feedback.skills),
    ];
    for (name, category) in categories {
        if let Some(category) = category {
            render_category(out, name, category);
        }
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
}

fn render_category(out: &mut String, name: &str, category: &CategoryScore) {
    let _ = writeln!(out, "{name}: {:.0}/100", category.score);
    for tip in &category.tips {
        let marker = match tip.kind {
            TipKind::Good => "+",
            TipKind::Improve => "!",
        };
        match &tip.explanation {
            Some(explanation) => {
                let _ = writeln!(out, "  {marker} {}: {explanation}", tip.tip);
            }
            None => {
                let _ = writeln!(out, "  {marker} {}", tip.tip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::reconciler::NOT_FOUND_MESSAGE;

    fn view(state: ReviewState) -> ReviewView {
        ReviewView {
            state,
            resume_file: None,
            preview_image: None,
        }
    }

    #[test]
    fn test_render_feedback_lists_categories_and_tips() {
        let feedback = Feedback::parse(
            r#"{
                "overallScore": 82,
                "ATS": {"score": 70, "tips": [{"type": "good", "tip": "Standard headings"}]},
                "skills": {"score": 64, "tips": [
                    {"type": "improve", "tip": "Name your tools", "explanation": "ATS matches keywords."}
                ]}
            }"#,
        )
        .unwrap();

        let text = render(&view(ReviewState::Success(feedback)));

        assert_eq!(
            text,
            "Overall score: 82/100\n\
             ATS: 70/100\n  + Standard headings\n\
             Skills: 64/100\n  ! Name your tools: ATS matches keywords."
        );
    }

    #[test]
    fn test_render_terminal_errors() {
        assert_eq!(
            render(&view(ReviewState::Error("PDF has no text".to_string()))),
            "Analysis failed: PDF has no text"
        );
        assert_eq!(render(&view(ReviewState::NotFound)), NOT_FOUND_MESSAGE);
    }

    #[test]
    fn test_render_includes_local_preview_paths() {
        let mut processing = view(ReviewState::Processing);
        processing.preview_image = Some("/tmp/resumind-1.png".into());
        let text = render(&processing);
        assert!(text.starts_with("Preview: /tmp/resumind-1.png\n"));
        assert!(text.contains("being analyzed"));
    }
}
