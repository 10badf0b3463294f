//! Review-state reconciliation, isolated from timers and I/O.
//!
//! One polling cycle is: fetch `resume:<id>` → `decode` → `next`. The session owns the
//! scheduling; everything here is a pure function of the previous state and the fetch.

use std::time::Duration;

use crate::models::feedback::Feedback;
use crate::models::resume::{ResumeRecord, ResumeStatus};

pub const NOT_FOUND_MESSAGE: &str = "We couldn't find this resume. Please try uploading again.";
pub const CORRUPTED_MESSAGE: &str = "Saved resume data is corrupted. Please re-upload.";
pub const TIMEOUT_MESSAGE: &str =
    "Analysis is taking longer than expected. Please try again later.";
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong while analyzing your resume.";
pub const UNAVAILABLE_MESSAGE: &str =
    "We couldn't reach the resume service. Please try again later.";

/// Local view state of the review screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewState {
    Processing,
    Success(Feedback),
    Error(String),
    NotFound,
}

impl ReviewState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewState::Processing)
    }

    /// Status as the record schema spells it. `NotFound` is reported as an error.
    pub fn status(&self) -> ResumeStatus {
        match self {
            ReviewState::Processing => ResumeStatus::Processing,
            ReviewState::Success(_) => ResumeStatus::Success,
            ReviewState::Error(_) | ReviewState::NotFound => ResumeStatus::Error,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ReviewState::Error(message) => Some(message),
            ReviewState::NotFound => Some(NOT_FOUND_MESSAGE),
            _ => None,
        }
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        match self {
            ReviewState::Success(feedback) => Some(feedback),
            _ => None,
        }
    }
}

/// Cadence and ceilings of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    /// Misses tolerated before the record is declared not found.
    pub max_not_found: u32,
    /// Still-processing reads tolerated before giving up.
    pub max_attempts: u32,
    /// Consecutive failed store reads tolerated before giving up.
    pub max_unavailable: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(2000),
            backoff_factor: 1.5,
            max_delay: Duration::from_millis(10_000),
            max_not_found: 15,
            max_attempts: 25,
            max_unavailable: 10,
        }
    }
}

/// Everything one polling session tracks between cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    pub view: ReviewState,
    pub delay: Duration,
    pub attempts: u32,
    pub not_found: u32,
    /// Failed reads in a row; any successful read resets it.
    pub unavailable: u32,
}

impl PollState {
    pub fn initial(policy: &PollPolicy) -> Self {
        Self {
            view: ReviewState::Processing,
            delay: policy.initial_delay,
            attempts: 0,
            not_found: 0,
            unavailable: 0,
        }
    }
}

/// Outcome of reading the record once.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    Missing,
    Corrupted(String),
    Record(ResumeRecord),
    /// The store could not be read at all.
    Unavailable(String),
}

pub fn decode(raw: Option<String>) -> Fetch {
    match raw {
        None => Fetch::Missing,
        Some(text) => match ResumeRecord::decode(&text) {
            Ok(record) => Fetch::Record(record),
            Err(e) => Fetch::Corrupted(e.to_string()),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    ScheduleRetry(Duration),
    Stop,
}

/// The view state a record implies on its own. `error` wins over any feedback; valid
/// feedback means success whatever the stored status says.
pub fn adopt(record: &ResumeRecord) -> ReviewState {
    if record.status == ResumeStatus::Error {
        return ReviewState::Error(
            record
                .error_message
                .clone()
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
        );
    }
    match &record.feedback {
        Some(feedback) => ReviewState::Success(feedback.clone()),
        None => ReviewState::Processing,
    }
}

/// One polling transition. Terminal states are absorbing.
pub fn next(state: PollState, fetch: Fetch, policy: &PollPolicy) -> (PollState, Action) {
    if state.view.is_terminal() {
        return (state, Action::Stop);
    }

    let unavailable = state.unavailable;
    let state = PollState {
        unavailable: 0,
        ..state
    };

    match fetch {
        Fetch::Unavailable(_) => {
            let unavailable = unavailable + 1;
            if unavailable > policy.max_unavailable {
                let state = PollState {
                    view: ReviewState::Error(UNAVAILABLE_MESSAGE.to_string()),
                    unavailable,
                    ..state
                };
                return (state, Action::Stop);
            }
            let delay = state.delay;
            (PollState { unavailable, ..state }, Action::ScheduleRetry(delay))
        }
        Fetch::Missing => {
            let not_found = state.not_found + 1;
            if not_found > policy.max_not_found {
                let state = PollState {
                    view: ReviewState::NotFound,
                    not_found,
                    ..state
                };
                return (state, Action::Stop);
            }
            let delay = state.delay;
            (PollState { not_found, ..state }, Action::ScheduleRetry(delay))
        }
        Fetch::Corrupted(_) => (
            PollState {
                view: ReviewState::Error(CORRUPTED_MESSAGE.to_string()),
                ..state
            },
            Action::Stop,
        ),
        Fetch::Record(record) => match adopt(&record) {
            ReviewState::Processing => {
                let attempts = state.attempts + 1;
                let delay = state
                    .delay
                    .mul_f64(policy.backoff_factor)
                    .min(policy.max_delay);
                if attempts > policy.max_attempts {
                    let state = PollState {
                        view: ReviewState::Error(TIMEOUT_MESSAGE.to_string()),
                        attempts,
                        delay,
                        ..state
                    };
                    return (state, Action::Stop);
                }
                let state = PollState {
                    view: ReviewState::Processing,
                    attempts,
                    delay,
                    ..state
                };
                (state, Action::ScheduleRetry(delay))
            }
            terminal => (
                PollState {
                    view: terminal,
                    ..state
                },
                Action::Stop,
            ),
        },
    }
}

/// Manual-refresh transition: same decode and adoption as a cycle, no counters, no
/// scheduling. `None` means the read is ignored.
pub fn refresh(state: &PollState, fetch: Fetch) -> Option<ReviewState> {
    if state.view.is_terminal() {
        return None;
    }
    match fetch {
        Fetch::Missing | Fetch::Unavailable(_) => None,
        Fetch::Corrupted(_) => Some(ReviewState::Error(CORRUPTED_MESSAGE.to_string())),
        Fetch::Record(record) => Some(adopt(&record)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::JobDetails;

    fn processing() -> Fetch {
        Fetch::Record(ResumeRecord::partial(
            "abc".to_string(),
            &JobDetails::default(),
        ))
    }

    fn feedback(score: f64) -> Feedback {
        Feedback {
            overall_score: score,
            ats: None,
            tone_and_style: None,
            content: None,
            structure: None,
            skills: None,
        }
    }

    fn succeeded(score: f64) -> Fetch {
        let mut record = ResumeRecord::partial("abc".to_string(), &JobDetails::default());
        record.mark_success(feedback(score)).unwrap();
        Fetch::Record(record)
    }

    fn failed(message: Option<&str>) -> Fetch {
        let mut record = ResumeRecord::partial("abc".to_string(), &JobDetails::default());
        record.mark_error("x").unwrap();
        record.error_message = message.map(String::from);
        Fetch::Record(record)
    }

    #[test]
    fn test_decode_classifies_raw_values() {
        assert_eq!(decode(None), Fetch::Missing);
        assert!(matches!(decode(Some("{not json".to_string())), Fetch::Corrupted(_)));
        assert!(matches!(
            decode(Some(r#"{"id":"abc","status":"processing","feedback":null}"#.to_string())),
            Fetch::Record(_)
        ));
    }

    #[test]
    fn test_backoff_grows_by_half_and_caps() {
        let policy = PollPolicy::default();
        let mut state = PollState::initial(&policy);
        let mut delays = Vec::new();
        for _ in 0..8 {
            let (next_state, action) = next(state, processing(), &policy);
            let Action::ScheduleRetry(delay) = action else {
                panic!("expected retry, got {action:?}");
            };
            assert_eq!(delay, next_state.delay);
            delays.push(delay.as_millis());
            state = next_state;
        }
        assert_eq!(delays[..4], [3000, 4500, 6750, 10_000]);
        assert_eq!(state.delay, Duration::from_millis(10_000));
        assert_eq!(state.attempts, 8);
    }

    #[test]
    fn test_not_found_gives_up_on_sixteenth_miss() {
        let policy = PollPolicy::default();
        let mut state = PollState::initial(&policy);
        for miss in 1..=15 {
            let (next_state, action) = next(state, Fetch::Missing, &policy);
            assert_eq!(
                action,
                Action::ScheduleRetry(policy.initial_delay),
                "miss {miss}"
            );
            state = next_state;
        }
        let (state, action) = next(state, Fetch::Missing, &policy);
        assert_eq!(action, Action::Stop);
        assert_eq!(state.view, ReviewState::NotFound);
        assert_eq!(state.not_found, 16);
        assert_eq!(state.delay, policy.initial_delay);
    }

    #[test]
    fn test_processing_times_out_on_twenty_sixth_read() {
        let policy = PollPolicy::default();
        let mut state = PollState::initial(&policy);
        for _ in 0..25 {
            let (next_state, action) = next(state, processing(), &policy);
            assert!(matches!(action, Action::ScheduleRetry(_)));
            state = next_state;
        }
        let (state, action) = next(state, processing(), &policy);
        assert_eq!(action, Action::Stop);
        assert_eq!(state.view, ReviewState::Error(TIMEOUT_MESSAGE.to_string()));
    }

    #[test]
    fn test_store_outage_gives_up_on_eleventh_failure() {
        let policy = PollPolicy::default();
        let mut state = PollState::initial(&policy);
        for failure in 1..=10 {
            let (next_state, action) =
                next(state, Fetch::Unavailable("connection refused".into()), &policy);
            assert_eq!(
                action,
                Action::ScheduleRetry(policy.initial_delay),
                "failure {failure}"
            );
            state = next_state;
        }
        let (state, action) = next(state, Fetch::Unavailable("connection refused".into()), &policy);
        assert_eq!(action, Action::Stop);
        assert_eq!(state.view, ReviewState::Error(UNAVAILABLE_MESSAGE.to_string()));
        assert_eq!((state.attempts, state.not_found), (0, 0));
    }

    #[test]
    fn test_successful_read_resets_outage_count() {
        let policy = PollPolicy::default();
        let mut state = PollState::initial(&policy);
        for _ in 0..10 {
            state = next(state, Fetch::Unavailable("timeout".into()), &policy).0;
        }
        let (state, action) = next(state, processing(), &policy);
        assert!(matches!(action, Action::ScheduleRetry(_)));
        assert_eq!(state.unavailable, 0);

        let (state, action) = next(state, Fetch::Unavailable("timeout".into()), &policy);
        assert!(matches!(action, Action::ScheduleRetry(_)));
        assert_eq!(state.unavailable, 1);
    }

    #[test]
    fn test_success_with_unreadable_tip_settles_on_first_read() {
        let policy = PollPolicy::default();
        let fetch = decode(Some(
            r#"{"id":"abc","status":"success","feedback":{"overallScore":82,"ATS":{"score":70,"tips":[{"type":"neutral","tip":"ok"}]}}}"#
                .to_string(),
        ));
        let (state, action) = next(PollState::initial(&policy), fetch, &policy);

        assert_eq!(action, Action::Stop);
        let ReviewState::Success(feedback) = &state.view else {
            panic!("expected success, got {:?}", state.view);
        };
        assert_eq!(feedback.overall_score, 82.0);
        assert_eq!(feedback.ats.as_ref().map(|c| c.score), Some(70.0));
    }

    #[test]
    fn test_misses_do_not_consume_processing_attempts() {
        let policy = PollPolicy::default();
        let (state, _) = next(PollState::initial(&policy), Fetch::Missing, &policy);
        let (state, _) = next(state, processing(), &policy);
        assert_eq!((state.not_found, state.attempts), (1, 1));
    }

    #[test]
    fn test_success_on_third_fetch_after_two_backoffs() {
        let policy = PollPolicy::default();
        let state = PollState::initial(&policy);
        let (state, _) = next(state, processing(), &policy);
        let (state, _) = next(state, processing(), &policy);
        let (state, action) = next(state, succeeded(82.0), &policy);

        assert_eq!(action, Action::Stop);
        assert_eq!(state.view, ReviewState::Success(feedback(82.0)));
        assert_eq!(state.attempts, 2);
        assert_eq!(state.delay, Duration::from_millis(4500));
    }

    #[test]
    fn test_corrupted_record_stops_immediately() {
        let policy = PollPolicy::default();
        let (state, action) = next(
            PollState::initial(&policy),
            decode(Some("{not json".to_string())),
            &policy,
        );
        assert_eq!(action, Action::Stop);
        assert_eq!(state.view, ReviewState::Error(CORRUPTED_MESSAGE.to_string()));
        assert_eq!(state.attempts, 0);
    }

    #[test]
    fn test_error_record_adopts_message_or_default() {
        let policy = PollPolicy::default();
        let (state, action) = next(
            PollState::initial(&policy),
            failed(Some("PDF has no text")),
            &policy,
        );
        assert_eq!(action, Action::Stop);
        assert_eq!(state.view, ReviewState::Error("PDF has no text".to_string()));

        let (state, _) = next(PollState::initial(&policy), failed(None), &policy);
        assert_eq!(state.view.message(), Some(GENERIC_ERROR_MESSAGE));
    }

    #[test]
    fn test_error_status_wins_over_feedback() {
        let mut record = ResumeRecord::partial("abc".to_string(), &JobDetails::default());
        record.feedback = Some(feedback(50.0));
        record.status = ResumeStatus::Error;
        assert!(matches!(adopt(&record), ReviewState::Error(_)));
    }

    #[test]
    fn test_success_status_without_feedback_keeps_polling() {
        let mut record = ResumeRecord::partial("abc".to_string(), &JobDetails::default());
        record.status = ResumeStatus::Success;
        assert_eq!(adopt(&record), ReviewState::Processing);
    }

    #[test]
    fn test_terminal_state_is_absorbing() {
        let policy = PollPolicy::default();
        let (done, _) = next(PollState::initial(&policy), succeeded(90.0), &policy);
        let (after, action) = next(done.clone(), failed(Some("late")), &policy);
        assert_eq!(action, Action::Stop);
        assert_eq!(after, done);
        assert_eq!(refresh(&done, processing()), None);
    }

    #[test]
    fn test_refresh_leaves_counters_alone() {
        let policy = PollPolicy::default();
        let state = PollState::initial(&policy);
        assert_eq!(refresh(&state, Fetch::Missing), None);
        assert_eq!(refresh(&state, Fetch::Unavailable("down".into())), None);
        assert_eq!(refresh(&state, processing()), Some(ReviewState::Processing));
        assert_eq!(
            refresh(&state, decode(Some("{not json".to_string()))),
            Some(ReviewState::Error(CORRUPTED_MESSAGE.to_string()))
        );
        assert_eq!(
            refresh(&state, succeeded(70.0)),
            Some(ReviewState::Success(feedback(70.0)))
        );
    }
}
