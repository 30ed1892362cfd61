use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::question::QuestionRecord;
use crate::model::report::{AnswerDetail, TestReport};

/// Number of integrity warnings after which a session is force-submitted.
pub const MAX_WARNINGS: u32 = 3;

/// Coarse lifecycle stage of a test attempt.
///
/// `Configuring` is the stage with no live session (before start, after
/// restart); a `TestSession` value itself is only ever Running or Finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuring,
    Running,
    Finished,
}

/// Cause of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    TimerExpiry,
    WarningThreshold,
}

impl SubmitTrigger {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitTrigger::Manual => "manual",
            SubmitTrigger::TimerExpiry => "timer_expiry",
            SubmitTrigger::WarningThreshold => "warning_threshold",
        }
    }
}

impl fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown submit trigger: {0}")]
pub struct ParseTriggerError(String);

impl FromStr for SubmitTrigger {
    type Err = ParseTriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(SubmitTrigger::Manual),
            "timer_expiry" => Ok(SubmitTrigger::TimerExpiry),
            "warning_threshold" => Ok(SubmitTrigger::WarningThreshold),
            other => Err(ParseTriggerError(other.to_owned())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for the session")]
    Empty,

    #[error("session duration must be positive")]
    ZeroDuration,

    #[error("session is not running")]
    NotRunning,

    #[error("option index {index} out of range ({options} options)")]
    OptionOutOfRange { index: usize, options: usize },
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Session finished or already at zero; nothing was mutated.
    Ignored,
    /// Seconds still on the clock after the decrement.
    Remaining(u32),
    /// This tick brought the clock to zero; the caller must submit.
    Expired,
}

/// Result of one integrity-warning escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningOutcome {
    /// Session finished; nothing was mutated.
    Ignored,
    /// Below threshold; surface a dismissible warning.
    Warned { count: u32, remaining: u32 },
    /// Threshold reached; the caller must submit.
    ThresholdReached { count: u32 },
}

/// Score and timing fixed at the moment the session first finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub trigger: SubmitTrigger,
    pub score: u32,
    pub time_taken_seconds: u32,
    pub finished_at: DateTime<Utc>,
}

/// One timed test attempt: question set, answer map, cursor, countdown and
/// warning counters, and the single idempotent terminal transition.
///
/// The session is mutated only through `&mut` methods, so trigger sources
/// (tick, integrity signals, user intents) cannot interleave mid-operation;
/// `submit` checks and flips the terminal state in one step.
pub struct TestSession {
    questions: Vec<QuestionRecord>,
    answers: BTreeMap<usize, usize>,
    current_index: usize,
    duration_seconds: u32,
    remaining_seconds: u32,
    warning_count: u32,
    started_at: DateTime<Utc>,
    outcome: Option<TestOutcome>,
}

impl TestSession {
    /// Start a session over an already-drawn, non-empty question set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for an empty question set and
    /// `SessionError::ZeroDuration` for a zero duration.
    pub fn start(
        questions: Vec<QuestionRecord>,
        duration_seconds: u32,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        if duration_seconds == 0 {
            return Err(SessionError::ZeroDuration);
        }

        Ok(Self {
            questions,
            answers: BTreeMap::new(),
            current_index: 0,
            duration_seconds,
            remaining_seconds: duration_seconds,
            warning_count: 0,
            started_at,
            outcome: None,
        })
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.outcome.is_some() {
            Phase::Finished
        } else {
            Phase::Running
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_question(&self) -> &QuestionRecord {
        &self.questions[self.current_index]
    }

    /// Selected option for the given question index, if any.
    #[must_use]
    pub fn answer_for(&self, index: usize) -> Option<usize> {
        self.answers.get(&index).copied()
    }

    /// Selected option for the question under the cursor, if any.
    #[must_use]
    pub fn current_answer(&self) -> Option<usize> {
        self.answer_for(self.current_index)
    }

    /// Number of questions with a recorded answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&TestOutcome> {
        self.outcome.as_ref()
    }

    /// Record an answer for the question under the cursor. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` after the session finished and
    /// `SessionError::OptionOutOfRange` for an invalid option index; the
    /// answer map is untouched in both cases.
    pub fn select_answer(&mut self, option_index: usize) -> Result<(), SessionError> {
        if self.is_finished() {
            return Err(SessionError::NotRunning);
        }
        let options = self.current_question().option_count();
        if option_index >= options {
            return Err(SessionError::OptionOutOfRange {
                index: option_index,
                options,
            });
        }
        self.answers.insert(self.current_index, option_index);
        Ok(())
    }

    /// Move the cursor forward by one.
    ///
    /// Gated: a no-op (returning false) unless the current question has an
    /// answer and the cursor is not on the last question.
    pub fn advance(&mut self) -> bool {
        if self.is_finished()
            || !self.answers.contains_key(&self.current_index)
            || self.current_index + 1 >= self.questions.len()
        {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Move the cursor back by one, clamped at the first question. Ungated.
    pub fn retreat(&mut self) -> bool {
        if self.is_finished() || self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// Apply one countdown second.
    ///
    /// Only mutates while running with time on the clock; the tick that
    /// reaches zero reports `Expired` so the caller can submit.
    pub fn tick(&mut self) -> TickOutcome {
        if self.is_finished() || self.remaining_seconds == 0 {
            return TickOutcome::Ignored;
        }
        self.remaining_seconds -= 1;
        if self.remaining_seconds == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Remaining(self.remaining_seconds)
        }
    }

    /// Escalate the integrity-warning counter by one, saturating at
    /// `MAX_WARNINGS`.
    ///
    /// Each signal counts separately even when two arrive for one physical
    /// tab switch (at-least-once escalation).
    pub fn record_warning(&mut self) -> WarningOutcome {
        if self.is_finished() {
            return WarningOutcome::Ignored;
        }
        self.warning_count = (self.warning_count + 1).min(MAX_WARNINGS);
        let count = self.warning_count;
        if count >= MAX_WARNINGS {
            WarningOutcome::ThresholdReached { count }
        } else {
            WarningOutcome::Warned {
                count,
                remaining: MAX_WARNINGS - count,
            }
        }
    }

    /// Terminal transition: fix score and time taken, mark Finished.
    ///
    /// The first call while running wins; any later call (from any trigger,
    /// including a race between triggers) returns `None` and mutates
    /// nothing, guaranteeing at-most-once reporting.
    pub fn submit(&mut self, trigger: SubmitTrigger, at: DateTime<Utc>) -> Option<&TestOutcome> {
        if self.outcome.is_some() {
            return None;
        }
        let score = self.correct_count();
        let time_taken_seconds = self.duration_seconds - self.remaining_seconds;
        self.outcome = Some(TestOutcome {
            trigger,
            score,
            time_taken_seconds,
            finished_at: at,
        });
        self.outcome.as_ref()
    }

    /// Full score report for a finished session; `None` while running.
    #[must_use]
    pub fn report(&self) -> Option<TestReport> {
        let outcome = self.outcome.as_ref()?;
        let answers = self
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let user_answer = self.answers.get(&i).copied();
                AnswerDetail {
                    question_id: q.id(),
                    question: q.text().to_owned(),
                    user_answer,
                    correct_answer: q.correct_index(),
                    is_correct: user_answer == Some(q.correct_index()),
                }
            })
            .collect();

        Some(TestReport::new(
            outcome.score,
            u32::try_from(self.questions.len()).unwrap_or(u32::MAX),
            outcome.time_taken_seconds,
            outcome.trigger,
            answers,
        ))
    }

    fn correct_count(&self) -> u32 {
        let correct = self
            .questions
            .iter()
            .enumerate()
            .filter(|(i, q)| self.answers.get(i).copied() == Some(q.correct_index()))
            .count();
        u32::try_from(correct).unwrap_or(u32::MAX)
    }
}

impl fmt::Debug for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSession")
            .field("questions_len", &self.questions.len())
            .field("answered", &self.answers.len())
            .field("current_index", &self.current_index)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("warning_count", &self.warning_count)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionId;
    use crate::time::fixed_now;

    fn build_question(id: u64, correct: usize) -> QuestionRecord {
        QuestionRecord::new(
            QuestionId::new(id),
            "Quantitative",
            "Ratios",
            format!("Question {id}?"),
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct,
            "",
        )
        .unwrap()
    }

    fn start_session(n: u64, duration: u32) -> TestSession {
        let questions = (1..=n).map(|id| build_question(id, 1)).collect();
        TestSession::start(questions, duration, fixed_now()).unwrap()
    }

    #[test]
    fn start_rejects_empty_and_zero_duration() {
        assert_eq!(
            TestSession::start(Vec::new(), 60, fixed_now()).unwrap_err(),
            SessionError::Empty
        );
        let questions = vec![build_question(1, 0), build_question(2, 0)];
        assert_eq!(
            TestSession::start(questions, 0, fixed_now()).unwrap_err(),
            SessionError::ZeroDuration
        );
    }

    #[test]
    fn score_counts_only_matching_answers() {
        let mut session = start_session(4, 60);
        session.select_answer(1).unwrap(); // correct
        session.advance();
        session.select_answer(0).unwrap(); // wrong
        session.advance();
        session.select_answer(1).unwrap(); // correct
        // question 4 left unanswered

        let outcome = session.submit(SubmitTrigger::Manual, fixed_now()).unwrap();
        assert_eq!(outcome.score, 2);

        let report = session.report().unwrap();
        assert_eq!(report.score(), 2);
        assert_eq!(report.total_questions(), 4);
        let details = report.answers();
        assert!(details[0].is_correct);
        assert!(!details[1].is_correct);
        assert_eq!(details[3].user_answer, None);
        assert!(!details[3].is_correct);
    }

    #[test]
    fn unanswered_never_counts_as_correct() {
        let mut session = start_session(3, 60);
        let outcome = session.submit(SubmitTrigger::Manual, fixed_now()).unwrap();
        assert_eq!(outcome.score, 0);
    }

    #[test]
    fn select_answer_overwrites_last_write_wins() {
        let mut session = start_session(2, 60);
        session.select_answer(0).unwrap();
        session.select_answer(3).unwrap();
        assert_eq!(session.current_answer(), Some(3));
    }

    #[test]
    fn select_answer_rejects_out_of_range_without_mutation() {
        let mut session = start_session(2, 60);
        let err = session.select_answer(4).unwrap_err();
        assert_eq!(
            err,
            SessionError::OptionOutOfRange {
                index: 4,
                options: 4
            }
        );
        assert_eq!(session.current_answer(), None);
        assert_eq!(session.answered_count(), 0);
    }

    #[test]
    fn advance_gated_on_current_answer() {
        let mut session = start_session(3, 60);
        assert!(!session.advance());
        assert_eq!(session.current_index(), 0);

        session.select_answer(2).unwrap();
        assert!(session.advance());
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn cursor_clamps_at_both_ends() {
        let mut session = start_session(2, 60);
        assert!(!session.retreat());

        session.select_answer(0).unwrap();
        assert!(session.advance());
        session.select_answer(0).unwrap();
        // already on the last question
        assert!(!session.advance());
        assert_eq!(session.current_index(), 1);

        assert!(session.retreat());
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn timer_exhaustion_reaches_zero_and_expires_once() {
        let mut session = start_session(2, 5);
        for expected in (1..=4).rev() {
            assert_eq!(session.tick(), TickOutcome::Remaining(expected));
        }
        assert_eq!(session.tick(), TickOutcome::Expired);
        assert_eq!(session.remaining_seconds(), 0);

        // a stray tick after expiry mutates nothing
        assert_eq!(session.tick(), TickOutcome::Ignored);
        assert_eq!(session.remaining_seconds(), 0);
    }

    #[test]
    fn time_taken_reflects_elapsed_seconds() {
        let mut session = start_session(2, 60);
        for _ in 0..13 {
            session.tick();
        }
        let outcome = session.submit(SubmitTrigger::Manual, fixed_now()).unwrap();
        assert_eq!(outcome.time_taken_seconds, 13);
    }

    #[test]
    fn warning_escalation_reaches_threshold_on_third_signal() {
        let mut session = start_session(2, 60);
        assert_eq!(
            session.record_warning(),
            WarningOutcome::Warned {
                count: 1,
                remaining: 2
            }
        );
        assert_eq!(
            session.record_warning(),
            WarningOutcome::Warned {
                count: 2,
                remaining: 1
            }
        );
        assert_eq!(session.phase(), Phase::Running);
        assert_eq!(
            session.record_warning(),
            WarningOutcome::ThresholdReached { count: 3 }
        );
        assert_eq!(session.warning_count(), 3);
    }

    #[test]
    fn warning_count_saturates_at_max() {
        let mut session = start_session(2, 60);
        for _ in 0..5 {
            session.record_warning();
        }
        assert_eq!(session.warning_count(), MAX_WARNINGS);
    }

    #[test]
    fn submit_is_idempotent_across_triggers() {
        let mut session = start_session(2, 60);
        session.select_answer(1).unwrap();
        session.tick();

        let first = session
            .submit(SubmitTrigger::TimerExpiry, fixed_now())
            .unwrap()
            .clone();
        assert_eq!(session.phase(), Phase::Finished);

        assert!(session.submit(SubmitTrigger::Manual, fixed_now()).is_none());
        assert!(
            session
                .submit(SubmitTrigger::WarningThreshold, fixed_now())
                .is_none()
        );

        let still = session.outcome().unwrap();
        assert_eq!(still.trigger, first.trigger);
        assert_eq!(still.score, first.score);
        assert_eq!(still.time_taken_seconds, first.time_taken_seconds);
    }

    #[test]
    fn finished_session_is_frozen() {
        let mut session = start_session(2, 60);
        session.select_answer(1).unwrap();
        session.submit(SubmitTrigger::Manual, fixed_now());

        assert_eq!(
            session.select_answer(0).unwrap_err(),
            SessionError::NotRunning
        );
        assert!(!session.advance());
        assert!(!session.retreat());
        assert_eq!(session.tick(), TickOutcome::Ignored);
        assert_eq!(session.record_warning(), WarningOutcome::Ignored);
        assert_eq!(session.current_answer(), Some(1));
        assert_eq!(session.remaining_seconds(), 60);
        assert_eq!(session.warning_count(), 0);
    }

    #[test]
    fn trigger_string_round_trips() {
        for trigger in [
            SubmitTrigger::Manual,
            SubmitTrigger::TimerExpiry,
            SubmitTrigger::WarningThreshold,
        ] {
            let parsed: SubmitTrigger = trigger.as_str().parse().unwrap();
            assert_eq!(parsed, trigger);
        }
        assert!("nope".parse::<SubmitTrigger>().is_err());
    }
}
