use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::session::SubmitTrigger;

/// Per-question outcome recorded with a finished test.
///
/// Serialized field names match the `answers` JSON column persisted with
/// each session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDetail {
    pub question_id: QuestionId,
    pub question: String,
    pub user_answer: Option<usize>,
    pub correct_answer: usize,
    pub is_correct: bool,
}

/// Score report fixed at the moment a session first finished.
///
/// The report is authoritative for the end-of-test view regardless of
/// whether persistence succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    score: u32,
    total_questions: u32,
    time_taken_seconds: u32,
    trigger: SubmitTrigger,
    answers: Vec<AnswerDetail>,
}

impl TestReport {
    #[must_use]
    pub fn new(
        score: u32,
        total_questions: u32,
        time_taken_seconds: u32,
        trigger: SubmitTrigger,
        answers: Vec<AnswerDetail>,
    ) -> Self {
        debug_assert!(score <= total_questions);
        debug_assert_eq!(answers.len(), total_questions as usize);
        Self {
            score,
            total_questions,
            time_taken_seconds,
            trigger,
            answers,
        }
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn time_taken_seconds(&self) -> u32 {
        self.time_taken_seconds
    }

    #[must_use]
    pub fn trigger(&self) -> SubmitTrigger {
        self.trigger
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerDetail] {
        &self.answers
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn wrong_answers(&self) -> u32 {
        self.total_questions - self.score
    }

    /// Score as a percentage, rounded to two decimals as stored with the
    /// session row.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_questions == 0 {
            return 0.0;
        }
        let raw = f64::from(self.score) / f64::from(self.total_questions) * 100.0;
        (raw * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(id: u64, user: Option<usize>, correct: usize) -> AnswerDetail {
        AnswerDetail {
            question_id: QuestionId::new(id),
            question: format!("Q{id}"),
            user_answer: user,
            correct_answer: correct,
            is_correct: user == Some(correct),
        }
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let answers = vec![detail(1, Some(0), 0), detail(2, None, 1), detail(3, Some(2), 1)];
        let report = TestReport::new(1, 3, 42, SubmitTrigger::Manual, answers);
        assert!((report.percentage() - 33.33).abs() < f64::EPSILON);
        assert_eq!(report.wrong_answers(), 2);
    }

    #[test]
    fn answer_detail_round_trips_as_json() {
        let original = detail(9, Some(1), 1);
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("\"questionId\":9"));
        assert!(json.contains("\"isCorrect\":true"));
        let back: AnswerDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
