use aptitude_core::model::{Phase, QuestionId, QuestionRecord, TestSession};

/// Presentation-agnostic snapshot of the current question.
///
/// Carries no correct answer or explanation; those surface only through
/// the end-of-test report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub category: String,
    pub topic: String,
    pub text: String,
    pub options: Vec<String>,
}

impl QuestionView {
    #[must_use]
    pub fn from_record(record: &QuestionRecord) -> Self {
        Self {
            id: record.id(),
            category: record.category().to_string(),
            topic: record.topic().to_string(),
            text: record.text().to_string(),
            options: record.options().to_vec(),
        }
    }
}

/// Observable state of the test flow for a presentation layer.
///
/// Not a UI view-model: no pre-formatted strings, no localization
/// assumptions. A front end formats `remaining_seconds` as mm:ss itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestView {
    pub phase: Phase,
    pub question: Option<QuestionView>,
    pub current_index: usize,
    pub total_questions: usize,
    pub selected_answer: Option<usize>,
    pub answered_count: usize,
    pub duration_seconds: u32,
    pub remaining_seconds: u32,
    pub warning_count: u32,
}

impl TestView {
    #[must_use]
    pub fn configuring() -> Self {
        Self {
            phase: Phase::Configuring,
            question: None,
            current_index: 0,
            total_questions: 0,
            selected_answer: None,
            answered_count: 0,
            duration_seconds: 0,
            remaining_seconds: 0,
            warning_count: 0,
        }
    }

    #[must_use]
    pub fn from_session(session: &TestSession) -> Self {
        Self {
            phase: session.phase(),
            question: Some(QuestionView::from_record(session.current_question())),
            current_index: session.current_index(),
            total_questions: session.total_questions(),
            selected_answer: session.current_answer(),
            answered_count: session.answered_count(),
            duration_seconds: session.duration_seconds(),
            remaining_seconds: session.remaining_seconds(),
            warning_count: session.warning_count(),
        }
    }
}
