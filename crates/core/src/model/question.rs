use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text must not be empty")]
    EmptyText,

    #[error("a question needs at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("option {index} must not be empty")]
    EmptyOption { index: usize },

    #[error("correct option index {index} out of range for {options} options")]
    CorrectIndexOutOfRange { index: usize, options: usize },
}

/// Raw deserialized shape of a bank entry, field names matching the
/// question JSON file (`question`, `correctAnswer`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: u64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub topic: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
}

/// A single multiple-choice question. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft", rename_all = "camelCase")]
pub struct QuestionRecord {
    id: QuestionId,
    category: String,
    topic: String,
    #[serde(rename = "question")]
    text: String,
    options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    correct_index: usize,
    explanation: String,
}

impl QuestionRecord {
    /// Build a validated question record.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is empty, fewer than two options
    /// are given, any option is blank, or the correct index is out of range.
    pub fn new(
        id: QuestionId,
        category: impl Into<String>,
        topic: impl Into<String>,
        text: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions(options.len()));
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { index });
        }
        if correct_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: correct_index,
                options: options.len(),
            });
        }

        Ok(Self {
            id,
            category: category.into(),
            topic: topic.into(),
            text,
            options,
            correct_index,
            explanation: explanation.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Number of selectable options.
    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }
}

impl TryFrom<QuestionDraft> for QuestionRecord {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        Self::new(
            QuestionId::new(draft.id),
            draft.category,
            draft.topic,
            draft.question,
            draft.options,
            draft.correct_answer,
            draft.explanation,
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionBankError {
    #[error("question bank must not be empty")]
    Empty,

    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),
}

/// Static ordered collection of questions; read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    records: Vec<QuestionRecord>,
}

impl QuestionBank {
    /// Build a bank from an ordered list of records.
    ///
    /// # Errors
    ///
    /// Returns `QuestionBankError::Empty` for an empty list and
    /// `QuestionBankError::DuplicateId` when two records share an id.
    pub fn new(records: Vec<QuestionRecord>) -> Result<Self, QuestionBankError> {
        if records.is_empty() {
            return Err(QuestionBankError::Empty);
        }
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.id()) {
                return Err(QuestionBankError::DuplicateId(record.id()));
            }
        }
        Ok(Self { records })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false for a constructed bank; kept for slice-like ergonomics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[QuestionRecord] {
        &self.records
    }
}
