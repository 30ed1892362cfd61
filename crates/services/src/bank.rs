//! Question bank loading from the JSON question file.

use std::path::Path;

use aptitude_core::model::{QuestionBank, QuestionRecord};

use crate::error::BankLoadError;

/// Parse a question bank from JSON text (an array of question objects).
///
/// # Errors
///
/// Returns `BankLoadError` on malformed JSON, invalid questions, an empty
/// array, or duplicate question ids.
pub fn parse_question_bank(json: &str) -> Result<QuestionBank, BankLoadError> {
    let records: Vec<QuestionRecord> = serde_json::from_str(json)?;
    Ok(QuestionBank::new(records)?)
}

/// Load a question bank from a JSON file on disk.
///
/// # Errors
///
/// Returns `BankLoadError` if the file cannot be read or parsed.
pub fn load_question_bank(path: &Path) -> Result<QuestionBank, BankLoadError> {
    let json = std::fs::read_to_string(path)?;
    parse_question_bank(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "id": 1,
            "category": "Quantitative",
            "topic": "Percentages",
            "question": "What is 20% of 150?",
            "options": ["25", "30", "35", "40"],
            "correctAnswer": 1,
            "explanation": "20% of 150 = 0.2 * 150 = 30"
        },
        {
            "id": 2,
            "category": "Logical",
            "topic": "Series",
            "question": "Next in 2, 4, 8, 16?",
            "options": ["18", "24", "32", "64"],
            "correctAnswer": 2
        }
    ]"#;

    #[test]
    fn parses_the_question_file_shape() {
        let bank = parse_question_bank(SAMPLE).expect("parse");
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.records()[0].correct_index(), 1);
        assert_eq!(bank.records()[1].explanation(), "");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            parse_question_bank("not json"),
            Err(BankLoadError::Parse(_))
        ));
    }

    #[test]
    fn rejects_empty_bank() {
        assert!(matches!(
            parse_question_bank("[]"),
            Err(BankLoadError::Bank(_))
        ));
    }
}
