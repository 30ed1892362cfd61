use std::str::FromStr;

use aptitude_core::model::{SubmitTrigger, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{StorageError, TestSessionRow};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

pub(crate) fn parse_trigger(s: &str) -> Result<SubmitTrigger, StorageError> {
    SubmitTrigger::from_str(s)
        .map_err(|_| StorageError::Serialization(format!("invalid finish trigger: {s}")))
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<TestSessionRow, StorageError> {
    let trigger_str: String = row.try_get("finish_trigger").map_err(ser)?;
    Ok(TestSessionRow {
        id: row.try_get("id").map_err(ser)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        score: i64_to_u32("score", row.try_get("score").map_err(ser)?)?,
        total_questions: i64_to_u32(
            "total_questions",
            row.try_get("total_questions").map_err(ser)?,
        )?,
        percentage: row.try_get("percentage").map_err(ser)?,
        time_taken_seconds: i64_to_u32(
            "time_taken_seconds",
            row.try_get("time_taken_seconds").map_err(ser)?,
        )?,
        correct_answers: i64_to_u32(
            "correct_answers",
            row.try_get("correct_answers").map_err(ser)?,
        )?,
        wrong_answers: i64_to_u32("wrong_answers", row.try_get("wrong_answers").map_err(ser)?)?,
        trigger: parse_trigger(trigger_str.as_str())?,
        test_date: row.try_get("test_date").map_err(ser)?,
    })
}
