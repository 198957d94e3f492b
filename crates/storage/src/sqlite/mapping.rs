use academy_core::model::{AttemptOutcome, CheckpointId, CheckpointResult, LearnerId};
use sqlx::Row;

use crate::repository::{AttemptLogRecord, AttemptLogRow, ProgressRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn learner_id_from_str(raw: &str) -> Result<LearnerId, StorageError> {
    raw.parse::<LearnerId>().map_err(ser)
}

pub(crate) fn checkpoint_id_from_str(raw: String) -> Result<CheckpointId, StorageError> {
    CheckpointId::new(raw).map_err(ser)
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Booleans are stored as 0/1 integers.
pub(crate) fn bool_from_i64(field: &'static str, v: i64) -> Result<bool, StorageError> {
    match v {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field}: {other}"
        ))),
    }
}

pub(crate) fn bool_to_i64(v: bool) -> i64 {
    i64::from(v)
}

pub(crate) fn parse_outcome(s: &str) -> Result<AttemptOutcome, StorageError> {
    s.parse::<AttemptOutcome>().map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CheckpointResult, StorageError> {
    let learner: String = row.try_get("learner_id").map_err(ser)?;
    let outcome: String = row.try_get("outcome").map_err(ser)?;

    let record = ProgressRecord {
        learner_id: learner_id_from_str(&learner)?,
        checkpoint_id: checkpoint_id_from_str(row.try_get("checkpoint_id").map_err(ser)?)?,
        correct_count: u32_from_i64(
            "correct_count",
            row.try_get::<i64, _>("correct_count").map_err(ser)?,
        )?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        passed: bool_from_i64("passed", row.try_get::<i64, _>("passed").map_err(ser)?)?,
        outcome: parse_outcome(&outcome)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        last_attempt_at: row.try_get("last_attempt_at").map_err(ser)?,
    };

    record.into_result().map_err(ser)
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<AttemptLogRow, StorageError> {
    let learner: String = row.try_get("learner_id").map_err(ser)?;
    let outcome: String = row.try_get("outcome").map_err(ser)?;

    Ok(AttemptLogRow {
        id: row.try_get("id").map_err(ser)?,
        record: AttemptLogRecord {
            learner_id: learner_id_from_str(&learner)?,
            checkpoint_id: checkpoint_id_from_str(row.try_get("checkpoint_id").map_err(ser)?)?,
            correct_count: u32_from_i64(
                "correct_count",
                row.try_get::<i64, _>("correct_count").map_err(ser)?,
            )?,
            total_questions: u32_from_i64(
                "total_questions",
                row.try_get::<i64, _>("total_questions").map_err(ser)?,
            )?,
            passed: bool_from_i64("passed", row.try_get::<i64, _>("passed").map_err(ser)?)?,
            outcome: parse_outcome(&outcome)?,
            started_at: row.try_get("started_at").map_err(ser)?,
            finished_at: row.try_get("finished_at").map_err(ser)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_only_accept_zero_or_one() {
        assert!(!bool_from_i64("passed", 0).unwrap());
        assert!(bool_from_i64("passed", 1).unwrap());
        assert!(bool_from_i64("passed", 2).is_err());
    }

    #[test]
    fn bad_ids_surface_as_serialization_errors() {
        assert!(matches!(
            learner_id_from_str("not-a-uuid"),
            Err(StorageError::Serialization(_))
        ));
        assert!(matches!(
            checkpoint_id_from_str("Bad Id".into()),
            Err(StorageError::Serialization(_))
        ));
    }
}
