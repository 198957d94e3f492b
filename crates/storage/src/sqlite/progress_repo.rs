use academy_core::model::{CheckpointId, CheckpointResult, LearnerId};

use super::{
    SqliteRepository,
    mapping::{bool_to_i64, map_progress_row},
};
use crate::repository::{ProgressRecord, ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_result(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Option<CheckpointResult>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    learner_id, checkpoint_id, correct_count, total_questions,
                    passed, outcome, completed_at, last_attempt_at
                FROM checkpoint_results
                WHERE learner_id = ?1 AND checkpoint_id = ?2
            ",
        )
        .bind(learner_id.to_string())
        .bind(checkpoint_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn put_result(&self, result: &CheckpointResult) -> Result<(), StorageError> {
        let record = ProgressRecord::from_result(result);

        sqlx::query(
            r"
                INSERT INTO checkpoint_results (
                    learner_id, checkpoint_id, correct_count, total_questions,
                    passed, outcome, completed_at, last_attempt_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(learner_id, checkpoint_id) DO UPDATE SET
                    correct_count = excluded.correct_count,
                    total_questions = excluded.total_questions,
                    passed = excluded.passed,
                    outcome = excluded.outcome,
                    completed_at = excluded.completed_at,
                    last_attempt_at = excluded.last_attempt_at
            ",
        )
        .bind(record.learner_id.to_string())
        .bind(record.checkpoint_id.as_str())
        .bind(i64::from(record.correct_count))
        .bind(i64::from(record.total_questions))
        .bind(bool_to_i64(record.passed))
        .bind(record.outcome.as_str())
        .bind(record.completed_at)
        .bind(record.last_attempt_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_results(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<CheckpointResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    learner_id, checkpoint_id, correct_count, total_questions,
                    passed, outcome, completed_at, last_attempt_at
                FROM checkpoint_results
                WHERE learner_id = ?1
                ORDER BY checkpoint_id ASC
            ",
        )
        .bind(learner_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }
}
