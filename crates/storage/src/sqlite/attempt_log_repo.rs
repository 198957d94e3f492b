use academy_core::model::{CheckpointId, LearnerId};

use super::{
    SqliteRepository,
    mapping::{bool_to_i64, map_attempt_row},
};
use crate::repository::{AttemptLogRecord, AttemptLogRepository, AttemptLogRow, StorageError};

#[async_trait::async_trait]
impl AttemptLogRepository for SqliteRepository {
    async fn append_attempt(&self, record: &AttemptLogRecord) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO attempt_logs (
                    learner_id, checkpoint_id, correct_count, total_questions,
                    passed, outcome, started_at, finished_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(record.learner_id.to_string())
        .bind(record.checkpoint_id.as_str())
        .bind(i64::from(record.correct_count))
        .bind(i64::from(record.total_questions))
        .bind(bool_to_i64(record.passed))
        .bind(record.outcome.as_str())
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn attempts_for(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Vec<AttemptLogRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, learner_id, checkpoint_id, correct_count, total_questions,
                    passed, outcome, started_at, finished_at
                FROM attempt_logs
                WHERE learner_id = ?1 AND checkpoint_id = ?2
                ORDER BY finished_at ASC, id ASC
            ",
        )
        .bind(learner_id.to_string())
        .bind(checkpoint_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }
}
