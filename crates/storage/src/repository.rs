use academy_core::model::{
    AttemptOutcome, CheckpointId, CheckpointResult, LearnerId, ResultError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of a ledger entry.
///
/// Mirrors `CheckpointResult` with plain fields so adapters can bind/read columns
/// without reaching into the domain type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub learner_id: LearnerId,
    pub checkpoint_id: CheckpointId,
    pub correct_count: u32,
    pub total_questions: u32,
    pub passed: bool,
    pub outcome: AttemptOutcome,
    pub completed_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
}

impl ProgressRecord {
    #[must_use]
    pub fn from_result(result: &CheckpointResult) -> Self {
        Self {
            learner_id: result.learner_id(),
            checkpoint_id: result.checkpoint_id().clone(),
            correct_count: result.correct_count(),
            total_questions: result.total_questions(),
            passed: result.passed(),
            outcome: result.outcome(),
            completed_at: result.completed_at(),
            last_attempt_at: result.last_attempt_at(),
        }
    }

    /// Convert the record back into a domain `CheckpointResult`.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` if the stored counts or timestamps are inconsistent.
    pub fn into_result(self) -> Result<CheckpointResult, ResultError> {
        CheckpointResult::from_persisted(
            self.learner_id,
            self.checkpoint_id,
            self.correct_count,
            self.total_questions,
            self.passed,
            self.outcome,
            self.completed_at,
            self.last_attempt_at,
        )
    }
}

/// One finished attempt, appended regardless of how the ledger entry was merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptLogRecord {
    pub learner_id: LearnerId,
    pub checkpoint_id: CheckpointId,
    pub correct_count: u32,
    pub total_questions: u32,
    pub passed: bool,
    pub outcome: AttemptOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AttemptLogRecord {
    /// Log entry for `result`, which must be the raw result of the attempt (not a merged one).
    #[must_use]
    pub fn from_attempt(result: &CheckpointResult, started_at: DateTime<Utc>) -> Self {
        Self {
            learner_id: result.learner_id(),
            checkpoint_id: result.checkpoint_id().clone(),
            correct_count: result.correct_count(),
            total_questions: result.total_questions(),
            passed: result.passed(),
            outcome: result.outcome(),
            started_at,
            finished_at: result.completed_at(),
        }
    }
}

/// Attempt log entry together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptLogRow {
    pub id: i64,
    pub record: AttemptLogRecord,
}

/// Ledger persistence: one current result per learner and checkpoint.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the current result, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_result(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Option<CheckpointResult>, StorageError>;

    /// Insert or replace the result keyed by `(learner_id, checkpoint_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn put_result(&self, result: &CheckpointResult) -> Result<(), StorageError>;

    /// All current results of a learner, ordered by checkpoint id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_results(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<CheckpointResult>, StorageError>;
}

#[async_trait]
pub trait AttemptLogRepository: Send + Sync {
    /// Append a finished attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn append_attempt(&self, record: &AttemptLogRecord) -> Result<i64, StorageError>;

    /// Attempts of a learner on one checkpoint, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn attempts_for(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Vec<AttemptLogRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    results: Arc<Mutex<HashMap<(LearnerId, CheckpointId), CheckpointResult>>>,
    attempts: Arc<Mutex<Vec<AttemptLogRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_result(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Option<CheckpointResult>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(learner_id, checkpoint_id.clone())).cloned())
    }

    async fn put_result(&self, result: &CheckpointResult) -> Result<(), StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            (result.learner_id(), result.checkpoint_id().clone()),
            result.clone(),
        );
        Ok(())
    }

    async fn list_results(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<CheckpointResult>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<CheckpointResult> = guard
            .iter()
            .filter(|((learner, _), _)| *learner == learner_id)
            .map(|(_, result)| result.clone())
            .collect();
        found.sort_by(|a, b| a.checkpoint_id().cmp(b.checkpoint_id()));
        Ok(found)
    }
}

#[async_trait]
impl AttemptLogRepository for InMemoryRepository {
    async fn append_attempt(&self, record: &AttemptLogRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = i64::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("attempt id overflow".into()))?;
        guard.push(AttemptLogRow {
            id,
            record: record.clone(),
        });
        Ok(id)
    }

    async fn attempts_for(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Vec<AttemptLogRow>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|row| {
                row.record.learner_id == learner_id && row.record.checkpoint_id == *checkpoint_id
            })
            .cloned()
            .collect())
    }
}

/// Aggregates the ledger repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub attempts: Arc<dyn AttemptLogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptLogRepository> = Arc::new(repo);
        Self { progress, attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::model::{PassThreshold, Score};
    use academy_core::time::fixed_now;
    use chrono::Duration;
    use uuid::Uuid;

    fn learner(n: u128) -> LearnerId {
        LearnerId::new(Uuid::from_u128(n))
    }

    fn result(learner_id: LearnerId, checkpoint: &str, correct: u32) -> CheckpointResult {
        CheckpointResult::grade(
            learner_id,
            CheckpointId::new(checkpoint).unwrap(),
            Score::new(correct, 12).unwrap(),
            PassThreshold::default(),
            AttemptOutcome::Submitted,
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn put_result_upserts_by_learner_and_checkpoint() {
        let repo = InMemoryRepository::new();
        let alice = learner(1);
        let id = CheckpointId::new("theoretical-pc1").unwrap();

        repo.put_result(&result(alice, "theoretical-pc1", 4)).await.unwrap();
        repo.put_result(&result(alice, "theoretical-pc1", 10)).await.unwrap();

        let stored = repo.get_result(alice, &id).await.unwrap().unwrap();
        assert_eq!(stored.correct_count(), 10);
        assert!(repo.get_result(learner(2), &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_results_is_partitioned_by_learner() {
        let repo = InMemoryRepository::new();
        repo.put_result(&result(learner(1), "practical-pc2", 9)).await.unwrap();
        repo.put_result(&result(learner(1), "theoretical-pc1", 9)).await.unwrap();
        repo.put_result(&result(learner(2), "theoretical-pc1", 1)).await.unwrap();

        let listed = repo.list_results(learner(1)).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|r| r.checkpoint_id().as_str()).collect();
        assert_eq!(ids, vec!["practical-pc2", "theoretical-pc1"]);
    }

    #[tokio::test]
    async fn attempt_log_appends_in_order() {
        let repo = InMemoryRepository::new();
        let alice = learner(1);
        let first = result(alice, "theoretical-pc1", 3);
        let second = result(alice, "theoretical-pc1", 11);
        let started = fixed_now() - Duration::minutes(15);

        let a = repo
            .append_attempt(&AttemptLogRecord::from_attempt(&first, started))
            .await
            .unwrap();
        let b = repo
            .append_attempt(&AttemptLogRecord::from_attempt(&second, started))
            .await
            .unwrap();
        assert!(b > a);

        let rows = repo
            .attempts_for(alice, first.checkpoint_id())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].record.correct_count, 11);
        assert_eq!(rows[0].record.started_at, started);
    }

    #[test]
    fn record_round_trips_into_result() {
        let original = result(learner(3), "practical-pc4", 8);
        let restored = ProgressRecord::from_result(&original).into_result().unwrap();
        assert_eq!(restored, original);
    }
}
