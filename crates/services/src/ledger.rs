use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use academy_core::Clock;
use academy_core::model::{
    CheckpointId, CheckpointResult, Curriculum, LearnerId, ModuleId, ModuleUnlockState,
};
use academy_core::policy::{Eligibility, LedgerPolicy};
use storage::repository::{
    AttemptLogRecord, AttemptLogRepository, AttemptLogRow, ProgressRepository, Storage,
};

use crate::error::LedgerError;
use crate::overview::ProgressOverview;

/// Durable pass/fail record of each learner, gatekeeper for re-attempts and module access.
#[derive(Clone)]
pub struct ProgressLedger {
    clock: Clock,
    policy: LedgerPolicy,
    curriculum: Arc<Curriculum>,
    progress: Arc<dyn ProgressRepository>,
    attempts: Arc<dyn AttemptLogRepository>,
}

impl ProgressLedger {
    #[must_use]
    pub fn new(
        clock: Clock,
        policy: LedgerPolicy,
        curriculum: Arc<Curriculum>,
        progress: Arc<dyn ProgressRepository>,
        attempts: Arc<dyn AttemptLogRepository>,
    ) -> Self {
        Self {
            clock,
            policy,
            curriculum,
            progress,
            attempts,
        }
    }

    /// Ledger over both repositories of a `Storage` aggregate.
    #[must_use]
    pub fn from_storage(
        clock: Clock,
        policy: LedgerPolicy,
        curriculum: Arc<Curriculum>,
        storage: &Storage,
    ) -> Self {
        Self::new(
            clock,
            policy,
            curriculum,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.attempts),
        )
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    #[must_use]
    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    /// Fold a finished attempt into the learner's current result and log the attempt.
    ///
    /// The stored entry is merged according to the retake policy; the attempt log always
    /// receives the raw result. Returns the entry now stored for the checkpoint.
    ///
    /// Calling this again with the same result after a failure is safe: the merge is
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Persistence` if the store cannot be read or written. The
    /// result may then be missing from the ledger.
    pub async fn record_result(
        &self,
        result: &CheckpointResult,
        started_at: DateTime<Utc>,
    ) -> Result<CheckpointResult, LedgerError> {
        let learner_id = result.learner_id();
        let checkpoint_id = result.checkpoint_id();

        let previous = self.progress.get_result(learner_id, checkpoint_id).await?;
        let stored = self.policy.retake.merge(previous.as_ref(), result.clone());
        self.progress.put_result(&stored).await?;
        self.attempts
            .append_attempt(&AttemptLogRecord::from_attempt(result, started_at))
            .await?;

        info!(
            learner = %learner_id,
            checkpoint = %checkpoint_id,
            score = %result.score(),
            passed = result.passed(),
            outcome = %result.outcome(),
            stored_passed = stored.passed(),
            "checkpoint result recorded"
        );
        Ok(stored)
    }

    /// Whether the learner may start the checkpoint now, and how long to wait otherwise.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Persistence` if the stored result cannot be read.
    pub async fn can_attempt(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Eligibility, LedgerError> {
        let previous = self.progress.get_result(learner_id, checkpoint_id).await?;
        let eligibility = self.policy.eligibility(previous.as_ref(), self.clock.now());
        debug!(learner = %learner_id, checkpoint = %checkpoint_id, ?eligibility, "eligibility checked");
        Ok(eligibility)
    }

    /// # Errors
    ///
    /// Returns `LedgerError::Curriculum` for modules outside the curriculum and
    /// `LedgerError::Persistence` if results cannot be read.
    pub async fn is_module_unlocked(
        &self,
        learner_id: LearnerId,
        module: ModuleId,
    ) -> Result<bool, LedgerError> {
        let passed = self.passed_checkpoints(learner_id).await?;
        Ok(self
            .curriculum
            .is_module_unlocked(module, |id| passed.contains(id))?)
    }

    /// Unlock state of every module in curriculum order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Persistence` if results cannot be read.
    pub async fn module_states(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<ModuleUnlockState>, LedgerError> {
        let passed = self.passed_checkpoints(learner_id).await?;
        Ok(self.curriculum.unlock_states(|id| passed.contains(id)))
    }

    /// # Errors
    ///
    /// Returns `LedgerError::Persistence` if the result cannot be read.
    pub async fn result_for(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Option<CheckpointResult>, LedgerError> {
        Ok(self.progress.get_result(learner_id, checkpoint_id).await?)
    }

    /// # Errors
    ///
    /// Returns `LedgerError::Persistence` if results cannot be read.
    pub async fn results(&self, learner_id: LearnerId) -> Result<Vec<CheckpointResult>, LedgerError> {
        Ok(self.progress.list_results(learner_id).await?)
    }

    /// Every finished attempt of the learner on the checkpoint, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Persistence` if the log cannot be read.
    pub async fn history(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<Vec<AttemptLogRow>, LedgerError> {
        Ok(self.attempts.attempts_for(learner_id, checkpoint_id).await?)
    }

    /// Dashboard view: module access plus the standing on each checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Persistence` if results cannot be read.
    pub async fn overview(&self, learner_id: LearnerId) -> Result<ProgressOverview, LedgerError> {
        let results = self.progress.list_results(learner_id).await?;
        Ok(ProgressOverview::build(
            learner_id,
            &self.curriculum,
            &results,
            &self.policy,
            self.clock.now(),
        ))
    }

    async fn passed_checkpoints(
        &self,
        learner_id: LearnerId,
    ) -> Result<HashSet<CheckpointId>, LedgerError> {
        Ok(self
            .progress
            .list_results(learner_id)
            .await?
            .into_iter()
            .filter(CheckpointResult::passed)
            .map(|r| r.checkpoint_id().clone())
            .collect())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::model::{
        AttemptOutcome, CheckpointDraft, CurriculumDraft, ModuleDraft, PassThreshold,
        QuestionDraft, QuestionId, Score,
    };
    use academy_core::policy::RetakePolicy;
    use academy_core::time::fixed_now;
    use async_trait::async_trait;
    use chrono::Duration;
    use storage::repository::{InMemoryRepository, StorageError};
    use uuid::Uuid;

    fn learner() -> LearnerId {
        LearnerId::new(Uuid::from_u128(11))
    }

    fn id(raw: &str) -> CheckpointId {
        CheckpointId::new(raw).unwrap()
    }

    fn checkpoint(raw: &str, covers: &[u32]) -> CheckpointDraft {
        let questions = (1..=12)
            .map(|q| QuestionDraft {
                id: QuestionId::new(q),
                prompt: format!("Q{q}"),
                options: vec!["yes".into(), "no".into()],
                correct_index: 0,
            })
            .collect();
        CheckpointDraft::new(
            id(raw),
            questions,
            covers.iter().copied().map(ModuleId::new).collect(),
        )
    }

    fn curriculum() -> Arc<Curriculum> {
        let modules = (1..=4)
            .map(|m| ModuleDraft {
                id: ModuleId::new(m),
                title: format!("Module {m}"),
            })
            .collect();
        Arc::new(
            CurriculumDraft {
                modules,
                checkpoints: vec![
                    checkpoint("theoretical-pc1", &[1, 2]),
                    checkpoint("practical-pc2", &[3]),
                ],
            }
            .validate()
            .unwrap(),
        )
    }

    fn ledger(policy: LedgerPolicy) -> ProgressLedger {
        ProgressLedger::from_storage(
            Clock::fixed(fixed_now()),
            policy,
            curriculum(),
            &Storage::in_memory(),
        )
    }

    fn graded(checkpoint: &str, correct: u32, at: DateTime<Utc>) -> CheckpointResult {
        CheckpointResult::grade(
            learner(),
            id(checkpoint),
            Score::new(correct, 12).unwrap(),
            PassThreshold::default(),
            AttemptOutcome::Submitted,
            at,
        )
    }

    #[tokio::test]
    async fn first_attempt_is_always_allowed() {
        let ledger = ledger(LedgerPolicy::default());
        let gate = ledger
            .can_attempt(learner(), &id("theoretical-pc1"))
            .await
            .unwrap();
        assert_eq!(gate, Eligibility::Eligible);
    }

    #[tokio::test]
    async fn failed_attempt_starts_the_cooldown() {
        let cooldown = Duration::hours(12);
        let ledger = ledger(LedgerPolicy::default().with_cooldown(cooldown));
        let t = fixed_now();
        ledger
            .record_result(&graded("theoretical-pc1", 4, t), t - Duration::minutes(20))
            .await
            .unwrap();

        let cp = id("theoretical-pc1");
        let gate = ledger.can_attempt(learner(), &cp).await.unwrap();
        assert_eq!(gate.retry_after(), Some(cooldown));

        let just_before = ledger
            .clone()
            .with_clock(Clock::fixed(t + cooldown - Duration::seconds(1)));
        assert!(!just_before.can_attempt(learner(), &cp).await.unwrap().is_eligible());

        let at_boundary = ledger.clone().with_clock(Clock::fixed(t + cooldown));
        assert!(at_boundary.can_attempt(learner(), &cp).await.unwrap().is_eligible());
    }

    #[tokio::test]
    async fn best_score_policy_keeps_a_pass_but_refreshes_the_attempt_time() {
        let ledger = ledger(LedgerPolicy::default().with_retake(RetakePolicy::BestScoreWins));
        let t = fixed_now();
        ledger
            .record_result(&graded("theoretical-pc1", 10, t), t)
            .await
            .unwrap();
        let later = t + Duration::days(2);
        let stored = ledger
            .record_result(&graded("theoretical-pc1", 2, later), later)
            .await
            .unwrap();

        assert!(stored.passed());
        assert_eq!(stored.correct_count(), 10);
        assert_eq!(stored.last_attempt_at(), later);

        let history = ledger
            .history(learner(), &id("theoretical-pc1"))
            .await
            .unwrap();
        let scores: Vec<u32> = history.iter().map(|row| row.record.correct_count).collect();
        assert_eq!(scores, vec![10, 2]);
    }

    #[tokio::test]
    async fn latest_policy_can_downgrade() {
        let ledger = ledger(LedgerPolicy::default().with_retake(RetakePolicy::LatestAttemptWins));
        let t = fixed_now();
        ledger
            .record_result(&graded("theoretical-pc1", 12, t), t)
            .await
            .unwrap();
        ledger
            .record_result(&graded("theoretical-pc1", 1, t), t)
            .await
            .unwrap();
        let stored = ledger
            .result_for(learner(), &id("theoretical-pc1"))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.passed());
    }

    #[tokio::test]
    async fn modules_unlock_in_curriculum_order() {
        let ledger = ledger(LedgerPolicy::default());
        let me = learner();

        assert!(ledger.is_module_unlocked(me, ModuleId::new(1)).await.unwrap());
        assert!(!ledger.is_module_unlocked(me, ModuleId::new(2)).await.unwrap());

        ledger
            .record_result(&graded("theoretical-pc1", 9, fixed_now()), fixed_now())
            .await
            .unwrap();
        assert!(ledger.is_module_unlocked(me, ModuleId::new(2)).await.unwrap());
        assert!(ledger.is_module_unlocked(me, ModuleId::new(3)).await.unwrap());
        assert!(!ledger.is_module_unlocked(me, ModuleId::new(4)).await.unwrap());

        let states = ledger.module_states(me).await.unwrap();
        assert_eq!(states.len(), 4);
        assert_eq!(states[3].blocking, vec![id("practical-pc2")]);

        assert!(matches!(
            ledger.is_module_unlocked(me, ModuleId::new(9)).await,
            Err(LedgerError::Curriculum(_))
        ));
    }

    #[tokio::test]
    async fn passed_checkpoint_can_be_closed_to_retakes() {
        let ledger = ledger(LedgerPolicy::default().with_passed_retake(false));
        ledger
            .record_result(&graded("practical-pc2", 11, fixed_now()), fixed_now())
            .await
            .unwrap();
        let gate = ledger
            .can_attempt(learner(), &id("practical-pc2"))
            .await
            .unwrap();
        assert_eq!(gate, Eligibility::AlreadyPassed);
    }

    struct OfflineStore;

    #[async_trait]
    impl ProgressRepository for OfflineStore {
        async fn get_result(
            &self,
            _learner_id: LearnerId,
            _checkpoint_id: &CheckpointId,
        ) -> Result<Option<CheckpointResult>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn put_result(&self, _result: &CheckpointResult) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn list_results(
            &self,
            _learner_id: LearnerId,
        ) -> Result<Vec<CheckpointResult>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_persistence_errors() {
        let ledger = ProgressLedger::new(
            Clock::fixed(fixed_now()),
            LedgerPolicy::default(),
            curriculum(),
            Arc::new(OfflineStore),
            Arc::new(InMemoryRepository::new()),
        );
        let err = ledger
            .record_result(&graded("theoretical-pc1", 12, fixed_now()), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(StorageError::Connection(_))));

        let err = ledger
            .can_attempt(learner(), &id("theoretical-pc1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
    }
}
