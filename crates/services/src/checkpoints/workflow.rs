use academy_core::Clock;
use academy_core::model::{CheckpointId, CheckpointResult, LearnerId};
use academy_core::policy::Eligibility;
use tracing::{debug, info, warn};

use super::session::{CheckpointSession, Tick};
use crate::bank::QuestionBank;
use crate::error::{CheckpointFlowError, SessionError};
use crate::ledger::ProgressLedger;

/// A graded attempt and whether it reached the ledger.
///
/// `saved == false` means the score is final but may not be stored; retry with
/// `CheckpointService::save_result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub result: CheckpointResult,
    pub saved: bool,
}

/// Orchestrates attempts: eligibility on start, grading on submit or expiry, and
/// best-effort persistence into the progress ledger.
#[derive(Clone)]
pub struct CheckpointService {
    clock: Clock,
    bank: QuestionBank,
    ledger: ProgressLedger,
}

impl CheckpointService {
    #[must_use]
    pub fn new(clock: Clock, bank: QuestionBank, ledger: ProgressLedger) -> Self {
        Self {
            clock,
            bank,
            ledger,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.ledger = self.ledger.with_clock(clock);
        self
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    /// Open an attempt if the ledger allows it.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointFlowError::NotFound` for unknown checkpoints,
    /// `CheckpointFlowError::NotEligible` while a cooldown is running,
    /// `CheckpointFlowError::AlreadyPassed` when passed checkpoints are closed, and
    /// `CheckpointFlowError::Ledger` if the ledger cannot be read.
    pub async fn start(
        &self,
        learner_id: LearnerId,
        checkpoint_id: &CheckpointId,
    ) -> Result<CheckpointSession, CheckpointFlowError> {
        let definition = self.bank.get_checkpoint(checkpoint_id)?;

        match self.ledger.can_attempt(learner_id, checkpoint_id).await? {
            Eligibility::Eligible => {}
            Eligibility::CoolingDown { retry_after } => {
                warn!(
                    learner = %learner_id,
                    checkpoint = %checkpoint_id,
                    retry_after_secs = retry_after.num_seconds(),
                    "attempt refused during cooldown"
                );
                return Err(CheckpointFlowError::NotEligible {
                    checkpoint: checkpoint_id.clone(),
                    retry_after,
                });
            }
            Eligibility::AlreadyPassed => {
                return Err(CheckpointFlowError::AlreadyPassed(checkpoint_id.clone()));
            }
        }

        let session = CheckpointSession::new(learner_id, definition, self.clock.now());
        info!(
            learner = %learner_id,
            checkpoint = %checkpoint_id,
            questions = session.question_count(),
            time_limit_secs = session.time_limit_secs(),
            "checkpoint attempt started"
        );
        Ok(session)
    }

    /// Throw `session` away and open a fresh attempt on the same checkpoint.
    ///
    /// The cooldown gate is not consulted.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointFlowError::NotFound` if the checkpoint left the curriculum.
    pub fn restart(
        &self,
        session: CheckpointSession,
    ) -> Result<CheckpointSession, CheckpointFlowError> {
        let definition = self.bank.get_checkpoint(session.checkpoint_id())?;
        if session.result().is_some() && !session.is_saved() {
            warn!(
                learner = %session.learner_id(),
                checkpoint = %session.checkpoint_id(),
                "restarting with an unsaved result"
            );
        }
        let learner_id = session.learner_id();
        drop(session);

        info!(learner = %learner_id, checkpoint = %definition.id(), "checkpoint attempt restarted");
        Ok(CheckpointSession::new(learner_id, definition, self.clock.now()))
    }

    /// Grade the attempt and try to store the result.
    ///
    /// A ledger failure does not fail the call: the outcome carries `saved == false`.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointFlowError::Session` if the attempt cannot be submitted.
    pub async fn submit(
        &self,
        session: &mut CheckpointSession,
    ) -> Result<SubmissionOutcome, CheckpointFlowError> {
        let result = session.submit(self.clock.now())?;
        info!(
            learner = %result.learner_id(),
            checkpoint = %result.checkpoint_id(),
            score = %result.score(),
            passed = result.passed(),
            "checkpoint submitted"
        );
        Ok(self.persist(session, result).await)
    }

    /// One countdown step. Returns the outcome when this tick expired the attempt.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointFlowError::Session` if the attempt is already over.
    pub async fn tick(
        &self,
        session: &mut CheckpointSession,
    ) -> Result<Option<SubmissionOutcome>, CheckpointFlowError> {
        match session.tick(self.clock.now())? {
            Tick::Running { remaining_secs } => {
                debug!(checkpoint = %session.checkpoint_id(), remaining_secs, "tick");
                Ok(None)
            }
            Tick::Expired(result) => {
                info!(
                    learner = %result.learner_id(),
                    checkpoint = %result.checkpoint_id(),
                    score = %result.score(),
                    passed = result.passed(),
                    "checkpoint time expired"
                );
                Ok(Some(self.persist(session, result).await))
            }
        }
    }

    /// Retry storing the result of a finished attempt. No-op once it is saved.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointFlowError::Session` if the attempt is still running and
    /// `CheckpointFlowError::Ledger` if the store fails again.
    pub async fn save_result(
        &self,
        session: &mut CheckpointSession,
    ) -> Result<CheckpointResult, CheckpointFlowError> {
        let result = session
            .result()
            .cloned()
            .ok_or(SessionError::NotFinished)?;
        if session.is_saved() {
            return Ok(result);
        }

        self.ledger
            .record_result(&result, session.started_at())
            .await?;
        session.mark_saved();
        Ok(result)
    }

    async fn persist(
        &self,
        session: &mut CheckpointSession,
        result: CheckpointResult,
    ) -> SubmissionOutcome {
        let saved = match self.ledger.record_result(&result, session.started_at()).await {
            Ok(_) => {
                session.mark_saved();
                true
            }
            Err(err) => {
                warn!(
                    learner = %result.learner_id(),
                    checkpoint = %result.checkpoint_id(),
                    error = %err,
                    "checkpoint result not saved"
                );
                false
            }
        };
        SubmissionOutcome { result, saved }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
