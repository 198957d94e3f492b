use chrono::{DateTime, Utc};
use rand::{Rng, rng};
use std::fmt;
use tracing::debug;

use academy_core::model::{
    AttemptOutcome, CheckpointDefinition, CheckpointId, CheckpointResult, LearnerId,
    PassThreshold, Question, Score,
};

use super::progress::AttemptProgress;
use crate::bank::QuestionBank;
use crate::error::SessionError;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one attempt. `Submitted` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Expired,
}

impl AttemptStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::InProgress => f.write_str("in progress"),
            AttemptStatus::Submitted => f.write_str("submitted"),
            AttemptStatus::Expired => f.write_str("expired"),
        }
    }
}

/// What happened to a `select_answer` call that was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Recorded,
    /// The question already had a locked answer; nothing changed.
    AlreadyLocked,
}

/// Result of a single countdown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Running { remaining_secs: u32 },
    Expired(CheckpointResult),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory attempt of one checkpoint by one learner.
///
/// Questions are held in presentation order and `answers[p]` refers to the question shown
/// at position `p`. Only the graded result outlives the session.
pub struct CheckpointSession {
    learner_id: LearnerId,
    checkpoint_id: CheckpointId,
    threshold: PassThreshold,
    require_all_answered: bool,
    lock_answers: bool,
    time_limit_secs: u32,
    /// Question order as defined by the checkpoint; every restart reshuffles from here.
    canonical: Vec<Question>,
    questions: Vec<Question>,
    answers: Vec<Option<usize>>,
    current: usize,
    started_at: DateTime<Utc>,
    remaining_secs: u32,
    status: AttemptStatus,
    result: Option<CheckpointResult>,
    saved: bool,
}

impl CheckpointSession {
    /// Open a new attempt with a freshly shuffled question order and a full timer.
    ///
    /// Eligibility is the caller's concern; see `CheckpointService::start`.
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        definition: &CheckpointDefinition,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::with_rng(learner_id, definition, started_at, &mut rng())
    }

    #[must_use]
    pub fn with_rng<R: Rng + ?Sized>(
        learner_id: LearnerId,
        definition: &CheckpointDefinition,
        started_at: DateTime<Utc>,
        rng: &mut R,
    ) -> Self {
        let questions = QuestionBank::shuffle_with(definition.questions(), rng);
        let answers = vec![None; questions.len()];
        Self {
            learner_id,
            checkpoint_id: definition.id().clone(),
            threshold: definition.pass_threshold(),
            require_all_answered: definition.require_all_answered(),
            lock_answers: definition.lock_answers(),
            time_limit_secs: definition.time_limit_secs(),
            canonical: definition.questions().to_vec(),
            questions,
            answers,
            current: 0,
            started_at,
            remaining_secs: definition.time_limit_secs(),
            status: AttemptStatus::InProgress,
            result: None,
            saved: false,
        }
    }

    /// Discard this attempt and open a brand-new one on the same questions.
    ///
    /// The old answers, timer and result are dropped with `self`.
    #[must_use]
    pub fn restart(self, started_at: DateTime<Utc>) -> Self {
        self.restart_with_rng(started_at, &mut rng())
    }

    #[must_use]
    pub fn restart_with_rng<R: Rng + ?Sized>(self, started_at: DateTime<Utc>, rng: &mut R) -> Self {
        let questions = QuestionBank::shuffle_with(&self.canonical, rng);
        Self {
            answers: vec![None; questions.len()],
            questions,
            current: 0,
            started_at,
            remaining_secs: self.time_limit_secs,
            status: AttemptStatus::InProgress,
            result: None,
            saved: false,
            ..self
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn checkpoint_id(&self) -> &CheckpointId {
        &self.checkpoint_id
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Questions in presentation order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_position(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn answer(&self, position: usize) -> Option<usize> {
        self.answers.get(position).copied().flatten()
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.answers.len() - self.answered_count()
    }

    /// Positions whose selected option is the correct one.
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| a.is_some_and(|option| q.is_correct(option)))
            .count()
    }

    /// Graded result once the attempt is over.
    #[must_use]
    pub fn result(&self) -> Option<&CheckpointResult> {
        self.result.as_ref()
    }

    /// Whether the result has reached the progress ledger.
    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub(crate) fn mark_saved(&mut self) {
        self.saved = true;
    }

    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        AttemptProgress {
            total: self.question_count(),
            answered: self.answered_count(),
            unanswered: self.unanswered_count(),
            current_position: self.current,
            remaining_secs: self.remaining_secs,
            status: self.status,
        }
    }

    /// Choose `option` for the question at `position`.
    ///
    /// With locking enabled the first choice is final and later calls return
    /// `Selection::AlreadyLocked` without changing anything.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` once the attempt is over,
    /// `SessionError::PositionOutOfRange` for an unknown position and
    /// `SessionError::InvalidAnswer` when `option` does not exist.
    pub fn select_answer(&mut self, position: usize, option: usize) -> Result<Selection, SessionError> {
        self.ensure_in_progress()?;
        let len = self.questions.len();
        let Some(question) = self.questions.get(position) else {
            return Err(SessionError::PositionOutOfRange { position, len });
        };
        if option >= question.option_count() {
            return Err(SessionError::InvalidAnswer {
                position,
                option,
                len: question.option_count(),
            });
        }

        let slot = &mut self.answers[position];
        if self.lock_answers && slot.is_some() {
            debug!(checkpoint = %self.checkpoint_id, position, "answer already locked");
            return Ok(Selection::AlreadyLocked);
        }
        *slot = Some(option);
        if self.lock_answers {
            debug!(checkpoint = %self.checkpoint_id, position, option, "answer locked");
        }
        Ok(Selection::Recorded)
    }

    /// Move to `position`. Navigation does not require the current question to be answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` once the attempt is over and
    /// `SessionError::PositionOutOfRange` for an unknown position.
    pub fn go_to(&mut self, position: usize) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        if position >= self.questions.len() {
            return Err(SessionError::PositionOutOfRange {
                position,
                len: self.questions.len(),
            });
        }
        self.current = position;
        Ok(())
    }

    /// Advance the countdown by one second. Reaching zero grades the attempt as expired.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` once the attempt is over.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Tick, SessionError> {
        self.ensure_in_progress()?;
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Ok(Tick::Running {
                remaining_secs: self.remaining_secs,
            });
        }
        let result = self.finish(AttemptOutcome::Expired, now)?;
        Ok(Tick::Expired(result))
    }

    /// Grade the attempt. Unanswered questions count as incorrect.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finished` if the attempt is already over and
    /// `SessionError::Unanswered` when the checkpoint requires every question to be answered.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<CheckpointResult, SessionError> {
        self.ensure_in_progress()?;
        if self.require_all_answered {
            let unanswered = self.unanswered_count();
            if unanswered > 0 {
                return Err(SessionError::Unanswered { unanswered });
            }
        }
        self.finish(AttemptOutcome::Submitted, now)
    }

    fn finish(
        &mut self,
        outcome: AttemptOutcome,
        now: DateTime<Utc>,
    ) -> Result<CheckpointResult, SessionError> {
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let correct = u32::try_from(self.correct_count()).unwrap_or(u32::MAX);
        let score = Score::new(correct, total)?;

        let result = CheckpointResult::grade(
            self.learner_id,
            self.checkpoint_id.clone(),
            score,
            self.threshold,
            outcome,
            now,
        );
        self.status = match outcome {
            AttemptOutcome::Submitted => AttemptStatus::Submitted,
            AttemptOutcome::Expired => AttemptStatus::Expired,
        };
        self.result = Some(result.clone());
        Ok(result)
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            Err(SessionError::Finished(self.status))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CheckpointSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckpointSession")
            .field("learner_id", &self.learner_id)
            .field("checkpoint_id", &self.checkpoint_id)
            .field("questions_len", &self.questions.len())
            .field("answered", &self.answered_count())
            .field("current", &self.current)
            .field("remaining_secs", &self.remaining_secs)
            .field("status", &self.status)
            .field("saved", &self.saved)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
