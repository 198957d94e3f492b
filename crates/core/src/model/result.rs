use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::checkpoint::PassThreshold;
use crate::model::ids::{CheckpointId, LearnerId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("a result needs at least one question")]
    NoQuestions,

    #[error("correct count ({correct}) exceeds total questions ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("last_attempt_at is before completed_at")]
    InvalidTimeRange,

    #[error("invalid attempt outcome: {0}")]
    InvalidOutcome(String),
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Correct answers out of the total number of questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    correct: u32,
    total: u32,
}

impl Score {
    /// # Errors
    ///
    /// Returns `ResultError` if `total` is zero or `correct > total`.
    pub fn new(correct: u32, total: u32) -> Result<Self, ResultError> {
        if total == 0 {
            return Err(ResultError::NoQuestions);
        }
        if correct > total {
            return Err(ResultError::CorrectExceedsTotal { correct, total });
        }
        Ok(Self { correct, total })
    }

    #[must_use]
    pub fn correct(self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(self) -> u32 {
        self.total
    }

    /// `correct / total * 100`.
    #[must_use]
    pub fn percent(self) -> f64 {
        f64::from(self.correct) / f64::from(self.total) * 100.0
    }

    #[must_use]
    pub fn meets(self, threshold: PassThreshold) -> bool {
        threshold.is_met(self.correct, self.total)
    }

    /// Compares two scores by ratio, ignoring how many questions each had.
    #[must_use]
    pub fn ratio_cmp(self, other: Score) -> std::cmp::Ordering {
        (u64::from(self.correct) * u64::from(other.total))
            .cmp(&(u64::from(other.correct) * u64::from(self.total)))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:.1}%)", self.correct, self.total, self.percent())
    }
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The learner submitted before time ran out.
    Submitted,
    /// The countdown reached zero and forced submission.
    Expired,
}

impl AttemptOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Submitted => "submitted",
            AttemptOutcome::Expired => "expired",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptOutcome {
    type Err = ResultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "expired" => Ok(Self::Expired),
            other => Err(ResultError::InvalidOutcome(other.to_owned())),
        }
    }
}

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// Graded outcome of an attempt, the unit stored in the progress ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointResult {
    learner_id: LearnerId,
    checkpoint_id: CheckpointId,
    score: Score,
    passed: bool,
    outcome: AttemptOutcome,
    completed_at: DateTime<Utc>,
    last_attempt_at: DateTime<Utc>,
}

impl CheckpointResult {
    /// Grades a finished attempt against `threshold`.
    ///
    /// `last_attempt_at` starts equal to `completed_at`.
    #[must_use]
    pub fn grade(
        learner_id: LearnerId,
        checkpoint_id: CheckpointId,
        score: Score,
        threshold: PassThreshold,
        outcome: AttemptOutcome,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            checkpoint_id,
            score,
            passed: score.meets(threshold),
            outcome,
            completed_at,
            last_attempt_at: completed_at,
        }
    }

    /// Rehydrate a result from persisted storage.
    ///
    /// `passed` is trusted as stored since the threshold may have changed since grading.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` if the score is inconsistent or `last_attempt_at < completed_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        learner_id: LearnerId,
        checkpoint_id: CheckpointId,
        correct: u32,
        total: u32,
        passed: bool,
        outcome: AttemptOutcome,
        completed_at: DateTime<Utc>,
        last_attempt_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        let score = Score::new(correct, total)?;
        if last_attempt_at < completed_at {
            return Err(ResultError::InvalidTimeRange);
        }
        Ok(Self {
            learner_id,
            checkpoint_id,
            score,
            passed,
            outcome,
            completed_at,
            last_attempt_at,
        })
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
    pub fn score(&self) -> Score {
        self.score
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.score.correct()
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.score.total()
    }

    #[must_use]
    pub fn score_percent(&self) -> f64 {
        self.score.percent()
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn outcome(&self) -> AttemptOutcome {
        self.outcome
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Timestamp of the most recent attempt, used for the re-attempt cooldown.
    #[must_use]
    pub fn last_attempt_at(&self) -> DateTime<Utc> {
        self.last_attempt_at
    }

    /// Same result, with the attempt timestamp moved to a later attempt.
    #[must_use]
    pub(crate) fn touched_at(mut self, at: DateTime<Utc>) -> Self {
        if at > self.last_attempt_at {
            self.last_attempt_at = at;
        }
        self
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
