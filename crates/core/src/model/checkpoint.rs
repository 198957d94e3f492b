use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

use crate::model::ids::{CheckpointId, ModuleId, QuestionId};
use crate::model::question::{Question, QuestionDraft, QuestionError};

/// Pass mark used across the course: 70% correct answers.
pub const DEFAULT_PASS_PERCENT: u8 = 70;

/// Attempt duration used across the course: 20 minutes.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 1_200;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CheckpointError {
    #[error("checkpoint {id} has no questions")]
    NoQuestions { id: CheckpointId },

    #[error("checkpoint {id} repeats question id {question}")]
    DuplicateQuestion {
        id: CheckpointId,
        question: QuestionId,
    },

    #[error("checkpoint {id}: {source}")]
    InvalidQuestion {
        id: CheckpointId,
        #[source]
        source: QuestionError,
    },

    #[error("pass threshold must be in (0, 1], got {provided}")]
    InvalidPassThreshold { provided: f64 },

    #[error("checkpoint {id} must have a time limit of at least one second")]
    InvalidTimeLimit { id: CheckpointId },

    #[error("checkpoint {id} does not certify any module")]
    NoModulesCovered { id: CheckpointId },
}

//
// ─── PASS THRESHOLD ────────────────────────────────────────────────────────────
//

/// Minimum share of correct answers, kept as a whole percentage.
///
/// Comparisons use integer arithmetic so that e.g. 7/10 against 70% is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PassThreshold(u8);

impl PassThreshold {
    /// Builds a threshold from a fraction such as `0.70`.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::InvalidPassThreshold` unless the fraction is finite and in `(0, 1]`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_fraction(fraction: f64) -> Result<Self, CheckpointError> {
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(CheckpointError::InvalidPassThreshold { provided: fraction });
        }
        // range checked above, the rounded value fits in 1..=100
        let percent = (fraction * 100.0).round() as u8;
        Ok(Self(percent.max(1)))
    }

    #[must_use]
    pub fn percent(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// True when `correct` out of `total` reaches the threshold.
    #[must_use]
    pub fn is_met(self, correct: u32, total: u32) -> bool {
        if total == 0 {
            return false;
        }
        u64::from(correct) * 100 >= u64::from(self.0) * u64::from(total)
    }
}

impl Default for PassThreshold {
    fn default() -> Self {
        Self(DEFAULT_PASS_PERCENT)
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

fn default_pass_threshold() -> f64 {
    PassThreshold::default().fraction()
}

fn default_time_limit() -> u32 {
    DEFAULT_TIME_LIMIT_SECS
}

fn default_lock_answers() -> bool {
    true
}

/// Unvalidated checkpoint configuration as stored in a curriculum file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CheckpointDraft {
    pub id: CheckpointId,
    #[serde(default)]
    pub title: Option<String>,
    pub questions: Vec<QuestionDraft>,
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    #[serde(default = "default_time_limit")]
    pub time_limit_seconds: u32,
    pub covers_modules: Vec<ModuleId>,
    #[serde(default)]
    pub require_all_answered: bool,
    #[serde(default = "default_lock_answers")]
    pub lock_answers: bool,
}

impl CheckpointDraft {
    /// Draft with the course defaults: 70% to pass, 20 minutes, answers lock on select,
    /// early submission with gaps allowed.
    #[must_use]
    pub fn new(
        id: CheckpointId,
        questions: Vec<QuestionDraft>,
        covers_modules: Vec<ModuleId>,
    ) -> Self {
        Self {
            id,
            title: None,
            questions,
            pass_threshold: default_pass_threshold(),
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECS,
            covers_modules,
            require_all_answered: false,
            lock_answers: true,
        }
    }

    /// Validate the draft into an immutable `CheckpointDefinition`.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError` when there are no questions, a question is invalid or
    /// repeated, the threshold or time limit is out of range, or no module is covered.
    pub fn validate(self) -> Result<CheckpointDefinition, CheckpointError> {
        let id = self.id;
        if self.questions.is_empty() {
            return Err(CheckpointError::NoQuestions { id });
        }
        if self.time_limit_seconds == 0 {
            return Err(CheckpointError::InvalidTimeLimit { id });
        }
        if self.covers_modules.is_empty() {
            return Err(CheckpointError::NoModulesCovered { id });
        }
        let pass_threshold = PassThreshold::from_fraction(self.pass_threshold)?;

        let mut seen = HashSet::with_capacity(self.questions.len());
        let mut questions = Vec::with_capacity(self.questions.len());
        for draft in self.questions {
            if !seen.insert(draft.id) {
                return Err(CheckpointError::DuplicateQuestion {
                    id,
                    question: draft.id,
                });
            }
            let question = draft
                .validate()
                .map_err(|source| CheckpointError::InvalidQuestion {
                    id: id.clone(),
                    source,
                })?;
            questions.push(question);
        }

        let title = self
            .title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| id.to_string());

        Ok(CheckpointDefinition {
            id,
            title,
            questions,
            pass_threshold,
            time_limit_secs: self.time_limit_seconds,
            covers_modules: self.covers_modules.into_iter().collect(),
            require_all_answered: self.require_all_answered,
            lock_answers: self.lock_answers,
        })
    }
}

//
// ─── DEFINITION ────────────────────────────────────────────────────────────────
//

/// Static configuration of one checkpoint, loaded once.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointDefinition {
    id: CheckpointId,
    title: String,
    questions: Vec<Question>,
    pass_threshold: PassThreshold,
    time_limit_secs: u32,
    covers_modules: BTreeSet<ModuleId>,
    require_all_answered: bool,
    lock_answers: bool,
}

impl CheckpointDefinition {
    #[must_use]
    pub fn id(&self) -> &CheckpointId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Canonical question order. Presentation order comes from the question bank's shuffle.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn pass_threshold(&self) -> PassThreshold {
        self.pass_threshold
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn covers_modules(&self) -> &BTreeSet<ModuleId> {
        &self.covers_modules
    }

    #[must_use]
    pub fn covers(&self, module: ModuleId) -> bool {
        self.covers_modules.contains(&module)
    }

    /// When set, voluntary submission is refused while any question is unanswered.
    #[must_use]
    pub fn require_all_answered(&self) -> bool {
        self.require_all_answered
    }

    /// When set, the first selected option for a question is final.
    #[must_use]
    pub fn lock_answers(&self) -> bool {
        self.lock_answers
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
