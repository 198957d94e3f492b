//! Shared error types for the services crate.

use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use academy_core::model::{CheckpointId, CurriculumError, ResultError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::checkpoints::AttemptStatus;

/// Errors emitted by `QuestionBank`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BankError {
    #[error("unknown checkpoint: {0}")]
    UnknownCheckpoint(CheckpointId),
}

/// Errors emitted by a `CheckpointSession`.
///
/// `Finished` and `NotFinished` signal a call made in the wrong state; the session is
/// left untouched when they are returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("option {option} is out of range for the question at position {position} ({len} options)")]
    InvalidAnswer {
        position: usize,
        option: usize,
        len: usize,
    },
    #[error("position {position} is out of range ({len} questions)")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("attempt is already {0}")]
    Finished(AttemptStatus),
    #[error("attempt is still in progress")]
    NotFinished,
    #[error("{unanswered} question(s) must be answered before submitting")]
    Unanswered { unanswered: usize },
    #[error(transparent)]
    Grading(#[from] ResultError),
}

/// Errors emitted by `ProgressLedger`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// The store could not be reached or returned bad data. The result may not be saved.
    #[error("progress store failed: {0}")]
    Persistence(#[from] StorageError),
    #[error(transparent)]
    Curriculum(#[from] CurriculumError),
}

/// Errors emitted by `CheckpointService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CheckpointFlowError {
    #[error(transparent)]
    NotFound(#[from] BankError),
    #[error("checkpoint {checkpoint} can be attempted again in {}s", .retry_after.num_seconds())]
    NotEligible {
        checkpoint: CheckpointId,
        retry_after: Duration,
    },
    #[error("checkpoint {0} is already passed")]
    AlreadyPassed(CheckpointId),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors emitted while loading a curriculum definition.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to read curriculum {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("curriculum is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] academy_core::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
