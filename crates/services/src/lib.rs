#![forbid(unsafe_code)]

pub mod app_services;
pub mod bank;
pub mod catalog;
pub mod checkpoints;
pub mod error;
pub mod ledger;
pub mod overview;

pub use academy_core::Clock;

pub use app_services::AppServices;
pub use bank::QuestionBank;
pub use error::{
    AppServicesError, BankError, CatalogError, CheckpointFlowError, LedgerError, SessionError,
};
pub use ledger::ProgressLedger;
pub use overview::{CheckpointOverview, CheckpointStanding, ModuleOverview, ProgressOverview};

pub use checkpoints::{
    AttemptProgress, AttemptStatus, CheckpointService, CheckpointSession, Countdown,
    CountdownHandle, Selection, SubmissionOutcome, Tick,
};
