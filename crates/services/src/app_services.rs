use std::sync::Arc;

use academy_core::model::Curriculum;
use academy_core::policy::LedgerPolicy;
use storage::repository::Storage;

use crate::Clock;
use crate::bank::QuestionBank;
use crate::checkpoints::CheckpointService;
use crate::error::AppServicesError;
use crate::ledger::ProgressLedger;

/// Assembles app-facing services over one curriculum and one storage backend.
#[derive(Clone)]
pub struct AppServices {
    curriculum: Arc<Curriculum>,
    ledger: Arc<ProgressLedger>,
    checkpoints: Arc<CheckpointService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        curriculum: Curriculum,
        policy: LedgerPolicy,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, curriculum, policy))
    }

    /// Build services over the in-memory repositories.
    #[must_use]
    pub fn in_memory(clock: Clock, curriculum: Curriculum, policy: LedgerPolicy) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, curriculum, policy)
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        curriculum: Curriculum,
        policy: LedgerPolicy,
    ) -> Self {
        let curriculum = Arc::new(curriculum);
        let ledger = ProgressLedger::from_storage(clock, policy, Arc::clone(&curriculum), storage);
        let checkpoints = CheckpointService::new(
            clock,
            QuestionBank::new(Arc::clone(&curriculum)),
            ledger.clone(),
        );

        Self {
            curriculum,
            ledger: Arc::new(ledger),
            checkpoints: Arc::new(checkpoints),
        }
    }

    #[must_use]
    pub fn curriculum(&self) -> Arc<Curriculum> {
        Arc::clone(&self.curriculum)
    }

    #[must_use]
    pub fn ledger(&self) -> Arc<ProgressLedger> {
        Arc::clone(&self.ledger)
    }

    #[must_use]
    pub fn checkpoints(&self) -> Arc<CheckpointService> {
        Arc::clone(&self.checkpoints)
    }
}
