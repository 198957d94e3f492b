use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, warn};

use super::session::CheckpointSession;
use super::workflow::{CheckpointService, SubmissionOutcome};

/// Drives a session's countdown from a background task.
pub struct Countdown;

impl Countdown {
    /// Tick `session` once per `period` until it finishes.
    ///
    /// The task ends on its own when the session reaches a terminal state, and is
    /// aborted when the returned handle is dropped.
    #[must_use]
    pub fn spawn(
        service: CheckpointService,
        session: Arc<Mutex<CheckpointSession>>,
        period: Duration,
    ) -> CountdownHandle {
        let (expired_tx, expired_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                let mut session = session.lock().await;
                if session.is_finished() {
                    debug!(checkpoint = %session.checkpoint_id(), "countdown stopped");
                    break;
                }
                match service.tick(&mut session).await {
                    Ok(None) => {}
                    Ok(Some(outcome)) => {
                        expired_tx.send_replace(Some(outcome));
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "countdown stopped on error");
                        break;
                    }
                }
            }
        });

        CountdownHandle {
            task,
            expired: expired_rx,
        }
    }
}

/// Owner of a running countdown. Dropping it cancels the timer.
pub struct CountdownHandle {
    task: JoinHandle<()>,
    expired: watch::Receiver<Option<SubmissionOutcome>>,
}

impl CountdownHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the countdown expires the session.
    ///
    /// Returns `None` if the countdown ended without expiring it (the learner
    /// submitted first, or the timer was cancelled). Safe to use inside `select!`.
    pub async fn expired(&mut self) -> Option<SubmissionOutcome> {
        self.expired
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone())
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::QuestionBank;
    use crate::checkpoints::AttemptStatus;
    use crate::ledger::ProgressLedger;
    use academy_core::Clock;
    use academy_core::model::{
        AttemptOutcome, CheckpointDraft, CheckpointId, CurriculumDraft, LearnerId, ModuleDraft,
        ModuleId, QuestionDraft, QuestionId,
    };
    use academy_core::policy::LedgerPolicy;
    use academy_core::time::fixed_now;
    use storage::repository::Storage;
    use uuid::Uuid;

    fn service(time_limit: u32) -> CheckpointService {
        let mut draft = CheckpointDraft::new(
            CheckpointId::new("practical-pc1").unwrap(),
            vec![QuestionDraft {
                id: QuestionId::new(1),
                prompt: "Which order caps a loss?".into(),
                options: vec!["stop-loss".into(), "market".into()],
                correct_index: 0,
            }],
            vec![ModuleId::new(1)],
        );
        draft.time_limit_seconds = time_limit;
        let curriculum = Arc::new(
            CurriculumDraft {
                modules: vec![ModuleDraft {
                    id: ModuleId::new(1),
                    title: "Orders".into(),
                }],
                checkpoints: vec![draft],
            }
            .validate()
            .unwrap(),
        );
        let ledger = ProgressLedger::from_storage(
            Clock::fixed(fixed_now()),
            LedgerPolicy::default(),
            Arc::clone(&curriculum),
            &Storage::in_memory(),
        );
        CheckpointService::new(Clock::fixed(fixed_now()), QuestionBank::new(curriculum), ledger)
    }

    async fn started(svc: &CheckpointService) -> Arc<Mutex<CheckpointSession>> {
        let session = svc
            .start(
                LearnerId::new(Uuid::from_u128(3)),
                &CheckpointId::new("practical-pc1").unwrap(),
            )
            .await
            .unwrap();
        Arc::new(Mutex::new(session))
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expires_and_saves_the_attempt() {
        let svc = service(3);
        let session = started(&svc).await;

        let mut handle = Countdown::spawn(svc.clone(), Arc::clone(&session), Duration::from_secs(1));
        let outcome = handle.expired().await.expect("expired");

        assert!(outcome.saved);
        assert_eq!(outcome.result.outcome(), AttemptOutcome::Expired);
        let guard = session.lock().await;
        assert_eq!(guard.status(), AttemptStatus::Expired);
        assert_eq!(guard.remaining_secs(), 0);
        assert!(guard.is_saved());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_timer() {
        let svc = service(30);
        let session = started(&svc).await;

        let handle = Countdown::spawn(svc.clone(), Arc::clone(&session), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        drop(handle);
        let remaining = session.lock().await.remaining_secs();
        assert_eq!(remaining, 28);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let guard = session.lock().await;
        assert_eq!(guard.remaining_secs(), 28);
        assert_eq!(guard.status(), AttemptStatus::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ends_quietly_after_manual_submit() {
        let svc = service(30);
        let session = started(&svc).await;

        let mut handle = Countdown::spawn(svc.clone(), Arc::clone(&session), Duration::from_secs(1));
        {
            let mut guard = session.lock().await;
            svc.submit(&mut guard).await.unwrap();
        }
        assert!(handle.expired().await.is_none());
        assert_eq!(session.lock().await.status(), AttemptStatus::Submitted);
    }
}
