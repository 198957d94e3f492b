use chrono::{DateTime, Duration, Utc};

use academy_core::model::{
    CheckpointId, CheckpointResult, Curriculum, LearnerId, ModuleId, Score,
};
use academy_core::policy::LedgerPolicy;

/// Where a learner stands on one checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStanding {
    NotAttempted,
    Passed { score: Score },
    /// `retry_after` is `None` once the cooldown is over.
    Failed {
        score: Score,
        retry_after: Option<Duration>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOverview {
    pub module: ModuleId,
    pub title: String,
    pub unlocked: bool,
    pub blocking: Vec<CheckpointId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointOverview {
    pub checkpoint_id: CheckpointId,
    pub title: String,
    pub covers: Vec<ModuleId>,
    pub standing: CheckpointStanding,
}

/// Everything a dashboard needs to render a learner's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOverview {
    pub learner_id: LearnerId,
    pub modules: Vec<ModuleOverview>,
    pub checkpoints: Vec<CheckpointOverview>,
}

impl ProgressOverview {
    /// Combine the curriculum with the learner's stored results as of `now`.
    ///
    /// Results for checkpoints no longer in the curriculum are ignored.
    #[must_use]
    pub fn build(
        learner_id: LearnerId,
        curriculum: &Curriculum,
        results: &[CheckpointResult],
        policy: &LedgerPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let find = |id: &CheckpointId| results.iter().find(|r| r.checkpoint_id() == id);
        let is_passed = |id: &CheckpointId| find(id).is_some_and(CheckpointResult::passed);

        let modules = curriculum
            .unlock_states(is_passed)
            .into_iter()
            .map(|state| ModuleOverview {
                title: curriculum
                    .module(state.module)
                    .map(|m| m.title().to_owned())
                    .unwrap_or_default(),
                module: state.module,
                unlocked: state.unlocked,
                blocking: state.blocking,
            })
            .collect();

        let checkpoints = curriculum
            .checkpoints()
            .iter()
            .map(|definition| {
                let standing = match find(definition.id()) {
                    None => CheckpointStanding::NotAttempted,
                    Some(result) if result.passed() => CheckpointStanding::Passed {
                        score: result.score(),
                    },
                    Some(result) => CheckpointStanding::Failed {
                        score: result.score(),
                        retry_after: policy.eligibility(Some(result), now).retry_after(),
                    },
                };
                CheckpointOverview {
                    checkpoint_id: definition.id().clone(),
                    title: definition.title().to_owned(),
                    covers: definition.covers_modules().iter().copied().collect(),
                    standing,
                }
            })
            .collect();

        Self {
            learner_id,
            modules,
            checkpoints,
        }
    }

    #[must_use]
    pub fn checkpoint(&self, id: &CheckpointId) -> Option<&CheckpointOverview> {
        self.checkpoints.iter().find(|c| &c.checkpoint_id == id)
    }

    #[must_use]
    pub fn unlocked_modules(&self) -> Vec<ModuleId> {
        self.modules
            .iter()
            .filter(|m| m.unlocked)
            .map(|m| m.module)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::model::{
        AttemptOutcome, CheckpointDraft, CurriculumDraft, ModuleDraft, PassThreshold,
        QuestionDraft, QuestionId,
    };
    use academy_core::time::fixed_now;
    use uuid::Uuid;

    fn curriculum() -> Curriculum {
        let question = QuestionDraft {
            id: QuestionId::new(1),
            prompt: "Is a stop-loss an exit order?".into(),
            options: vec!["yes".into(), "no".into()],
            correct_index: 0,
        };
        CurriculumDraft {
            modules: (1..=3)
                .map(|m| ModuleDraft {
                    id: ModuleId::new(m),
                    title: format!("Module {m}"),
                })
                .collect(),
            checkpoints: vec![
                CheckpointDraft::new(
                    CheckpointId::new("theoretical-pc1").unwrap(),
                    vec![question.clone()],
                    vec![ModuleId::new(1)],
                ),
                CheckpointDraft::new(
                    CheckpointId::new("practical-pc2").unwrap(),
                    vec![question],
                    vec![ModuleId::new(2)],
                ),
            ],
        }
        .validate()
        .unwrap()
    }

    fn result(checkpoint: &str, correct: u32, total: u32) -> CheckpointResult {
        CheckpointResult::grade(
            LearnerId::new(Uuid::from_u128(5)),
            CheckpointId::new(checkpoint).unwrap(),
            Score::new(correct, total).unwrap(),
            PassThreshold::default(),
            AttemptOutcome::Submitted,
            fixed_now(),
        )
    }

    #[test]
    fn overview_reports_standing_and_unlocks() {
        let curriculum = curriculum();
        let results = vec![result("theoretical-pc1", 9, 12), result("practical-pc2", 3, 12)];
        let policy = LedgerPolicy::default().with_cooldown(Duration::hours(1));
        let now = fixed_now() + Duration::minutes(15);

        let overview = ProgressOverview::build(
            LearnerId::new(Uuid::from_u128(5)),
            &curriculum,
            &results,
            &policy,
            now,
        );

        assert_eq!(overview.unlocked_modules(), vec![ModuleId::new(1), ModuleId::new(2)]);
        assert_eq!(
            overview.modules[2].blocking,
            vec![CheckpointId::new("practical-pc2").unwrap()]
        );

        let pc1 = overview
            .checkpoint(&CheckpointId::new("theoretical-pc1").unwrap())
            .unwrap();
        assert!(matches!(pc1.standing, CheckpointStanding::Passed { .. }));

        let pc2 = overview
            .checkpoint(&CheckpointId::new("practical-pc2").unwrap())
            .unwrap();
        assert_eq!(
            pc2.standing,
            CheckpointStanding::Failed {
                score: Score::new(3, 12).unwrap(),
                retry_after: Some(Duration::minutes(45)),
            }
        );
    }

    #[test]
    fn untouched_checkpoints_are_not_attempted() {
        let curriculum = curriculum();
        let overview = ProgressOverview::build(
            LearnerId::new(Uuid::from_u128(5)),
            &curriculum,
            &[],
            &LedgerPolicy::default(),
            fixed_now(),
        );
        assert!(overview
            .checkpoints
            .iter()
            .all(|c| c.standing == CheckpointStanding::NotAttempted));
        assert_eq!(overview.unlocked_modules(), vec![ModuleId::new(1)]);
    }
}
