use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::model::checkpoint::{CheckpointDefinition, CheckpointDraft, CheckpointError};
use crate::model::ids::{CheckpointId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("curriculum has no modules")]
    NoModules,

    #[error("module {0} is declared twice")]
    DuplicateModule(ModuleId),

    #[error("checkpoint {0} is declared twice")]
    DuplicateCheckpoint(CheckpointId),

    #[error("checkpoint {checkpoint} covers unknown module {module}")]
    UnknownCoveredModule {
        checkpoint: CheckpointId,
        module: ModuleId,
    },

    #[error("module {0} is not part of the curriculum")]
    ModuleNotFound(ModuleId),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModuleDraft {
    pub id: ModuleId,
    pub title: String,
}

/// Curriculum file layout: modules plus the checkpoints that certify them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CurriculumDraft {
    pub modules: Vec<ModuleDraft>,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointDraft>,
}

impl CurriculumDraft {
    /// Validate modules and checkpoints into a `Curriculum`.
    ///
    /// Modules are ordered by id regardless of declaration order.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError` for empty or duplicated modules, duplicated checkpoints,
    /// invalid checkpoints, or checkpoints that cover modules missing from the list.
    pub fn validate(self) -> Result<Curriculum, CurriculumError> {
        if self.modules.is_empty() {
            return Err(CurriculumError::NoModules);
        }

        let mut module_ids = HashSet::with_capacity(self.modules.len());
        let mut modules = Vec::with_capacity(self.modules.len());
        for draft in self.modules {
            if !module_ids.insert(draft.id) {
                return Err(CurriculumError::DuplicateModule(draft.id));
            }
            let title = draft.title.trim().to_owned();
            let title = if title.is_empty() {
                format!("Module {}", draft.id)
            } else {
                title
            };
            modules.push(Module { id: draft.id, title });
        }
        modules.sort_by_key(|m| m.id);

        let mut index = HashMap::with_capacity(self.checkpoints.len());
        let mut checkpoints = Vec::with_capacity(self.checkpoints.len());
        for draft in self.checkpoints {
            let definition = draft.validate()?;
            if let Some(module) = definition
                .covers_modules()
                .iter()
                .find(|m| !module_ids.contains(*m))
            {
                return Err(CurriculumError::UnknownCoveredModule {
                    checkpoint: definition.id().clone(),
                    module: *module,
                });
            }
            if index
                .insert(definition.id().clone(), checkpoints.len())
                .is_some()
            {
                return Err(CurriculumError::DuplicateCheckpoint(definition.id().clone()));
            }
            checkpoints.push(definition);
        }

        Ok(Curriculum {
            modules,
            checkpoints,
            index,
        })
    }
}

//
// ─── CURRICULUM ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    title: String,
}

impl Module {
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Derived access state of a module for one learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleUnlockState {
    pub module: ModuleId,
    pub unlocked: bool,
    /// Gating checkpoints the learner still has to pass. Empty when unlocked.
    pub blocking: Vec<CheckpointId>,
}

/// Ordered module graph plus the checkpoint definitions gating it.
#[derive(Debug, Clone, PartialEq)]
pub struct Curriculum {
    modules: Vec<Module>,
    checkpoints: Vec<CheckpointDefinition>,
    index: HashMap<CheckpointId, usize>,
}

impl Curriculum {
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }

    #[must_use]
    pub fn first_module(&self) -> Option<ModuleId> {
        self.modules.first().map(Module::id)
    }

    /// Checkpoints in declaration order.
    #[must_use]
    pub fn checkpoints(&self) -> &[CheckpointDefinition] {
        &self.checkpoints
    }

    #[must_use]
    pub fn checkpoint(&self, id: &CheckpointId) -> Option<&CheckpointDefinition> {
        self.index.get(id).map(|&i| &self.checkpoints[i])
    }

    /// Checkpoints that certify any module ordered before `module`.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError::ModuleNotFound` for unknown modules.
    pub fn gating_checkpoints(
        &self,
        module: ModuleId,
    ) -> Result<Vec<&CheckpointDefinition>, CurriculumError> {
        if self.module(module).is_none() {
            return Err(CurriculumError::ModuleNotFound(module));
        }
        Ok(self
            .checkpoints
            .iter()
            .filter(|c| c.covers_modules().iter().any(|m| *m < module))
            .collect())
    }

    /// Evaluate the unlock rule for `module`.
    ///
    /// The first module is always open. Any later module opens once every checkpoint
    /// covering an earlier module has been passed.
    ///
    /// # Errors
    ///
    /// Returns `CurriculumError::ModuleNotFound` for unknown modules.
    pub fn unlock_state(
        &self,
        module: ModuleId,
        is_passed: impl Fn(&CheckpointId) -> bool,
    ) -> Result<ModuleUnlockState, CurriculumError> {
        let blocking: Vec<CheckpointId> = self
            .gating_checkpoints(module)?
            .into_iter()
            .map(CheckpointDefinition::id)
            .filter(|id| !is_passed(*id))
            .cloned()
            .collect();

        Ok(ModuleUnlockState {
            module,
            unlocked: self.first_module() == Some(module) || blocking.is_empty(),
            blocking,
        })
    }

    /// # Errors
    ///
    /// Returns `CurriculumError::ModuleNotFound` for unknown modules.
    pub fn is_module_unlocked(
        &self,
        module: ModuleId,
        is_passed: impl Fn(&CheckpointId) -> bool,
    ) -> Result<bool, CurriculumError> {
        Ok(self.unlock_state(module, is_passed)?.unlocked)
    }

    /// Unlock state for every module, in curriculum order.
    #[must_use]
    pub fn unlock_states(&self, is_passed: impl Fn(&CheckpointId) -> bool) -> Vec<ModuleUnlockState> {
        self.modules
            .iter()
            .filter_map(|m| self.unlock_state(m.id, &is_passed).ok())
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;
    use crate::model::question::QuestionDraft;

    fn question() -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new(1),
            prompt: "Which candle closes above its open?".into(),
            options: vec!["Bullish".into(), "Bearish".into()],
            correct_index: 0,
        }
    }

    fn checkpoint(id: &str, covers: &[u32]) -> CheckpointDraft {
        CheckpointDraft::new(
            CheckpointId::new(id).unwrap(),
            vec![question()],
            covers.iter().copied().map(ModuleId::new).collect(),
        )
    }

    fn module(id: u32) -> ModuleDraft {
        ModuleDraft {
            id: ModuleId::new(id),
            title: format!("Module {id}"),
        }
    }

    fn curriculum() -> Curriculum {
        CurriculumDraft {
            modules: vec![module(3), module(1), module(2), module(4)],
            checkpoints: vec![
                checkpoint("theoretical-pc1", &[1, 2]),
                checkpoint("practical-pc2", &[3]),
            ],
        }
        .validate()
        .unwrap()
    }

    fn cp(id: &str) -> CheckpointId {
        CheckpointId::new(id).unwrap()
    }

    #[test]
    fn modules_are_ordered_by_id() {
        let c = curriculum();
        let ids: Vec<u32> = c.modules().iter().map(|m| m.id().value()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(c.first_module(), Some(ModuleId::new(1)));
    }

    #[test]
    fn first_module_is_always_unlocked() {
        let c = curriculum();
        assert!(c.is_module_unlocked(ModuleId::new(1), |_| false).unwrap());
    }

    #[test]
    fn later_modules_wait_for_earlier_checkpoints() {
        let c = curriculum();
        let pc1 = cp("theoretical-pc1");

        let state = c.unlock_state(ModuleId::new(2), |_| false).unwrap();
        assert!(!state.unlocked);
        assert_eq!(state.blocking, vec![pc1.clone()]);

        assert!(c.is_module_unlocked(ModuleId::new(2), |id| *id == pc1).unwrap());
        assert!(c.is_module_unlocked(ModuleId::new(3), |id| *id == pc1).unwrap());
        assert!(!c.is_module_unlocked(ModuleId::new(4), |id| *id == pc1).unwrap());
        assert!(c.is_module_unlocked(ModuleId::new(4), |_| true).unwrap());
    }

    #[test]
    fn unlock_states_cover_every_module() {
        let c = curriculum();
        let pc1 = cp("theoretical-pc1");
        let unlocked: Vec<bool> = c
            .unlock_states(|id| *id == pc1)
            .iter()
            .map(|s| s.unlocked)
            .collect();
        assert_eq!(unlocked, vec![true, true, true, false]);
    }

    #[test]
    fn unknown_module_is_an_error() {
        let err = curriculum()
            .is_module_unlocked(ModuleId::new(99), |_| true)
            .unwrap_err();
        assert_eq!(err, CurriculumError::ModuleNotFound(ModuleId::new(99)));
    }

    #[test]
    fn checkpoint_lookup_by_id() {
        let c = curriculum();
        assert!(c.checkpoint(&cp("practical-pc2")).is_some());
        assert!(c.checkpoint(&cp("practical-pc9")).is_none());
    }

    #[test]
    fn invalid_curricula_are_rejected() {
        let empty = CurriculumDraft {
            modules: vec![],
            checkpoints: vec![],
        };
        assert_eq!(empty.validate().unwrap_err(), CurriculumError::NoModules);

        let dup_module = CurriculumDraft {
            modules: vec![module(1), module(1)],
            checkpoints: vec![],
        };
        assert!(matches!(
            dup_module.validate().unwrap_err(),
            CurriculumError::DuplicateModule(_)
        ));

        let dup_checkpoint = CurriculumDraft {
            modules: vec![module(1)],
            checkpoints: vec![checkpoint("pc1", &[1]), checkpoint("pc1", &[1])],
        };
        assert!(matches!(
            dup_checkpoint.validate().unwrap_err(),
            CurriculumError::DuplicateCheckpoint(_)
        ));

        let unknown = CurriculumDraft {
            modules: vec![module(1)],
            checkpoints: vec![checkpoint("pc1", &[2])],
        };
        assert!(matches!(
            unknown.validate().unwrap_err(),
            CurriculumError::UnknownCoveredModule { .. }
        ));
    }
}
