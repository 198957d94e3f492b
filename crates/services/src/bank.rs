use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, rng};

use academy_core::model::{CheckpointDefinition, CheckpointId, Curriculum, Question};

use crate::error::BankError;

/// Read-only access to the checkpoint definitions of a curriculum.
///
/// The canonical question order is never touched; attempts receive a shuffled copy.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    curriculum: Arc<Curriculum>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(curriculum: Arc<Curriculum>) -> Self {
        Self { curriculum }
    }

    #[must_use]
    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[CheckpointDefinition] {
        self.curriculum.checkpoints()
    }

    /// Look up a checkpoint definition.
    ///
    /// # Errors
    ///
    /// Returns `BankError::UnknownCheckpoint` if the id is not part of the curriculum.
    pub fn get_checkpoint(&self, id: &CheckpointId) -> Result<&CheckpointDefinition, BankError> {
        self.curriculum
            .checkpoint(id)
            .ok_or_else(|| BankError::UnknownCheckpoint(id.clone()))
    }

    /// Fresh uniformly random presentation order, drawn from the thread-local generator.
    #[must_use]
    pub fn shuffle(questions: &[Question]) -> Vec<Question> {
        Self::shuffle_with(questions, &mut rng())
    }

    /// Same as [`QuestionBank::shuffle`] with a caller-supplied generator.
    #[must_use]
    pub fn shuffle_with<R: Rng + ?Sized>(questions: &[Question], rng: &mut R) -> Vec<Question> {
        let mut order = questions.to_vec();
        order.as_mut_slice().shuffle(rng);
        order
    }
}
