use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

/// Smallest number of options a multiple-choice question may offer.
pub const MIN_OPTIONS: usize = 2;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {id} has an empty prompt")]
    EmptyPrompt { id: QuestionId },

    #[error("question {id} needs at least 2 options, got {len}")]
    TooFewOptions { id: QuestionId, len: usize },

    #[error("question {id} has an empty option at index {index}")]
    EmptyOption { id: QuestionId, index: usize },

    #[error("question {id} marks option {index} as correct but only has {len} options")]
    CorrectIndexOutOfRange {
        id: QuestionId,
        index: usize,
        len: usize,
    },
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question as it appears in a curriculum file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl QuestionDraft {
    /// Check the draft and turn it into an immutable `Question`.
    ///
    /// Prompt and options are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt or an option is blank, fewer than two
    /// options are given, or `correct_index` does not point into `options`.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let id = self.id;
        let prompt = self.prompt.trim().to_owned();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt { id });
        }

        let options: Vec<String> = self
            .options
            .into_iter()
            .map(|o| o.trim().to_owned())
            .collect();
        if options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions {
                id,
                len: options.len(),
            });
        }
        if let Some(index) = options.iter().position(String::is_empty) {
            return Err(QuestionError::EmptyOption { id, index });
        }
        if self.correct_index >= options.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                id,
                index: self.correct_index,
                len: options.len(),
            });
        }

        Ok(Question {
            id,
            prompt,
            options,
            correct_index: self.correct_index,
        })
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice item. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_index
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(options: &[&str], correct_index: usize) -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new(1),
            prompt: "  What does a stop-loss limit?  ".into(),
            options: options.iter().map(|o| (*o).to_owned()).collect(),
            correct_index,
        }
    }

    #[test]
    fn valid_draft_is_trimmed() {
        let q = draft(&["Risk ", " Profit"], 0).validate().unwrap();
        assert_eq!(q.prompt(), "What does a stop-loss limit?");
        assert_eq!(q.options(), ["Risk", "Profit"]);
        assert!(q.is_correct(0));
        assert!(!q.is_correct(1));
    }

    #[test]
    fn single_option_is_rejected() {
        let err = draft(&["Risk"], 0).validate().unwrap_err();
        assert!(matches!(err, QuestionError::TooFewOptions { len: 1, .. }));
    }

    #[test]
    fn correct_index_must_point_into_options() {
        let err = draft(&["Risk", "Profit"], 2).validate().unwrap_err();
        assert!(matches!(
            err,
            QuestionError::CorrectIndexOutOfRange { index: 2, len: 2, .. }
        ));
    }

    #[test]
    fn blank_prompt_and_option_are_rejected() {
        let mut blank_prompt = draft(&["a", "b"], 0);
        blank_prompt.prompt = "   ".into();
        assert!(matches!(
            blank_prompt.validate().unwrap_err(),
            QuestionError::EmptyPrompt { .. }
        ));

        let err = draft(&["a", " "], 0).validate().unwrap_err();
        assert!(matches!(err, QuestionError::EmptyOption { index: 1, .. }));
    }
}
