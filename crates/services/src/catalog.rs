//! Loading curriculum definitions from JSON.

use std::path::Path;

use tracing::info;

use academy_core::model::{Curriculum, CurriculumDraft};

use crate::error::CatalogError;

/// Curriculum shipped with the application.
pub const BUNDLED_CURRICULUM: &str = include_str!("../assets/curriculum.json");

/// Parse and validate a curriculum from a JSON document.
///
/// # Errors
///
/// Returns `CatalogError::Parse` for malformed JSON and `CatalogError::Invalid` when the
/// definitions break a curriculum rule.
pub fn load_curriculum_str(json: &str) -> Result<Curriculum, CatalogError> {
    let draft: CurriculumDraft = serde_json::from_str(json)?;
    let curriculum = draft.validate().map_err(academy_core::Error::from)?;
    Ok(curriculum)
}

/// # Errors
///
/// Returns `CatalogError::Io` if the file cannot be read, otherwise the errors of
/// [`load_curriculum_str`].
pub fn load_curriculum_file(path: &Path) -> Result<Curriculum, CatalogError> {
    let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let curriculum = load_curriculum_str(&json)?;
    info!(
        path = %path.display(),
        modules = curriculum.modules().len(),
        checkpoints = curriculum.checkpoints().len(),
        "curriculum loaded"
    );
    Ok(curriculum)
}

/// # Errors
///
/// Fails only if the bundled document itself is broken.
pub fn bundled_curriculum() -> Result<Curriculum, CatalogError> {
    load_curriculum_str(BUNDLED_CURRICULUM)
}
