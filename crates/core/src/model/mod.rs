mod checkpoint;
mod curriculum;
mod ids;
mod question;
mod result;

pub use ids::{CheckpointId, LearnerId, ModuleId, ParseIdError, QuestionId};

pub use checkpoint::{
    CheckpointDefinition, CheckpointDraft, CheckpointError, DEFAULT_PASS_PERCENT,
    DEFAULT_TIME_LIMIT_SECS, PassThreshold,
};
pub use curriculum::{
    Curriculum, CurriculumDraft, CurriculumError, Module, ModuleDraft, ModuleUnlockState,
};
pub use question::{MIN_OPTIONS, Question, QuestionDraft, QuestionError};
pub use result::{AttemptOutcome, CheckpointResult, ResultError, Score};
