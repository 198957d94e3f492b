mod progress;
mod session;
mod timer;
mod workflow;

// Public API of the checkpoint subsystem.
pub use crate::error::{CheckpointFlowError, SessionError};
pub use progress::AttemptProgress;
pub use session::{AttemptStatus, CheckpointSession, Selection, Tick};
pub use timer::{Countdown, CountdownHandle};
pub use workflow::{CheckpointService, SubmissionOutcome};
