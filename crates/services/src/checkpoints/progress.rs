use super::session::AttemptStatus;

/// Snapshot of an attempt for front-ends: counts, position and time left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptProgress {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub current_position: usize,
    pub remaining_secs: u32,
    pub status: AttemptStatus,
}
