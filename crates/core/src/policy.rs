//! Re-attempt rules shared by the progress ledger: cooldown after a failed attempt and
//! how a new result is folded into the stored one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::CheckpointResult;

/// One day between a failed attempt and the next one.
pub const DEFAULT_COOLDOWN_SECS: i64 = 86_400;

/// How a new result replaces the stored one for the same learner and checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetakePolicy {
    /// Keep whichever result scored better. A pass is never replaced by a failure.
    #[default]
    BestScoreWins,
    /// The most recent attempt always replaces the stored result.
    LatestAttemptWins,
}

impl RetakePolicy {
    /// Fold `latest` into `previous`.
    ///
    /// The returned result always carries the newest `last_attempt_at`, so the cooldown is
    /// measured from the latest attempt even when an older, better result is kept.
    #[must_use]
    pub fn merge(
        self,
        previous: Option<&CheckpointResult>,
        latest: CheckpointResult,
    ) -> CheckpointResult {
        let Some(previous) = previous else {
            return latest;
        };
        match self {
            RetakePolicy::LatestAttemptWins => latest,
            RetakePolicy::BestScoreWins => {
                let keep_previous = match (previous.passed(), latest.passed()) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => previous.score().ratio_cmp(latest.score()).is_gt(),
                };
                if keep_previous {
                    let at = latest.last_attempt_at();
                    previous.clone().touched_at(at)
                } else {
                    latest
                }
            }
        }
    }
}

impl fmt::Display for RetakePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetakePolicy::BestScoreWins => f.write_str("best"),
            RetakePolicy::LatestAttemptWins => f.write_str("latest"),
        }
    }
}

impl FromStr for RetakePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" | "best_score_wins" => Ok(Self::BestScoreWins),
            "latest" | "latest_attempt_wins" => Ok(Self::LatestAttemptWins),
            other => Err(format!("unknown retake policy: {other}")),
        }
    }
}

/// Answer to "may this learner start the checkpoint now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// A failed attempt is too recent.
    CoolingDown { retry_after: Duration },
    /// Already passed and the policy does not allow re-taking passed checkpoints.
    AlreadyPassed,
}

impl Eligibility {
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Eligibility::CoolingDown { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Product-configurable ledger rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    pub cooldown: Duration,
    pub retake: RetakePolicy,
    /// Whether a passed checkpoint may be taken again (e.g. for review).
    pub allow_passed_retake: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::seconds(DEFAULT_COOLDOWN_SECS),
            retake: RetakePolicy::default(),
            allow_passed_retake: true,
        }
    }
}

impl LedgerPolicy {
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_retake(mut self, retake: RetakePolicy) -> Self {
        self.retake = retake;
        self
    }

    #[must_use]
    pub fn with_passed_retake(mut self, allow: bool) -> Self {
        self.allow_passed_retake = allow;
        self
    }

    /// Evaluate the cooldown gate for the stored result at time `now`.
    ///
    /// A failed result at `T` blocks every `now` in `[T, T + cooldown)`.
    #[must_use]
    pub fn eligibility(
        &self,
        previous: Option<&CheckpointResult>,
        now: DateTime<Utc>,
    ) -> Eligibility {
        let Some(previous) = previous else {
            return Eligibility::Eligible;
        };

        if previous.passed() {
            return if self.allow_passed_retake {
                Eligibility::Eligible
            } else {
                Eligibility::AlreadyPassed
            };
        }

        // a clock behind the stored timestamp never waits longer than one cooldown
        let elapsed = (now - previous.last_attempt_at()).max(Duration::zero());
        if elapsed >= self.cooldown {
            Eligibility::Eligible
        } else {
            Eligibility::CoolingDown {
                retry_after: self.cooldown - elapsed,
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttemptOutcome, CheckpointId, LearnerId, PassThreshold, Score};
    use crate::time::fixed_now;
    use uuid::Uuid;

    fn result(correct: u32, at: DateTime<Utc>) -> CheckpointResult {
        CheckpointResult::grade(
            LearnerId::new(Uuid::from_u128(7)),
            CheckpointId::new("practical-pc4").unwrap(),
            Score::new(correct, 12).unwrap(),
            PassThreshold::default(),
            AttemptOutcome::Submitted,
            at,
        )
    }

    #[test]
    fn no_prior_result_is_eligible() {
        let policy = LedgerPolicy::default();
        assert_eq!(policy.eligibility(None, fixed_now()), Eligibility::Eligible);
    }

    #[test]
    fn cooldown_gate_is_half_open() {
        let t = fixed_now();
        let cooldown = Duration::hours(2);
        let policy = LedgerPolicy::default().with_cooldown(cooldown);
        let failed = result(5, t);

        assert_eq!(
            policy.eligibility(Some(&failed), t),
            Eligibility::CoolingDown {
                retry_after: cooldown
            }
        );
        let almost = policy.eligibility(Some(&failed), t + cooldown - Duration::seconds(1));
        assert_eq!(almost.retry_after(), Some(Duration::seconds(1)));
        assert!(policy.eligibility(Some(&failed), t + cooldown).is_eligible());
        assert!(policy
            .eligibility(Some(&failed), t + cooldown + Duration::days(3))
            .is_eligible());
    }

    #[test]
    fn clock_skew_never_extends_the_wait() {
        let t = fixed_now();
        let policy = LedgerPolicy::default().with_cooldown(Duration::minutes(10));
        let failed = result(2, t);
        let gate = policy.eligibility(Some(&failed), t - Duration::hours(1));
        assert_eq!(gate.retry_after(), Some(Duration::minutes(10)));
    }

    #[test]
    fn huge_cooldown_with_skewed_clock_does_not_overflow() {
        let t = fixed_now();
        let policy = LedgerPolicy::default().with_cooldown(Duration::MAX);
        let failed = result(2, t);

        let gate = policy.eligibility(Some(&failed), t - Duration::seconds(1));
        assert_eq!(gate.retry_after(), Some(Duration::MAX));

        let later = policy.eligibility(Some(&failed), t + Duration::days(1));
        assert_eq!(later.retry_after(), Some(Duration::MAX - Duration::days(1)));
    }

    #[test]
    fn passed_checkpoint_respects_review_setting() {
        let passed = result(10, fixed_now());
        let open = LedgerPolicy::default();
        assert!(open.eligibility(Some(&passed), fixed_now()).is_eligible());

        let closed = LedgerPolicy::default().with_passed_retake(false);
        assert_eq!(
            closed.eligibility(Some(&passed), fixed_now()),
            Eligibility::AlreadyPassed
        );
    }

    #[test]
    fn best_score_wins_never_downgrades_a_pass() {
        let t = fixed_now();
        let passed = result(9, t);
        let later_fail = result(3, t + Duration::days(1));

        let merged = RetakePolicy::BestScoreWins.merge(Some(&passed), later_fail);
        assert!(merged.passed());
        assert_eq!(merged.correct_count(), 9);
        assert_eq!(merged.completed_at(), t);
        assert_eq!(merged.last_attempt_at(), t + Duration::days(1));
    }

    #[test]
    fn best_score_wins_takes_an_improvement() {
        let t = fixed_now();
        let merged = RetakePolicy::BestScoreWins.merge(
            Some(&result(9, t)),
            result(11, t + Duration::days(1)),
        );
        assert_eq!(merged.correct_count(), 11);
        assert_eq!(merged.completed_at(), t + Duration::days(1));
    }

    #[test]
    fn latest_attempt_wins_overwrites() {
        let t = fixed_now();
        let merged = RetakePolicy::LatestAttemptWins.merge(
            Some(&result(12, t)),
            result(1, t + Duration::hours(1)),
        );
        assert!(!merged.passed());
        assert_eq!(merged.correct_count(), 1);
    }

    #[test]
    fn retake_policy_parses_config_values() {
        assert_eq!("best".parse::<RetakePolicy>(), Ok(RetakePolicy::BestScoreWins));
        assert_eq!(" Latest ".parse::<RetakePolicy>(), Ok(RetakePolicy::LatestAttemptWins));
        assert!("newest".parse::<RetakePolicy>().is_err());
    }
}
