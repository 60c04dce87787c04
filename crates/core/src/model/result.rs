use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What caused a session to be finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    /// The test-taker submitted with every question answered.
    Submitted,
    /// The countdown reached zero.
    TimeExpired,
    /// The security monitor reached its violation threshold.
    SecurityViolation,
}

impl FinishReason {
    /// Forced reasons skip the all-answered check.
    #[must_use]
    pub fn is_forced(self) -> bool {
        !matches!(self, FinishReason::Submitted)
    }
}

/// Immutable grading outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub score_percent: u8,
    pub passed: bool,
    pub seconds_used: u32,
    pub earned_points: u64,
    pub total_points: u64,
    pub reason: FinishReason,
    pub completed_at: DateTime<Utc>,
}

/// Payload handed to the result-reporting collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentOutcome {
    pub completed: bool,
    pub assessment_score: u8,
    pub assessment_passed: bool,
    pub completed_date: DateTime<Utc>,
}

impl From<&SessionResult> for AssessmentOutcome {
    fn from(result: &SessionResult) -> Self {
        Self {
            completed: true,
            assessment_score: result.score_percent,
            assessment_passed: result.passed,
            completed_date: result.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn outcome_serializes_with_camel_case_and_rfc3339() {
        let result = SessionResult {
            score_percent: 80,
            passed: true,
            seconds_used: 42,
            earned_points: 40,
            total_points: 50,
            reason: FinishReason::Submitted,
            completed_at: fixed_now(),
        };
        let json = serde_json::to_value(AssessmentOutcome::from(&result)).unwrap();
        assert_eq!(json["completed"], true);
        assert_eq!(json["assessmentScore"], 80);
        assert_eq!(json["assessmentPassed"], true);
        assert_eq!(json["completedDate"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn only_manual_submission_is_unforced() {
        assert!(!FinishReason::Submitted.is_forced());
        assert!(FinishReason::TimeExpired.is_forced());
        assert!(FinishReason::SecurityViolation.is_forced());
    }
}
