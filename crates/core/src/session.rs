//! Phase machine of a single assessment attempt.
//!
//! `ExamSession` is synchronous and owns no timers; the services layer feeds
//! it ticks and finalize requests and is responsible for ordering them.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    Answer, AnswerLedger, Assessment, FinishReason, LedgerError, OptionId, Question,
    QuestionBank, QuestionId, SessionResult,
};
use crate::scoring;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is not active (phase: {0})")]
    NotActive(SessionPhase),

    #[error("{remaining} question(s) still unanswered")]
    Unanswered { remaining: usize },

    #[error("session is already being submitted")]
    AlreadyFinalizing,

    #[error("session already completed")]
    Completed,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Linear lifecycle: loading → active → submitting → finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Loading,
    Active,
    Submitting,
    Finished,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::Loading => "loading",
            SessionPhase::Active => "active",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// Aggregated view of answering progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub current: usize,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

pub struct ExamSession {
    bank: QuestionBank,
    ledger: AnswerLedger,
    phase: SessionPhase,
    current: usize,
    time_remaining: u32,
    finish_reason: Option<FinishReason>,
    result: Option<SessionResult>,
}

impl ExamSession {
    /// A session in the `Loading` phase for a resolved assessment.
    #[must_use]
    pub fn new(assessment: Arc<Assessment>) -> Self {
        let time_remaining = assessment.time_limit_seconds();
        let bank = QuestionBank::new(assessment);
        let ledger = AnswerLedger::new(&bank);
        Self {
            bank,
            ledger,
            phase: SessionPhase::Loading,
            current: 0,
            time_remaining,
            finish_reason: None,
            result: None,
        }
    }

    /// Loading → active. Resets answers, position and clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` unless the session is loading.
    pub fn activate(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Loading {
            return Err(SessionError::NotActive(self.phase));
        }
        self.ledger = AnswerLedger::new(&self.bank);
        self.current = 0;
        self.time_remaining = self.bank.assessment().time_limit_seconds();
        self.phase = SessionPhase::Active;
        Ok(())
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.bank.at(self.current)
    }

    #[must_use]
    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    #[must_use]
    pub fn seconds_used(&self) -> u32 {
        self.bank
            .assessment()
            .time_limit_seconds()
            .saturating_sub(self.time_remaining)
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    #[must_use]
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.bank.len(),
            answered: self.ledger.answered_count(),
            current: self.current,
        }
    }

    /// True when a manual submission would be accepted.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.phase == SessionPhase::Active && self.ledger.all_answered()
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Active => Ok(()),
            SessionPhase::Finished => Err(SessionError::Completed),
            other => Err(SessionError::NotActive(other)),
        }
    }

    /// Record a selection for a question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session is not active or the ids are unknown.
    pub fn answer(
        &mut self,
        question_id: &QuestionId,
        option: &OptionId,
    ) -> Result<&Answer, SessionError> {
        self.ensure_active()?;
        Ok(self.ledger.record(&self.bank, question_id, option)?)
    }

    /// Jump to a question, clamped to the valid range. Returns the new index.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session is not active.
    pub fn go_to(&mut self, index: usize) -> Result<usize, SessionError> {
        self.ensure_active()?;
        let last = self.bank.len().saturating_sub(1);
        self.current = index.min(last);
        Ok(self.current)
    }

    /// # Errors
    ///
    /// Returns `SessionError` if the session is not active.
    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.go_to(self.current.saturating_add(1))
    }

    /// # Errors
    ///
    /// Returns `SessionError` if the session is not active.
    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.go_to(self.current.saturating_sub(1))
    }

    /// Apply a countdown reading. Ignored outside `Active`; never increases time.
    pub fn sync_time(&mut self, remaining: u32) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }
        self.time_remaining = self.time_remaining.min(remaining);
        true
    }

    /// Take the finalize latch: active → submitting.
    ///
    /// Manual submission requires every question answered; forced reasons skip
    /// that check.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyFinalizing` or `SessionError::Completed` when
    /// the latch was already taken, `SessionError::Unanswered` for an early manual
    /// submit.
    pub fn begin_finalize(&mut self, reason: FinishReason) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Active => {}
            SessionPhase::Submitting => return Err(SessionError::AlreadyFinalizing),
            SessionPhase::Finished => return Err(SessionError::Completed),
            SessionPhase::Loading => return Err(SessionError::NotActive(self.phase)),
        }
        if !reason.is_forced() && !self.ledger.all_answered() {
            return Err(SessionError::Unanswered {
                remaining: self.bank.len() - self.ledger.answered_count(),
            });
        }
        if reason == FinishReason::TimeExpired {
            self.time_remaining = 0;
        }
        self.finish_reason = Some(reason);
        self.phase = SessionPhase::Submitting;
        Ok(())
    }

    /// Grade the frozen ledger. Only valid while submitting.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` outside the `Submitting` phase.
    pub fn grade(&self, completed_at: DateTime<Utc>) -> Result<SessionResult, SessionError> {
        let reason = match (self.phase, self.finish_reason) {
            (SessionPhase::Submitting, Some(reason)) => reason,
            (SessionPhase::Finished, _) => return Err(SessionError::Completed),
            (phase, _) => return Err(SessionError::NotActive(phase)),
        };
        let graded = scoring::grade(&self.bank, &self.ledger);
        Ok(SessionResult {
            score_percent: graded.score.percent,
            passed: graded.passed,
            seconds_used: self.seconds_used(),
            earned_points: graded.score.earned_points,
            total_points: graded.score.total_points,
            reason,
            completed_at,
        })
    }

    /// Submitting → finished. The result is immutable afterwards.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` outside the `Submitting` phase.
    pub fn finish(&mut self, result: SessionResult) -> Result<&SessionResult, SessionError> {
        match self.phase {
            SessionPhase::Submitting => {}
            SessionPhase::Finished => return Err(SessionError::Completed),
            other => return Err(SessionError::NotActive(other)),
        }
        self.phase = SessionPhase::Finished;
        Ok(self.result.insert(result))
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("assessment", self.bank.assessment().id())
            .field("phase", &self.phase)
            .field("current", &self.current)
            .field("time_remaining", &self.time_remaining)
            .field("finish_reason", &self.finish_reason)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnswerOption, AssessmentDraft, AssessmentId, CorrectAnswer, QuestionDraft, QuestionKind,
        SecurityLevel,
    };
    use crate::time::fixed_now;

    fn assessment(count: usize) -> Arc<Assessment> {
        let questions = (1..=count)
            .map(|n| QuestionDraft {
                id: QuestionId::new(format!("q{n}")),
                kind: QuestionKind::TrueFalse,
                text: format!("Statement {n}"),
                options: vec![AnswerOption::new("t", "True"), AnswerOption::new("f", "False")],
                correct_answer: CorrectAnswer::Single(OptionId::new("t")),
                points: 10,
            })
            .collect();
        Arc::new(
            AssessmentDraft {
                id: AssessmentId::new("quiz"),
                title: "Quiz".into(),
                description: String::new(),
                time_limit_seconds: 30,
                passing_score: 70,
                security_level: SecurityLevel::Low,
                questions,
            }
            .validate()
            .unwrap(),
        )
    }

    fn active(count: usize) -> ExamSession {
        let mut session = ExamSession::new(assessment(count));
        session.activate().unwrap();
        session
    }

    fn answer_all(session: &mut ExamSession, count: usize) {
        for n in 1..=count {
            session
                .answer(&QuestionId::new(format!("q{n}")), &OptionId::new("t"))
                .unwrap();
        }
    }

    #[test]
    fn starts_loading_and_activates_once() {
        let mut session = ExamSession::new(assessment(2));
        assert_eq!(session.phase(), SessionPhase::Loading);
        assert!(session.answer(&QuestionId::new("q1"), &OptionId::new("t")).is_err());

        session.activate().unwrap();
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.time_remaining(), 30);
        assert_eq!(
            session.activate().unwrap_err(),
            SessionError::NotActive(SessionPhase::Active)
        );
    }

    #[test]
    fn navigation_is_clamped() {
        let mut session = active(3);
        assert_eq!(session.previous().unwrap(), 0);
        assert_eq!(session.go_to(10).unwrap(), 2);
        assert_eq!(session.next().unwrap(), 2);
        assert_eq!(session.previous().unwrap(), 1);
        assert_eq!(session.current_question().unwrap().id(), &QuestionId::new("q2"));
    }

    #[test]
    fn manual_submit_requires_all_answers() {
        let mut session = active(3);
        session
            .answer(&QuestionId::new("q1"), &OptionId::new("t"))
            .unwrap();
        assert_eq!(
            session.begin_finalize(FinishReason::Submitted).unwrap_err(),
            SessionError::Unanswered { remaining: 2 }
        );
        assert_eq!(session.phase(), SessionPhase::Active);

        answer_all(&mut session, 3);
        assert!(session.can_submit());
        session.begin_finalize(FinishReason::Submitted).unwrap();
        assert_eq!(session.phase(), SessionPhase::Submitting);
    }

    #[test]
    fn finalize_latch_admits_one_caller() {
        let mut session = active(2);
        session.begin_finalize(FinishReason::SecurityViolation).unwrap();
        assert_eq!(
            session.begin_finalize(FinishReason::TimeExpired).unwrap_err(),
            SessionError::AlreadyFinalizing
        );

        let result = session.grade(fixed_now()).unwrap();
        session.finish(result).unwrap();
        assert_eq!(
            session.begin_finalize(FinishReason::Submitted).unwrap_err(),
            SessionError::Completed
        );
        assert_eq!(
            session.result().unwrap().reason,
            FinishReason::SecurityViolation
        );
    }

    #[test]
    fn timeout_grades_partial_ledger_with_full_time_used() {
        let mut session = active(2);
        session
            .answer(&QuestionId::new("q1"), &OptionId::new("t"))
            .unwrap();
        assert!(session.sync_time(12));
        session.begin_finalize(FinishReason::TimeExpired).unwrap();

        let result = session.grade(fixed_now()).unwrap();
        assert_eq!(result.score_percent, 50);
        assert!(!result.passed);
        assert_eq!(result.seconds_used, 30);
    }

    #[test]
    fn ticks_never_increase_time_and_stop_after_active() {
        let mut session = active(1);
        session.sync_time(20);
        session.sync_time(25);
        assert_eq!(session.time_remaining(), 20);
        assert_eq!(session.seconds_used(), 10);

        answer_all(&mut session, 1);
        session.begin_finalize(FinishReason::Submitted).unwrap();
        assert!(!session.sync_time(5));
        assert_eq!(session.time_remaining(), 20);
    }

    #[test]
    fn finished_session_rejects_mutation() {
        let mut session = active(1);
        answer_all(&mut session, 1);
        session.begin_finalize(FinishReason::Submitted).unwrap();
        let result = session.grade(fixed_now()).unwrap();
        session.finish(result.clone()).unwrap();

        assert_eq!(session.phase(), SessionPhase::Finished);
        assert_eq!(
            session
                .answer(&QuestionId::new("q1"), &OptionId::new("f"))
                .unwrap_err(),
            SessionError::Completed
        );
        assert_eq!(session.finish(result).unwrap_err(), SessionError::Completed);
        assert_eq!(session.result().unwrap().score_percent, 100);
    }
}
