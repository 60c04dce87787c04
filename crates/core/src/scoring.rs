//! Pure grading of an answer ledger against a question bank.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{Answer, AnswerLedger, CorrectAnswer, OptionId, Question, QuestionBank};

/// Points earned versus available, with the rounded percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub earned_points: u64,
    pub total_points: u64,
    pub percent: u8,
}

/// A score judged against the assessment's passing threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub score: ScoreBreakdown,
    pub passed: bool,
}

/// Points awarded for a single question.
///
/// Multi-select answers earn full points on an exact match and half points
/// (rounded half-up) when exactly one of "every correct option selected" and
/// "no incorrect option selected" holds.
#[must_use]
pub fn question_points(question: &Question, answer: &Answer) -> u64 {
    if !answer.is_answered() {
        return 0;
    }
    let points = u64::from(question.points());

    match (question.correct_answer(), answer) {
        (CorrectAnswer::Single(expected), Answer::Single(given)) => {
            if expected == given {
                points
            } else {
                0
            }
        }
        (CorrectAnswer::Multiple(expected), Answer::Multiple(given)) => {
            multi_select_points(expected, given, points)
        }
        (CorrectAnswer::Multiple(expected), Answer::Single(given)) => {
            multi_select_points(expected, &BTreeSet::from([given.clone()]), points)
        }
        _ => 0,
    }
}

fn multi_select_points(
    expected: &BTreeSet<OptionId>,
    given: &BTreeSet<OptionId>,
    points: u64,
) -> u64 {
    let all_correct_selected = expected.is_subset(given);
    let no_incorrect_selected = given.is_subset(expected);
    match (all_correct_selected, no_incorrect_selected) {
        (true, true) => points,
        (true, false) | (false, true) => points.div_ceil(2),
        (false, false) => 0,
    }
}

/// Rounded percentage; a zero-point total yields 0.
#[must_use]
pub fn percent(earned: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let earned = earned.min(total);
    let rounded = (earned * 200 + total) / (total * 2);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

/// Score every question of `bank` against `ledger`.
#[must_use]
pub fn score(bank: &QuestionBank, ledger: &AnswerLedger) -> ScoreBreakdown {
    let mut earned_points = 0_u64;
    let mut total_points = 0_u64;

    for question in bank.iter() {
        total_points = total_points.saturating_add(u64::from(question.points()));
        if let Some(answer) = ledger.answer(question.id()) {
            earned_points = earned_points.saturating_add(question_points(question, answer));
        }
    }

    ScoreBreakdown {
        earned_points,
        total_points,
        percent: percent(earned_points, total_points),
    }
}

/// Score and apply the assessment's passing threshold.
#[must_use]
pub fn grade(bank: &QuestionBank, ledger: &AnswerLedger) -> Grade {
    let score = score(bank, ledger);
    Grade {
        passed: score.percent >= bank.assessment().passing_score(),
        score,
    }
}
