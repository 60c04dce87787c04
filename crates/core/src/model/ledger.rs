use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::assessment::Question;
use crate::model::bank::QuestionBank;
use crate::model::ids::{OptionId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    #[error("option {option} does not belong to question {question}")]
    UnknownOption {
        question: QuestionId,
        option: OptionId,
    },
}

/// The test-taker's current answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "value")]
pub enum Answer {
    #[default]
    Unanswered,
    Single(OptionId),
    Multiple(BTreeSet<OptionId>),
}

impl Answer {
    /// An emptied multi-select set counts as unanswered.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            Answer::Unanswered => false,
            Answer::Single(_) => true,
            Answer::Multiple(ids) => !ids.is_empty(),
        }
    }
}

/// Mutable per-question answer state for one session.
///
/// Every question of the bank has an entry from construction on; entries are
/// overwritten, never removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerLedger {
    answers: HashMap<QuestionId, Answer>,
}

impl AnswerLedger {
    /// A ledger with every question of `bank` unanswered.
    #[must_use]
    pub fn new(bank: &QuestionBank) -> Self {
        let answers = bank
            .iter()
            .map(|q| (q.id().clone(), Answer::Unanswered))
            .collect();
        Self { answers }
    }

    /// Record a selection for `question`.
    ///
    /// Single-choice and true/false answers are replaced; multi-select answers
    /// toggle membership of `option`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the question is not tracked or the option is not
    /// one of its options.
    pub fn set_answer(
        &mut self,
        question: &Question,
        option: &OptionId,
    ) -> Result<&Answer, LedgerError> {
        if !question.has_option(option) {
            return Err(LedgerError::UnknownOption {
                question: question.id().clone(),
                option: option.clone(),
            });
        }
        let slot = self
            .answers
            .get_mut(question.id())
            .ok_or_else(|| LedgerError::UnknownQuestion(question.id().clone()))?;

        if question.kind().is_multi() {
            let mut selected = match std::mem::take(slot) {
                Answer::Multiple(ids) => ids,
                Answer::Single(id) => BTreeSet::from([id]),
                Answer::Unanswered => BTreeSet::new(),
            };
            if !selected.remove(option) {
                selected.insert(option.clone());
            }
            *slot = Answer::Multiple(selected);
        } else {
            *slot = Answer::Single(option.clone());
        }
        Ok(slot)
    }

    /// Look the question up in `bank` and record the selection.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` for unknown questions or options.
    pub fn record(
        &mut self,
        bank: &QuestionBank,
        question_id: &QuestionId,
        option: &OptionId,
    ) -> Result<&Answer, LedgerError> {
        let question = bank
            .get(question_id)
            .ok_or_else(|| LedgerError::UnknownQuestion(question_id.clone()))?;
        self.set_answer(question, option)
    }

    #[must_use]
    pub fn answer(&self, question_id: &QuestionId) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    #[must_use]
    pub fn is_answered(&self, question_id: &QuestionId) -> bool {
        self.answers
            .get(question_id)
            .is_some_and(Answer::is_answered)
    }

    #[must_use]
    pub fn all_answered(&self) -> bool {
        self.answers.values().all(Answer::is_answered)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| a.is_answered()).count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::assessment::{
        AnswerOption, AssessmentDraft, CorrectAnswer, QuestionDraft, QuestionKind, SecurityLevel,
    };
    use crate::model::ids::AssessmentId;

    fn bank() -> QuestionBank {
        let options = vec![
            AnswerOption::new("a", "A"),
            AnswerOption::new("b", "B"),
            AnswerOption::new("c", "C"),
        ];
        let assessment = AssessmentDraft {
            id: AssessmentId::new("quiz"),
            title: "Quiz".into(),
            description: String::new(),
            time_limit_seconds: 60,
            passing_score: 50,
            security_level: SecurityLevel::Low,
            questions: vec![
                QuestionDraft {
                    id: QuestionId::new("single"),
                    kind: QuestionKind::SingleChoice,
                    text: "One".into(),
                    options: options.clone(),
                    correct_answer: CorrectAnswer::Single(OptionId::new("a")),
                    points: 1,
                },
                QuestionDraft {
                    id: QuestionId::new("multi"),
                    kind: QuestionKind::MultiSelect,
                    text: "Many".into(),
                    options,
                    correct_answer: CorrectAnswer::multiple(["a", "c"]),
                    points: 2,
                },
            ],
        }
        .validate()
        .unwrap();
        QuestionBank::new(Arc::new(assessment))
    }

    #[test]
    fn starts_unanswered() {
        let bank = bank();
        let ledger = AnswerLedger::new(&bank);
        assert_eq!(
            ledger.answer(&QuestionId::new("single")),
            Some(&Answer::Unanswered)
        );
        assert!(!ledger.all_answered());
        assert_eq!(ledger.answered_count(), 0);
    }

    #[test]
    fn single_choice_replaces_answer() {
        let bank = bank();
        let mut ledger = AnswerLedger::new(&bank);
        let q = QuestionId::new("single");
        ledger.record(&bank, &q, &OptionId::new("a")).unwrap();
        ledger.record(&bank, &q, &OptionId::new("b")).unwrap();
        assert_eq!(ledger.answer(&q), Some(&Answer::Single(OptionId::new("b"))));
    }

    #[test]
    fn multi_select_toggles_membership() {
        let bank = bank();
        let mut ledger = AnswerLedger::new(&bank);
        let q = QuestionId::new("multi");
        ledger.record(&bank, &q, &OptionId::new("a")).unwrap();
        ledger.record(&bank, &q, &OptionId::new("c")).unwrap();
        assert!(ledger.is_answered(&q));

        ledger.record(&bank, &q, &OptionId::new("a")).unwrap();
        ledger.record(&bank, &q, &OptionId::new("c")).unwrap();
        assert_eq!(ledger.answer(&q), Some(&Answer::Multiple(BTreeSet::new())));
        assert!(!ledger.is_answered(&q));
    }

    #[test]
    fn all_answered_requires_every_question() {
        let bank = bank();
        let mut ledger = AnswerLedger::new(&bank);
        ledger
            .record(&bank, &QuestionId::new("single"), &OptionId::new("a"))
            .unwrap();
        assert!(!ledger.all_answered());
        ledger
            .record(&bank, &QuestionId::new("multi"), &OptionId::new("b"))
            .unwrap();
        assert!(ledger.all_answered());
    }

    #[test]
    fn rejects_unknown_question_and_option() {
        let bank = bank();
        let mut ledger = AnswerLedger::new(&bank);
        let err = ledger
            .record(&bank, &QuestionId::new("nope"), &OptionId::new("a"))
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownQuestion(QuestionId::new("nope")));

        let err = ledger
            .record(&bank, &QuestionId::new("single"), &OptionId::new("z"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownOption { .. }));
        assert_eq!(ledger.answered_count(), 0);
    }
}
