use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AssessmentId, OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("assessment id cannot be empty")]
    BlankAssessmentId,

    #[error("assessment title cannot be empty")]
    EmptyTitle,

    #[error("time limit must be > 0 seconds")]
    InvalidTimeLimit,

    #[error("passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(u8),

    #[error("question id cannot be empty")]
    BlankQuestionId,

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(QuestionId),

    #[error("question {0} has no options")]
    NoOptions(QuestionId),

    #[error("question {question} has an option with an empty id")]
    BlankOptionId { question: QuestionId },

    #[error("question {question} repeats option {option}")]
    DuplicateOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {0} must be worth > 0 points")]
    InvalidPoints(QuestionId),

    #[error("correct answer for question {question} does not fit a {kind} question")]
    AnswerShapeMismatch {
        question: QuestionId,
        kind: QuestionKind,
    },

    #[error("correct answer for question {question} references unknown option {option}")]
    UnknownCorrectOption {
        question: QuestionId,
        option: OptionId,
    },
}

//
// ─── ENUMS ─────────────────────────────────────────────────────────────────────
//

/// How a question is answered and graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice,
    TrueFalse,
    MultiSelect,
}

impl QuestionKind {
    /// True for kinds whose answer is a set of options.
    #[must_use]
    pub fn is_multi(self) -> bool {
        matches!(self, QuestionKind::MultiSelect)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single-choice",
            QuestionKind::TrueFalse => "true-false",
            QuestionKind::MultiSelect => "multi-select",
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proctoring strictness requested by the assessment author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl SecurityLevel {
    /// Camera-based face monitoring runs for every level above `Low`.
    #[must_use]
    pub fn requires_camera(self) -> bool {
        !matches!(self, SecurityLevel::Low)
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A selectable answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
}

impl AnswerOption {
    #[must_use]
    pub fn new(id: impl Into<OptionId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// The answer key of a question.
///
/// Serialized untagged: a bare string for single answers, an array for sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Single(OptionId),
    Multiple(BTreeSet<OptionId>),
}

impl CorrectAnswer {
    /// Convenience constructor for a set answer key.
    pub fn multiple<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OptionId>,
    {
        Self::Multiple(ids.into_iter().map(Into::into).collect())
    }

    fn option_ids(&self) -> Vec<&OptionId> {
        match self {
            CorrectAnswer::Single(id) => vec![id],
            CorrectAnswer::Multiple(ids) => ids.iter().collect(),
        }
    }
}

/// Unvalidated question input, as found in catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub text: String,
    pub options: Vec<AnswerOption>,
    pub correct_answer: CorrectAnswer,
    pub points: u32,
}

impl QuestionDraft {
    /// Validate into an immutable `Question`.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` when ids are blank or repeated, points are zero,
    /// or the answer key does not fit the question kind and options.
    pub fn validate(self) -> Result<Question, AssessmentError> {
        if self.id.is_blank() {
            return Err(AssessmentError::BlankQuestionId);
        }
        if self.options.is_empty() {
            return Err(AssessmentError::NoOptions(self.id));
        }
        if self.points == 0 {
            return Err(AssessmentError::InvalidPoints(self.id));
        }

        let mut seen = HashSet::with_capacity(self.options.len());
        for option in &self.options {
            if option.id.is_blank() {
                return Err(AssessmentError::BlankOptionId { question: self.id });
            }
            if !seen.insert(&option.id) {
                return Err(AssessmentError::DuplicateOption {
                    option: option.id.clone(),
                    question: self.id,
                });
            }
        }

        let shape_ok = match (&self.correct_answer, self.kind.is_multi()) {
            (CorrectAnswer::Single(_), false) | (CorrectAnswer::Multiple(_), true) => true,
            _ => false,
        };
        if !shape_ok {
            return Err(AssessmentError::AnswerShapeMismatch {
                question: self.id,
                kind: self.kind,
            });
        }

        if let Some(unknown) = self
            .correct_answer
            .option_ids()
            .into_iter()
            .find(|id| !seen.contains(id))
        {
            return Err(AssessmentError::UnknownCorrectOption {
                option: unknown.clone(),
                question: self.id,
            });
        }

        Ok(Question {
            id: self.id,
            kind: self.kind,
            text: self.text,
            options: self.options,
            correct_answer: self.correct_answer,
            points: self.points,
        })
    }
}

/// A validated, immutable question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    id: QuestionId,
    #[serde(rename = "type")]
    kind: QuestionKind,
    text: String,
    options: Vec<AnswerOption>,
    correct_answer: CorrectAnswer,
    points: u32,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &CorrectAnswer {
        &self.correct_answer
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    /// True when `option` is one of this question's options.
    #[must_use]
    pub fn has_option(&self, option: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == option)
    }
}

//
// ─── ASSESSMENT ────────────────────────────────────────────────────────────────
//

/// Unvalidated assessment input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDraft {
    pub id: AssessmentId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time_limit_seconds: u32,
    pub passing_score: u8,
    #[serde(default)]
    pub security_level: SecurityLevel,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

impl AssessmentDraft {
    /// Validate into an immutable `Assessment`.
    ///
    /// An empty question list is accepted; such an assessment scores 0.
    ///
    /// # Errors
    ///
    /// Returns the first `AssessmentError` found.
    pub fn validate(self) -> Result<Assessment, AssessmentError> {
        if self.id.is_blank() {
            return Err(AssessmentError::BlankAssessmentId);
        }
        if self.title.trim().is_empty() {
            return Err(AssessmentError::EmptyTitle);
        }
        if self.time_limit_seconds == 0 {
            return Err(AssessmentError::InvalidTimeLimit);
        }
        if self.passing_score > 100 {
            return Err(AssessmentError::InvalidPassingScore(self.passing_score));
        }

        let mut ids = HashSet::with_capacity(self.questions.len());
        let mut questions = Vec::with_capacity(self.questions.len());
        for draft in self.questions {
            let question = draft.validate()?;
            if !ids.insert(question.id.clone()) {
                return Err(AssessmentError::DuplicateQuestion(question.id));
            }
            questions.push(question);
        }

        Ok(Assessment {
            id: self.id,
            title: self.title.trim().to_owned(),
            description: self.description,
            time_limit_seconds: self.time_limit_seconds,
            passing_score: self.passing_score,
            security_level: self.security_level,
            questions,
        })
    }
}

/// A validated assessment definition, supplied read-only to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "AssessmentDraft")]
pub struct Assessment {
    id: AssessmentId,
    title: String,
    description: String,
    time_limit_seconds: u32,
    passing_score: u8,
    security_level: SecurityLevel,
    questions: Vec<Question>,
}

impl TryFrom<AssessmentDraft> for Assessment {
    type Error = AssessmentError;

    fn try_from(draft: AssessmentDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl Assessment {
    #[must_use]
    pub fn id(&self) -> &AssessmentId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_seconds
    }

    #[must_use]
    pub fn passing_score(&self) -> u8 {
        self.passing_score
    }

    #[must_use]
    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<AnswerOption> {
        vec![
            AnswerOption::new("a", "A"),
            AnswerOption::new("b", "B"),
            AnswerOption::new("c", "C"),
        ]
    }

    fn single(id: &str) -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new(id),
            kind: QuestionKind::SingleChoice,
            text: format!("Question {id}"),
            options: options(),
            correct_answer: CorrectAnswer::Single(OptionId::new("a")),
            points: 10,
        }
    }

    fn draft(questions: Vec<QuestionDraft>) -> AssessmentDraft {
        AssessmentDraft {
            id: AssessmentId::new("quiz"),
            title: "Quiz".into(),
            description: String::new(),
            time_limit_seconds: 600,
            passing_score: 70,
            security_level: SecurityLevel::Medium,
            questions,
        }
    }

    #[test]
    fn validates_well_formed_assessment() {
        let assessment = draft(vec![single("q1"), single("q2")]).validate().unwrap();
        assert_eq!(assessment.questions().len(), 2);
        assert!(assessment.security_level().requires_camera());
    }

    #[test]
    fn rejects_zero_time_limit() {
        let mut d = draft(vec![single("q1")]);
        d.time_limit_seconds = 0;
        assert_eq!(d.validate().unwrap_err(), AssessmentError::InvalidTimeLimit);
    }

    #[test]
    fn rejects_passing_score_above_hundred() {
        let mut d = draft(vec![single("q1")]);
        d.passing_score = 101;
        assert_eq!(
            d.validate().unwrap_err(),
            AssessmentError::InvalidPassingScore(101)
        );
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let err = draft(vec![single("q1"), single("q1")]).validate().unwrap_err();
        assert_eq!(err, AssessmentError::DuplicateQuestion(QuestionId::new("q1")));
    }

    #[test]
    fn rejects_set_answer_on_single_choice() {
        let mut q = single("q1");
        q.correct_answer = CorrectAnswer::multiple(["a"]);
        let err = draft(vec![q]).validate().unwrap_err();
        assert!(matches!(err, AssessmentError::AnswerShapeMismatch { .. }));
    }

    #[test]
    fn rejects_answer_key_outside_options() {
        let mut q = single("q1");
        q.correct_answer = CorrectAnswer::Single(OptionId::new("z"));
        let err = draft(vec![q]).validate().unwrap_err();
        assert!(matches!(err, AssessmentError::UnknownCorrectOption { .. }));
    }

    #[test]
    fn accepts_empty_question_list_and_empty_multi_key() {
        assert!(draft(Vec::new()).validate().is_ok());

        let mut q = single("q1");
        q.kind = QuestionKind::MultiSelect;
        q.correct_answer = CorrectAnswer::Multiple(BTreeSet::new());
        assert!(draft(vec![q]).validate().is_ok());
    }

    #[test]
    fn deserializes_from_catalog_json() {
        let json = r#"{
            "id": "intro-quiz",
            "title": "Intro",
            "timeLimitSeconds": 300,
            "passingScore": 60,
            "securityLevel": "high",
            "questions": [
                {"id": "q1", "type": "true-false", "text": "Sky is blue",
                 "options": [{"id": "true", "text": "True"}, {"id": "false", "text": "False"}],
                 "correctAnswer": "true", "points": 5},
                {"id": "q2", "type": "multi-select", "text": "Pick primes",
                 "options": [{"id": "2", "text": "2"}, {"id": "4", "text": "4"}, {"id": "5", "text": "5"}],
                 "correctAnswer": ["2", "5"], "points": 10}
            ]
        }"#;
        let assessment: Assessment = serde_json::from_str(json).unwrap();
        assert_eq!(assessment.security_level(), SecurityLevel::High);
        assert_eq!(assessment.questions()[0].kind(), QuestionKind::TrueFalse);
        assert_eq!(
            assessment.questions()[1].correct_answer(),
            &CorrectAnswer::multiple(["2", "5"])
        );
    }

    #[test]
    fn invalid_catalog_json_is_rejected() {
        let json = r#"{"id": "x", "title": "X", "timeLimitSeconds": 0, "passingScore": 50}"#;
        assert!(serde_json::from_str::<Assessment>(json).is_err());
    }
}
