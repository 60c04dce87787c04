mod assessment;
mod bank;
mod ids;
mod ledger;
mod result;

pub use ids::{AssessmentId, CourseId, ModuleId, OptionId, ParseIdError, QuestionId, SessionId};

pub use assessment::{
    AnswerOption, Assessment, AssessmentDraft, AssessmentError, CorrectAnswer, Question,
    QuestionDraft, QuestionKind, SecurityLevel,
};
pub use bank::QuestionBank;
pub use ledger::{Answer, AnswerLedger, LedgerError};
pub use result::{AssessmentOutcome, FinishReason, SessionResult};
