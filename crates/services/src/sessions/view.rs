use exam_core::model::{Answer, Question, SessionId, SessionResult};
use exam_core::security::SecurityState;
use exam_core::{SessionPhase, SessionProgress};

/// Read-only view of a running or finished session.
///
/// Carries everything a host needs to render the attempt. The countdown is
/// the only pre-formatted field; other presentation is left to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub phase: SessionPhase,

    pub current_index: usize,
    pub current_question: Option<Question>,
    pub current_answer: Option<Answer>,

    pub time_remaining: u32,
    /// `MM:SS`
    pub countdown: String,

    pub progress: SessionProgress,
    pub can_submit: bool,
    pub security: SecurityState,

    pub result: Option<SessionResult>,
    /// Set when reporting the result failed; the session is still finished.
    pub report_error: Option<String>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }
}
