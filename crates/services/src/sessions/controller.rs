use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use exam_core::model::{
    Answer, Assessment, AssessmentOutcome, CourseId, FinishReason, ModuleId, OptionId,
    QuestionId, SessionId, SessionResult,
};
use exam_core::security::{IncidentKind, SecurityState};
use exam_core::time::format_countdown;
use exam_core::{Clock, ExamSession, SessionPhase};
use storage::repository::{ProgressRepository, StorageError};
use tokio::sync::watch;
use tracing::{Instrument, Span, debug, error, info, info_span};

use super::view::SessionSnapshot;
use crate::config::SessionConfig;
use crate::error::ControllerError;
use crate::proctoring::{ProctorSources, SecurityMonitor, ViolationHandler};
use crate::timer::{CountdownTimer, TimerEvent};

//
// ─── CONTEXT ───────────────────────────────────────────────────────────────────
//

/// Where the attempt belongs in the course catalog; used when reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub course_id: CourseId,
    pub module_id: ModuleId,
}

impl SessionContext {
    #[must_use]
    pub fn new(course_id: CourseId, module_id: ModuleId) -> Self {
        Self {
            course_id,
            module_id,
        }
    }
}

/// Collaborators a session needs besides the assessment itself.
pub struct SessionDeps {
    pub clock: Clock,
    pub progress: Arc<dyn ProgressRepository>,
    pub sources: ProctorSources,
}

/// Outcome of the single successful finalize call.
#[derive(Debug)]
pub struct Completion {
    pub result: SessionResult,
    /// The reporting collaborator's answer. The session is already `Finished`
    /// when it arrives; a failure does not undo the result.
    pub report: Result<(), StorageError>,
}

//
// ─── SHARED STATE ──────────────────────────────────────────────────────────────
//

struct SessionResources {
    timer: CountdownTimer,
    monitor: SecurityMonitor,
}

struct ControllerShared {
    id: SessionId,
    context: SessionContext,
    clock: Clock,
    session: Mutex<ExamSession>,
    resources: Mutex<Option<SessionResources>>,
    phase: watch::Sender<SessionPhase>,
    security: watch::Receiver<SecurityState>,
    progress: Arc<dyn ProgressRepository>,
    report_error: Mutex<Option<String>>,
    torn_down: AtomicBool,
    span: Span,
}

impl ControllerShared {
    fn lock_session(&self) -> Result<MutexGuard<'_, ExamSession>, ControllerError> {
        self.session
            .lock()
            .map_err(|_| ControllerError::StatePoisoned)
    }

    fn on_timer(self: &Arc<Self>, event: TimerEvent) {
        match event {
            TimerEvent::Tick(remaining) => {
                let applied = self
                    .lock_session()
                    .map(|mut session| session.sync_time(remaining))
                    .unwrap_or(false);
                if !applied {
                    debug!(parent: &self.span, remaining, "tick after active phase ignored");
                }
            }
            TimerEvent::Expired => {
                info!(parent: &self.span, "time expired");
                spawn_forced_finalize(Arc::downgrade(self), FinishReason::TimeExpired);
            }
        }
    }

    fn take_resources(&self) -> Option<SessionResources> {
        self.resources.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Everything after the finalize latch. Runs detached from the caller.
    async fn complete(self: Arc<Self>) -> Result<Completion, ControllerError> {
        self.release_resources().await;

        let result = {
            let mut session = self.lock_session()?;
            let result = session.grade(self.clock.now())?;
            session.finish(result.clone())?;
            result
        };
        self.phase.send_replace(SessionPhase::Finished);
        info!(
            score = result.score_percent,
            passed = result.passed,
            seconds_used = result.seconds_used,
            "session finished"
        );

        let outcome = AssessmentOutcome::from(&result);
        let report = self
            .progress
            .report_result(&self.context.course_id, &self.context.module_id, &outcome)
            .await;
        match &report {
            Ok(()) => debug!("assessment result reported"),
            Err(err) => {
                error!(error = %err, "failed to report assessment result");
                if let Ok(mut slot) = self.report_error.lock() {
                    *slot = Some(err.to_string());
                }
            }
        }

        Ok(Completion { result, report })
    }

    async fn release_resources(&self) {
        if let Some(mut resources) = self.take_resources() {
            resources.timer.shutdown().await;
            resources.monitor.shutdown().await;
            debug!(parent: &self.span, "timer and monitor released");
        }
    }
}

fn spawn_forced_finalize(shared: Weak<ControllerShared>, reason: FinishReason) {
    let Some(strong) = shared.upgrade() else {
        return;
    };
    let span = strong.span.clone();
    drop(strong);
    tokio::spawn(
        async move {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let controller = SessionController { shared };
            if let Err(err) = controller.finalize(reason).await {
                debug!(?reason, error = %err, "forced finalize skipped");
            }
        }
        .instrument(span),
    );
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Runs one proctored attempt: answers, navigation, countdown, monitoring,
/// and a single finalize that grades and reports the result.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<ControllerShared>,
}

impl SessionController {
    /// Activate a session for a resolved assessment and start its countdown
    /// and security monitor. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError` if the session cannot be activated.
    pub fn start(
        assessment: Arc<Assessment>,
        context: SessionContext,
        deps: SessionDeps,
        config: &SessionConfig,
    ) -> Result<Self, ControllerError> {
        let id = SessionId::generate();
        let span = info_span!(
            "assessment_session",
            session_id = %id,
            assessment = %assessment.id(),
            course = %context.course_id,
            module = %context.module_id,
        );
        let level = assessment.security_level();
        let time_limit = assessment.time_limit_seconds();

        let mut session = ExamSession::new(assessment);
        session.activate()?;
        let (phase, _) = watch::channel(SessionPhase::Active);

        let shared = Arc::new_cyclic(|weak: &Weak<ControllerShared>| {
            let on_violation: ViolationHandler = {
                let weak = weak.clone();
                Box::new(move |kind: IncidentKind| {
                    debug!(?kind, "violation threshold reached");
                    spawn_forced_finalize(weak, FinishReason::SecurityViolation);
                })
            };
            let on_timer = {
                let weak = weak.clone();
                move |event: TimerEvent| {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_timer(event);
                    }
                }
            };

            let (monitor, timer) = {
                let _entered = span.enter();
                let monitor = SecurityMonitor::start(level, deps.sources, config, on_violation);
                let timer = CountdownTimer::start(time_limit, config.tick_interval, on_timer);
                (monitor, timer)
            };

            ControllerShared {
                id,
                context,
                clock: deps.clock,
                session: Mutex::new(session),
                security: monitor.subscribe(),
                resources: Mutex::new(Some(SessionResources { timer, monitor })),
                phase,
                progress: deps.progress,
                report_error: Mutex::new(None),
                torn_down: AtomicBool::new(false),
                span,
            }
        });

        info!(parent: &shared.span, time_limit, ?level, "session active");
        Ok(Self { shared })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.shared.context
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.shared.phase.borrow()
    }

    /// Receive every phase change.
    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.shared.phase.subscribe()
    }

    /// Current security state; stays readable after the monitor is released.
    #[must_use]
    pub fn security(&self) -> SecurityState {
        self.shared.security.borrow().clone()
    }

    /// Receive every security state change.
    #[must_use]
    pub fn subscribe_security(&self) -> watch::Receiver<SecurityState> {
        self.shared.security.clone()
    }

    /// Hide the current security message.
    pub fn dismiss_security_message(&self) {
        if let Ok(slot) = self.shared.resources.lock() {
            if let Some(resources) = slot.as_ref() {
                resources.monitor.dismiss_message();
            }
        }
    }

    /// Record a selection for a question.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Session` if the session is not active or the
    /// ids are unknown.
    pub fn answer(
        &self,
        question_id: &QuestionId,
        option: &OptionId,
    ) -> Result<Answer, ControllerError> {
        let mut session = self.shared.lock_session()?;
        let answer = session.answer(question_id, option)?.clone();
        debug!(parent: &self.shared.span, question = %question_id, option = %option, "answer recorded");
        Ok(answer)
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Session` if the session is not active.
    pub fn go_to(&self, index: usize) -> Result<usize, ControllerError> {
        Ok(self.shared.lock_session()?.go_to(index)?)
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Session` if the session is not active.
    pub fn next(&self) -> Result<usize, ControllerError> {
        Ok(self.shared.lock_session()?.next()?)
    }

    /// # Errors
    ///
    /// Returns `ControllerError::Session` if the session is not active.
    pub fn previous(&self) -> Result<usize, ControllerError> {
        Ok(self.shared.lock_session()?.previous()?)
    }

    /// Manual submission; accepted only when every question is answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Unanswered` while answers are missing, or the
    /// latch errors of [`SessionController::finalize`].
    pub async fn submit(&self) -> Result<Completion, ControllerError> {
        self.finalize(FinishReason::Submitted).await
    }

    /// The single finalize path shared by manual submit, timeout and violation.
    ///
    /// Only the first caller passes the latch. The rest runs on its own task,
    /// so dropping the returned future cannot strand the session: the timer
    /// and monitor are released, the ledger is graded, the session moves to
    /// `Finished`, and the result is reported once. A reporting failure is
    /// returned in `Completion::report` and does not revert the phase.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyFinalizing` or `SessionError::Completed` for
    /// every caller after the first.
    pub async fn finalize(&self, reason: FinishReason) -> Result<Completion, ControllerError> {
        let shared = &self.shared;
        {
            let mut session = shared.lock_session()?;
            if let Err(err) = session.begin_finalize(reason) {
                debug!(parent: &shared.span, ?reason, error = %err, "finalize rejected");
                return Err(err.into());
            }
        }
        shared.phase.send_replace(SessionPhase::Submitting);
        info!(parent: &shared.span, ?reason, "submitting");

        let task = tokio::spawn(
            Arc::clone(shared)
                .complete()
                .instrument(shared.span.clone()),
        );
        task.await.map_err(|_| ControllerError::FinalizeAborted)?
    }

    /// Wait until the session reaches `Finished` by any path.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NotFinished` if the session was torn down
    /// while still active.
    pub async fn finished(&self) -> Result<SessionResult, ControllerError> {
        let mut phases = self.subscribe_phase();
        loop {
            let phase = *phases.borrow_and_update();
            if phase == SessionPhase::Finished {
                break;
            }
            if phase == SessionPhase::Active && self.shared.torn_down.load(Ordering::Acquire) {
                return Err(ControllerError::NotFinished(phase));
            }
            if phases.changed().await.is_err() {
                break;
            }
        }
        let session = self.shared.lock_session()?;
        session
            .result()
            .cloned()
            .ok_or(ControllerError::NotFinished(session.phase()))
    }

    /// Release the timer and monitor without finalizing, e.g. when the host
    /// view goes away mid-attempt. Safe to call on any path and repeatedly.
    ///
    /// Pending [`SessionController::finished`] calls on an active session
    /// resolve with `ControllerError::NotFinished`.
    pub async fn teardown(&self) {
        self.shared.torn_down.store(true, Ordering::Release);
        self.shared.release_resources().await;
        self.shared.phase.send_modify(|_| {});
    }

    /// Read-only view for rendering.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::StatePoisoned` if the session state is unreadable.
    pub fn snapshot(&self) -> Result<SessionSnapshot, ControllerError> {
        let session = self.shared.lock_session()?;
        let report_error = self
            .shared
            .report_error
            .lock()
            .ok()
            .and_then(|slot| slot.clone());
        Ok(SessionSnapshot {
            session_id: self.shared.id,
            phase: session.phase(),
            current_index: session.current_index(),
            current_question: session.current_question().cloned(),
            current_answer: session
                .current_question()
                .and_then(|q| session.ledger().answer(q.id()).cloned()),
            time_remaining: session.time_remaining(),
            countdown: format_countdown(session.time_remaining()),
            progress: session.progress(),
            can_submit: session.can_submit(),
            security: self.security(),
            result: session.result().cloned(),
            report_error,
        })
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.shared.id)
            .field("context", &self.shared.context)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
