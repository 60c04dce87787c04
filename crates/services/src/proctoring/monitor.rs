use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use exam_core::model::SecurityLevel;
use exam_core::security::{IncidentKind, SecurityState, SecurityTransition};
use tokio::sync::watch;
use tracing::{Instrument, debug, info, warn};

use super::capabilities::ProctorSources;
use super::subscription::Subscription;
use super::{camera, visibility};
use crate::config::SessionConfig;

/// Called once, with the incident that crossed the threshold.
pub type ViolationHandler = Box<dyn FnOnce(IncidentKind) + Send>;

pub(crate) struct MonitorShared {
    state: watch::Sender<SecurityState>,
    stopped: AtomicBool,
    on_violation: Mutex<Option<ViolationHandler>>,
    warning_display: Duration,
    hide_timers: Mutex<Vec<Subscription>>,
}

impl MonitorShared {
    fn new(config: &SessionConfig, on_violation: ViolationHandler) -> Self {
        let (state, _) = watch::channel(SecurityState::new(config.violation_threshold));
        Self {
            state,
            stopped: AtomicBool::new(false),
            on_violation: Mutex::new(Some(on_violation)),
            warning_display: config.warning_display,
            hide_timers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn record_incident(self: &Arc<Self>, kind: IncidentKind) {
        if self.is_stopped() {
            debug!(?kind, "incident after monitor stop ignored");
            return;
        }

        let mut transition = None;
        self.state.send_if_modified(|state| {
            transition = state.record_incident(kind);
            transition.is_some()
        });

        match transition {
            Some(SecurityTransition::Warning { count, message_seq }) => {
                warn!(?kind, count, "security warning");
                self.schedule_hide(message_seq);
            }
            Some(SecurityTransition::Violation { count }) => {
                warn!(?kind, count, "security violation, forcing submission");
                let handler = self
                    .on_violation
                    .lock()
                    .ok()
                    .and_then(|mut slot| slot.take());
                if let Some(handler) = handler {
                    handler(kind);
                }
            }
            None => debug!(?kind, "incident ignored in violation state"),
        }
    }

    pub(crate) fn set_tab_visible(self: &Arc<Self>, visible: bool) {
        if self.is_stopped() {
            return;
        }
        let mut incident = None;
        self.state.send_if_modified(|state| {
            let before = state.tab_focused();
            incident = state.set_tab_visible(visible);
            before != state.tab_focused()
        });
        if let Some(kind) = incident {
            self.record_incident(kind);
        }
    }

    pub(crate) fn post_advisory(&self, text: &str) {
        if self.is_stopped() {
            return;
        }
        self.state.send_modify(|state| {
            state.post_advisory(text);
        });
    }

    fn schedule_hide(self: &Arc<Self>, seq: u64) {
        let weak = Arc::downgrade(self);
        let delay = self.warning_display;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared
                    .state
                    .send_if_modified(|state| state.hide_message(seq));
            }
        });
        if let Ok(mut timers) = self.hide_timers.lock() {
            timers.retain(|timer| !timer.is_finished());
            timers.push(Subscription::new("message-hide", task));
        }
    }
}

/// Composes the tab-focus and camera sources into one warning/violation state.
///
/// Every source runs as its own task, tracked as a subscription; `shutdown`
/// releases all of them, and dropping the monitor aborts them.
pub struct SecurityMonitor {
    shared: Arc<MonitorShared>,
    subscriptions: Vec<Subscription>,
}

impl SecurityMonitor {
    /// Start monitoring. Must be called inside a tokio runtime.
    ///
    /// The camera source only runs for levels above `Low`; if it is missing or
    /// fails to start, an advisory is published and monitoring continues
    /// without it.
    #[must_use]
    pub fn start(
        level: SecurityLevel,
        sources: ProctorSources,
        config: &SessionConfig,
        on_violation: ViolationHandler,
    ) -> Self {
        let shared = Arc::new(MonitorShared::new(config, on_violation));

        let mut subscriptions = Vec::with_capacity(2);
        let weak: Weak<MonitorShared> = Arc::downgrade(&shared);

        match sources.visibility {
            Some(receiver) => subscriptions.push(Subscription::new(
                "tab-focus",
                tokio::spawn(visibility::run(weak.clone(), receiver).in_current_span()),
            )),
            None => debug!("no visibility signal, tab-focus monitoring disabled"),
        }

        if level.requires_camera() {
            match (sources.camera, sources.face_detector) {
                (Some(camera), Some(detector)) => subscriptions.push(Subscription::new(
                    "camera",
                    tokio::spawn(
                        camera::run(weak, camera, detector, config.face_poll_interval)
                            .in_current_span(),
                    ),
                )),
                _ => {
                    info!("camera capability missing, face monitoring disabled");
                    shared.post_advisory(exam_core::security::CAMERA_ADVISORY);
                }
            }
        }

        Self {
            shared,
            subscriptions,
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SecurityState {
        self.shared.state.borrow().clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SecurityState> {
        self.shared.state.subscribe()
    }

    /// Feed an incident detected by some other host signal.
    pub fn report_incident(&self, kind: IncidentKind) {
        self.shared.record_incident(kind);
    }

    pub fn dismiss_message(&self) {
        self.shared.state.send_modify(SecurityState::dismiss_message);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Stop reacting to sources and abort their tasks. Idempotent.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        for subscription in &self.subscriptions {
            subscription.abort();
        }
        if let Ok(timers) = self.shared.hide_timers.lock() {
            for timer in timers.iter() {
                timer.abort();
            }
        }
    }

    /// Stop and wait until every source task, and the camera stream it owns,
    /// has been released.
    pub async fn shutdown(&mut self) {
        self.stop();
        for subscription in self.subscriptions.drain(..) {
            debug!(source = subscription.name(), "releasing monitor source");
            subscription.release().await;
        }
        let timers: Vec<Subscription> = self
            .shared
            .hide_timers
            .lock()
            .map(|mut timers| timers.drain(..).collect())
            .unwrap_or_default();
        for timer in timers {
            timer.release().await;
        }
    }
}

impl Drop for SecurityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
