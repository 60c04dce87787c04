//! Integrity warning/violation state machine.
//!
//! Incident sources (tab focus, camera face counts) live in the services crate;
//! this module only decides what an incident does to the state.

use serde::{Deserialize, Serialize};

/// Default number of incidents that terminates a session.
pub const DEFAULT_VIOLATION_THRESHOLD: u32 = 2;

/// Advisory shown when camera monitoring cannot start.
pub const CAMERA_ADVISORY: &str =
    "Camera monitoring is unavailable. Please enable your camera to continue.";

/// Kinds of detected integrity incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    TabSwitch,
    NoFace,
    MultipleFaces,
}

impl IncidentKind {
    /// Human-readable reason used in warning messages.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            IncidentKind::TabSwitch => "Tab switching detected",
            IncidentKind::NoFace => "No face detected",
            IncidentKind::MultipleFaces => "Multiple faces detected",
        }
    }

    /// Incident raised for a face-detection result, if any.
    #[must_use]
    pub fn from_face_count(count: usize) -> Option<Self> {
        match count {
            0 => Some(IncidentKind::NoFace),
            1 => None,
            _ => Some(IncidentKind::MultipleFaces),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityStatus {
    #[default]
    Secure,
    Warning,
    Violation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Advisory,
    Warning,
    Termination,
}

/// Most recent message published by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityMessage {
    pub text: String,
    pub kind: MessageKind,
    pub visible: bool,
    /// Monotonic sequence number; lets delayed hide requests skip newer messages.
    pub seq: u64,
}

/// Outcome of applying an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityTransition {
    /// Below threshold; carries the new count and the published message's sequence.
    Warning { count: u32, message_seq: u64 },
    /// Threshold reached. Emitted once per state.
    Violation { count: u32 },
}

/// Warning/violation state of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityState {
    status: SecurityStatus,
    warning_count: u32,
    tab_focused: bool,
    message: Option<SecurityMessage>,
    threshold: u32,
    next_seq: u64,
}

impl Default for SecurityState {
    fn default() -> Self {
        Self::new(DEFAULT_VIOLATION_THRESHOLD)
    }
}

impl SecurityState {
    /// A secure state terminating at `threshold` incidents (at least 1).
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            status: SecurityStatus::Secure,
            warning_count: 0,
            tab_focused: true,
            message: None,
            threshold: threshold.max(1),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn status(&self) -> SecurityStatus {
        self.status
    }

    #[must_use]
    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn tab_focused(&self) -> bool {
        self.tab_focused
    }

    #[must_use]
    pub fn message(&self) -> Option<&SecurityMessage> {
        self.message.as_ref()
    }

    #[must_use]
    pub fn is_violation(&self) -> bool {
        self.status == SecurityStatus::Violation
    }

    /// Apply an incident. Returns `None` once the state is in violation.
    pub fn record_incident(&mut self, kind: IncidentKind) -> Option<SecurityTransition> {
        if self.is_violation() {
            return None;
        }

        self.warning_count = (self.warning_count + 1).min(self.threshold);
        let count = self.warning_count;

        if count >= self.threshold {
            self.status = SecurityStatus::Violation;
            self.publish(
                format!(
                    "Assessment terminated: {}. Maximum security violations reached.",
                    kind.reason()
                ),
                MessageKind::Termination,
            );
            return Some(SecurityTransition::Violation { count });
        }

        self.status = SecurityStatus::Warning;
        let message_seq = self.publish(
            format!(
                "Warning {count}/{}: {}. Continued violations will terminate the assessment.",
                self.threshold,
                kind.reason()
            ),
            MessageKind::Warning,
        );
        Some(SecurityTransition::Warning { count, message_seq })
    }

    /// Track page visibility. A visible-to-hidden change yields `TabSwitch`.
    pub fn set_tab_visible(&mut self, visible: bool) -> Option<IncidentKind> {
        if visible {
            self.tab_focused = true;
            return None;
        }
        if self.tab_focused {
            self.tab_focused = false;
            return Some(IncidentKind::TabSwitch);
        }
        None
    }

    /// Publish a non-blocking advisory. Does not touch status or count.
    pub fn post_advisory(&mut self, text: impl Into<String>) -> u64 {
        self.publish(text.into(), MessageKind::Advisory)
    }

    /// Hide the message with sequence `seq` if it is still the current one.
    pub fn hide_message(&mut self, seq: u64) -> bool {
        match self.message.as_mut() {
            Some(message) if message.seq == seq && message.visible => {
                message.visible = false;
                true
            }
            _ => false,
        }
    }

    pub fn dismiss_message(&mut self) {
        if let Some(message) = self.message.as_mut() {
            message.visible = false;
        }
    }

    fn publish(&mut self, text: String, kind: MessageKind) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.message = Some(SecurityMessage {
            text,
            kind,
            visible: true,
            seq,
        });
        seq
    }
}
