use std::time::Duration;

use exam_core::security::DEFAULT_VIOLATION_THRESHOLD;

/// Timing and policy knobs of a proctored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Period of the countdown; each tick removes one second.
    pub tick_interval: Duration,
    /// Period of camera face-detection polling.
    pub face_poll_interval: Duration,
    /// How long a warning message stays visible.
    pub warning_display: Duration,
    /// Incidents that terminate the session.
    pub violation_threshold: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            face_poll_interval: Duration::from_secs(1),
            warning_display: Duration::from_secs(5),
            violation_threshold: DEFAULT_VIOLATION_THRESHOLD,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    #[must_use]
    pub fn with_face_poll_interval(mut self, face_poll_interval: Duration) -> Self {
        self.face_poll_interval = face_poll_interval;
        self
    }

    #[must_use]
    pub fn with_warning_display(mut self, warning_display: Duration) -> Self {
        self.warning_display = warning_display;
        self
    }

    /// Values below 1 are raised to 1.
    #[must_use]
    pub fn with_violation_threshold(mut self, threshold: u32) -> Self {
        self.violation_threshold = threshold.max(1);
        self
    }
}
