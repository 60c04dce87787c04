#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod proctoring;
pub mod sessions;
pub mod timer;

pub use exam_core::Clock;

pub use config::SessionConfig;
pub use error::{CapabilityError, ControllerError};
pub use proctoring::{ProctorSources, SecurityMonitor};
pub use sessions::{
    AssessmentLauncher, Completion, SessionContext, SessionController, SessionDeps,
    SessionSnapshot,
};
pub use timer::{CountdownTimer, TimerEvent};
