//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::{SessionError, SessionPhase};
use storage::repository::StorageError;

/// Failures acquiring or using a host capability. Never fatal to a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CapabilityError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    #[error("failed to load detection models: {0}")]
    ModelLoad(String),
    #[error("face detection failed: {0}")]
    Detection(String),
}

/// Errors emitted by the session controller and launcher.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("session state lock poisoned")]
    StatePoisoned,
    #[error("session was torn down before finishing (phase: {0})")]
    NotFinished(SessionPhase),
    #[error("finalize task ended without completing")]
    FinalizeAborted,
}
