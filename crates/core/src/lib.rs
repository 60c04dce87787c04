#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod scoring;
pub mod security;
pub mod session;
pub mod time;

pub use error::Error;
pub use session::{ExamSession, SessionError, SessionPhase, SessionProgress};
pub use time::Clock;
