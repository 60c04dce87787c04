mod controller;
mod launcher;
mod view;

pub use controller::{Completion, SessionContext, SessionController, SessionDeps};
pub use launcher::AssessmentLauncher;
pub use view::SessionSnapshot;
