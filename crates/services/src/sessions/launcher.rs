use std::sync::Arc;

use exam_core::model::{CourseId, ModuleId};
use storage::repository::{AssessmentRepository, ProgressRepository, Storage};
use tracing::info;

use super::controller::{SessionContext, SessionController, SessionDeps};
use crate::Clock;
use crate::config::SessionConfig;
use crate::error::ControllerError;
use crate::proctoring::ProctorSources;

/// Resolves the assessment for a course module and starts a controller for it.
#[derive(Clone)]
pub struct AssessmentLauncher {
    clock: Clock,
    config: SessionConfig,
    assessments: Arc<dyn AssessmentRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl AssessmentLauncher {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            config: SessionConfig::default(),
            assessments: Arc::clone(&storage.assessments),
            progress: Arc::clone(&storage.progress),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Load the module's assessment and start a session for it.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Storage` if the assessment cannot be
    /// resolved; no timer or monitor is started in that case.
    pub async fn launch(
        &self,
        course_id: CourseId,
        module_id: ModuleId,
        sources: ProctorSources,
    ) -> Result<SessionController, ControllerError> {
        let assessment = self
            .assessments
            .get_assessment(&course_id, &module_id)
            .await?;
        info!(
            course = %course_id,
            module = %module_id,
            assessment = %assessment.id(),
            questions = assessment.questions().len(),
            "assessment resolved"
        );

        SessionController::start(
            assessment,
            SessionContext::new(course_id, module_id),
            SessionDeps {
                clock: self.clock,
                progress: Arc::clone(&self.progress),
                sources,
            },
            &self.config,
        )
    }
}
