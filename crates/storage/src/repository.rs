use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{Assessment, AssessmentOutcome, CourseId, ModuleId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A reported assessment outcome for one module, as recorded by a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub outcome: AssessmentOutcome,
}

impl ProgressRecord {
    #[must_use]
    pub fn completed_date(&self) -> DateTime<Utc> {
        self.outcome.completed_date
    }
}

/// Resolves the assessment attached to a course module.
#[async_trait]
pub trait AssessmentRepository: Send + Sync {
    /// Fetch the assessment of a module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the module has no assessment, or other
    /// storage errors.
    async fn get_assessment(
        &self,
        course_id: &CourseId,
        module_id: &ModuleId,
    ) -> Result<Arc<Assessment>, StorageError>;
}

/// Receives the final outcome of an assessment session.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Record a completed assessment for a module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the outcome cannot be stored.
    async fn report_result(
        &self,
        course_id: &CourseId,
        module_id: &ModuleId,
        outcome: &AssessmentOutcome,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    assessments: Arc<Mutex<HashMap<(CourseId, ModuleId), Arc<Assessment>>>>,
    progress: Arc<Mutex<Vec<ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an assessment to a module, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn insert_assessment(
        &self,
        course_id: CourseId,
        module_id: ModuleId,
        assessment: Assessment,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .assessments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((course_id, module_id), Arc::new(assessment));
        Ok(())
    }

    /// Every outcome reported so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn reported(&self) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl AssessmentRepository for InMemoryRepository {
    async fn get_assessment(
        &self,
        course_id: &CourseId,
        module_id: &ModuleId,
    ) -> Result<Arc<Assessment>, StorageError> {
        let guard = self
            .assessments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&(course_id.clone(), module_id.clone()))
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn report_result(
        &self,
        course_id: &CourseId,
        module_id: &ModuleId,
        outcome: &AssessmentOutcome,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(ProgressRecord {
            course_id: course_id.clone(),
            module_id: module_id.clone(),
            outcome: outcome.clone(),
        });
        Ok(())
    }
}

/// Aggregates the collaborator repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub assessments: Arc<dyn AssessmentRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_repository(repo: InMemoryRepository) -> Self {
        let assessments: Arc<dyn AssessmentRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self {
            assessments,
            progress,
        }
    }
}
