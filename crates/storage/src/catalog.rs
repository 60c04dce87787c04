//! JSON fixture catalog: courses, their modules, and module assessments.

use std::path::Path;

use exam_core::model::{Assessment, CourseId, ModuleId};
use serde::Deserialize;

use crate::repository::{InMemoryRepository, Storage, StorageError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    courses: Vec<CourseEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseEntry {
    id: CourseId,
    #[serde(default)]
    modules: Vec<ModuleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleEntry {
    id: ModuleId,
    #[serde(default)]
    assessment: Option<Assessment>,
}

/// Parse a catalog document into an in-memory repository.
///
/// Modules without an assessment are skipped.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed JSON or invalid
/// assessments.
pub fn parse_catalog(json: &str) -> Result<InMemoryRepository, StorageError> {
    let file: CatalogFile =
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;

    let repo = InMemoryRepository::new();
    for course in file.courses {
        for module in course.modules {
            if let Some(assessment) = module.assessment {
                repo.insert_assessment(course.id.clone(), module.id, assessment)?;
            }
        }
    }
    Ok(repo)
}

/// Read and parse a catalog file.
///
/// # Errors
///
/// Returns `StorageError::Io` if the file cannot be read, or parse errors.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<InMemoryRepository, StorageError> {
    let raw = std::fs::read_to_string(path)?;
    parse_catalog(&raw)
}

impl Storage {
    /// Build a `Storage` whose assessments come from a catalog file and whose
    /// progress reports are kept in memory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be loaded.
    pub fn from_catalog(path: impl AsRef<Path>) -> Result<(Self, InMemoryRepository), StorageError> {
        let repo = load_catalog(path)?;
        Ok((Self::from_repository(repo.clone()), repo))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::repository::AssessmentRepository;

    const CATALOG: &str = r#"{
        "courses": [{
            "id": "rust-101",
            "modules": [
                {"id": "intro"},
                {"id": "ownership", "assessment": {
                    "id": "ownership-quiz",
                    "title": "Ownership",
                    "timeLimitSeconds": 120,
                    "passingScore": 70,
                    "securityLevel": "medium",
                    "questions": [{
                        "id": "q1", "type": "single-choice", "text": "Who owns a value?",
                        "options": [{"id": "a", "text": "One owner"}, {"id": "b", "text": "Everyone"}],
                        "correctAnswer": "a", "points": 10
                    }]
                }}
            ]
        }]
    }"#;

    #[tokio::test]
    async fn parses_modules_with_assessments() {
        let repo = parse_catalog(CATALOG).unwrap();
        let found = repo
            .get_assessment(&"rust-101".into(), &"ownership".into())
            .await
            .unwrap();
        assert_eq!(found.questions().len(), 1);

        let missing = repo
            .get_assessment(&"rust-101".into(), &"intro".into())
            .await;
        assert!(matches!(missing, Err(StorageError::NotFound)));
    }

    #[test]
    fn invalid_assessment_is_a_serialization_error() {
        let broken = CATALOG.replace("\"timeLimitSeconds\": 120", "\"timeLimitSeconds\": 0");
        assert!(matches!(
            parse_catalog(&broken),
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn loads_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let (storage, _repo) = Storage::from_catalog(file.path()).unwrap();
        let found = storage
            .assessments
            .get_assessment(&"rust-101".into(), &"ownership".into())
            .await
            .unwrap();
        assert_eq!(found.title(), "Ownership");
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_catalog("/definitely/not/here.json");
        assert!(matches!(result, Err(StorageError::Io(_))));
    }
}
