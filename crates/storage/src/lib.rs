#![forbid(unsafe_code)]

pub mod catalog;
pub mod repository;

pub use catalog::{load_catalog, parse_catalog};
pub use repository::{
    AssessmentRepository, InMemoryRepository, ProgressRecord, ProgressRepository, Storage,
    StorageError,
};
