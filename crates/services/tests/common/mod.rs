#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use exam_core::model::{
    AnswerOption, Assessment, AssessmentDraft, AssessmentId, AssessmentOutcome, CorrectAnswer,
    CourseId, ModuleId, OptionId, QuestionDraft, QuestionId, QuestionKind, SecurityLevel,
};
use services::error::CapabilityError;
use services::proctoring::{CameraCapability, FaceDetector, VideoFrame, VideoStream};
use storage::repository::{InMemoryRepository, ProgressRepository, StorageError};
use tokio::sync::Notify;

pub const COURSE: &str = "rust-101";
pub const MODULE: &str = "ownership";

/// Five single-choice questions worth 10 points each; option "a" is correct.
pub fn five_question_assessment(security_level: SecurityLevel, time_limit_seconds: u32) -> Assessment {
    let questions = (1..=5)
        .map(|n| QuestionDraft {
            id: QuestionId::new(format!("q{n}")),
            kind: QuestionKind::SingleChoice,
            text: format!("Question {n}"),
            options: vec![AnswerOption::new("a", "Right"), AnswerOption::new("b", "Wrong")],
            correct_answer: CorrectAnswer::Single(OptionId::new("a")),
            points: 10,
        })
        .collect();
    AssessmentDraft {
        id: AssessmentId::new("ownership-quiz"),
        title: "Ownership quiz".into(),
        description: String::new(),
        time_limit_seconds,
        passing_score: 70,
        security_level,
        questions,
    }
    .validate()
    .unwrap()
}

pub fn question(n: usize) -> QuestionId {
    QuestionId::new(format!("q{n}"))
}

pub fn option(id: &str) -> OptionId {
    OptionId::new(id)
}

pub fn course() -> CourseId {
    CourseId::new(COURSE)
}

pub fn module() -> ModuleId {
    ModuleId::new(MODULE)
}

//
// ─── FAKE CAPABILITIES ─────────────────────────────────────────────────────────
//

struct FakeStream {
    released: Arc<AtomicUsize>,
}

impl VideoStream for FakeStream {
    fn current_frame(&mut self) -> Option<VideoFrame> {
        Some(VideoFrame {
            width: 2,
            height: 2,
            pixels: Arc::from(vec![0_u8; 4]),
        })
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Camera that grants a stream, or denies permission.
pub struct FakeCamera {
    deny: bool,
    pub requested: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self {
            deny: false,
            requested: Arc::default(),
            released: Arc::default(),
        })
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self {
            deny: true,
            requested: Arc::default(),
            released: Arc::default(),
        })
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraCapability for FakeCamera {
    async fn request_video_stream(&self) -> Result<Box<dyn VideoStream>, CapabilityError> {
        self.requested.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(CapabilityError::PermissionDenied);
        }
        Ok(Box::new(FakeStream {
            released: Arc::clone(&self.released),
        }))
    }
}

/// Detector reporting a configurable face count for every frame.
pub struct FakeDetector {
    faces: AtomicUsize,
    models_missing: bool,
}

impl FakeDetector {
    pub fn seeing(faces: usize) -> Arc<Self> {
        Arc::new(Self {
            faces: AtomicUsize::new(faces),
            models_missing: false,
        })
    }

    /// A detector whose models never load.
    pub fn without_models() -> Arc<Self> {
        Arc::new(Self {
            faces: AtomicUsize::new(1),
            models_missing: true,
        })
    }

    pub fn set_faces(&self, faces: usize) {
        self.faces.store(faces, Ordering::SeqCst);
    }
}

#[async_trait]
impl FaceDetector for FakeDetector {
    async fn load_models(&self) -> Result<(), CapabilityError> {
        if self.models_missing {
            return Err(CapabilityError::ModelLoad("weights not found".into()));
        }
        Ok(())
    }

    async fn detect_faces(&self, _frame: &VideoFrame) -> Result<usize, CapabilityError> {
        Ok(self.faces.load(Ordering::SeqCst))
    }
}

/// Detector that sees `faces`, but only answers once `release` is notified.
pub struct HeldDetector {
    faces: usize,
    pub started: AtomicUsize,
    pub release: Notify,
}

impl HeldDetector {
    pub fn seeing(faces: usize) -> Arc<Self> {
        Arc::new(Self {
            faces,
            started: AtomicUsize::new(0),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl FaceDetector for HeldDetector {
    async fn load_models(&self) -> Result<(), CapabilityError> {
        Ok(())
    }

    async fn detect_faces(&self, _frame: &VideoFrame) -> Result<usize, CapabilityError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(self.faces)
    }
}

/// Progress backend that is always offline.
#[derive(Default)]
pub struct OfflineProgress {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl ProgressRepository for OfflineProgress {
    async fn report_result(
        &self,
        _course_id: &CourseId,
        _module_id: &ModuleId,
        _outcome: &AssessmentOutcome,
    ) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Connection("progress service offline".into()))
    }
}

/// Progress backend that takes `delay` before recording into `inner`.
pub struct SlowProgress {
    pub delay: Duration,
    pub inner: InMemoryRepository,
    pub attempts: AtomicUsize,
}

impl SlowProgress {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            inner: InMemoryRepository::new(),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressRepository for SlowProgress {
    async fn report_result(
        &self,
        course_id: &CourseId,
        module_id: &ModuleId,
        outcome: &AssessmentOutcome,
    ) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.report_result(course_id, module_id, outcome).await
    }
}
