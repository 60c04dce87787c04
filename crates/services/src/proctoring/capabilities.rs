//! Host-environment capabilities consumed by the security monitor.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CapabilityError;

/// Page visibility as pushed by the host on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVisibility {
    Visible,
    Hidden,
}

impl PageVisibility {
    #[must_use]
    pub fn is_visible(self) -> bool {
        matches!(self, PageVisibility::Visible)
    }
}

/// Sending half kept by the host; dropping it ends tab-focus monitoring.
pub type VisibilitySender = mpsc::UnboundedSender<PageVisibility>;
pub type VisibilityReceiver = mpsc::UnboundedReceiver<PageVisibility>;

/// A lossless channel for visibility changes.
#[must_use]
pub fn visibility_channel() -> (VisibilitySender, VisibilityReceiver) {
    mpsc::unbounded_channel()
}

/// Opaque video frame handed to the face detector.
#[derive(Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// A live camera stream. Owned exclusively by the monitor.
pub trait VideoStream: Send {
    /// The most recent frame, or `None` if the stream has not produced one yet.
    fn current_frame(&mut self) -> Option<VideoFrame>;

    /// Stop capture and release the device.
    fn release(&mut self);
}

#[async_trait]
pub trait CameraCapability: Send + Sync {
    /// Ask the host for a video stream.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError` if permission is denied or no camera exists.
    async fn request_video_stream(&self) -> Result<Box<dyn VideoStream>, CapabilityError>;
}

#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Load detection models.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::ModelLoad` if the models are unavailable.
    async fn load_models(&self) -> Result<(), CapabilityError>;

    /// Count faces in a frame.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::Detection` if the frame cannot be analysed.
    async fn detect_faces(&self, frame: &VideoFrame) -> Result<usize, CapabilityError>;
}

/// Releases the wrapped stream when dropped, including when the owning task
/// is aborted mid-await.
pub(crate) struct StreamGuard {
    stream: Box<dyn VideoStream>,
}

impl StreamGuard {
    pub(crate) fn new(stream: Box<dyn VideoStream>) -> Self {
        Self { stream }
    }

    pub(crate) fn current_frame(&mut self) -> Option<VideoFrame> {
        self.stream.current_frame()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.stream.release();
    }
}

/// Everything the monitor may subscribe to. Missing entries disable that source.
#[derive(Default)]
pub struct ProctorSources {
    pub visibility: Option<VisibilityReceiver>,
    pub camera: Option<Arc<dyn CameraCapability>>,
    pub face_detector: Option<Arc<dyn FaceDetector>>,
}

impl ProctorSources {
    #[must_use]
    pub fn with_visibility(mut self, visibility: VisibilityReceiver) -> Self {
        self.visibility = Some(visibility);
        self
    }

    #[must_use]
    pub fn with_camera(
        mut self,
        camera: Arc<dyn CameraCapability>,
        face_detector: Arc<dyn FaceDetector>,
    ) -> Self {
        self.camera = Some(camera);
        self.face_detector = Some(face_detector);
        self
    }
}

impl fmt::Debug for ProctorSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProctorSources")
            .field("visibility", &self.visibility.is_some())
            .field("camera", &self.camera.is_some())
            .field("face_detector", &self.face_detector.is_some())
            .finish()
    }
}
