mod camera;
mod capabilities;
mod monitor;
mod subscription;
mod visibility;

pub use capabilities::{
    CameraCapability, FaceDetector, PageVisibility, ProctorSources, VideoFrame, VideoStream,
    VisibilityReceiver, VisibilitySender, visibility_channel,
};
pub use monitor::{SecurityMonitor, ViolationHandler};
