use std::sync::{Arc, Weak};
use std::time::Duration;

use exam_core::security::{CAMERA_ADVISORY, IncidentKind};
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};

use super::capabilities::{CameraCapability, FaceDetector, StreamGuard};
use super::monitor::MonitorShared;
use crate::error::CapabilityError;

/// Camera source: acquire the stream, load detection models, then count faces
/// once per `poll` until the monitor stops.
///
/// The stream is held by a `StreamGuard`, so it is released on every exit,
/// including an abort while a detection is in flight.
pub(crate) async fn run(
    monitor: Weak<MonitorShared>,
    camera: Arc<dyn CameraCapability>,
    detector: Arc<dyn FaceDetector>,
    poll: Duration,
) {
    let stream = match camera.request_video_stream().await {
        Ok(stream) => stream,
        Err(err) => return disable(&monitor, &err),
    };
    let mut stream = StreamGuard::new(stream);

    if let Err(err) = detector.load_models().await {
        return disable(&monitor, &err);
    }
    if !is_live(&monitor) {
        return;
    }
    info!("camera monitoring active");

    let mut ticker = interval_at(Instant::now() + poll, poll);
    loop {
        ticker.tick().await;
        if !is_live(&monitor) {
            return;
        }
        let Some(frame) = stream.current_frame() else {
            continue;
        };

        let count = match detector.detect_faces(&frame).await {
            Ok(count) => count,
            Err(err) => {
                debug!(error = %err, "face detection failed for frame, skipping");
                continue;
            }
        };

        // The session may have finished while detection was running.
        let Some(shared) = monitor.upgrade() else {
            return;
        };
        if shared.is_stopped() {
            return;
        }
        if let Some(kind) = IncidentKind::from_face_count(count) {
            shared.record_incident(kind);
        }
    }
}

fn is_live(monitor: &Weak<MonitorShared>) -> bool {
    monitor.upgrade().is_some_and(|shared| !shared.is_stopped())
}

fn disable(monitor: &Weak<MonitorShared>, err: &CapabilityError) {
    info!(error = %err, "camera monitoring disabled");
    if let Some(shared) = monitor.upgrade() {
        shared.post_advisory(CAMERA_ADVISORY);
    }
}
