use common::CameraId;
use thiserror::Error;

/// Errors surfaced by the detection pipeline.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("camera {camera_id} failed to open after {attempts} attempts")]
    CameraOpen { camera_id: CameraId, attempts: u32 },

    #[error("no active session for {0}")]
    SessionNotFound(CameraId),

    #[error("frame capture failed: {0}")]
    Capture(String),

    #[error("inference failed: {0}")]
    Inference(String),
}
