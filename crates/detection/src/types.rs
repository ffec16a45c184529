//! Frame and detection data carried through the pipeline.

use chrono::{DateTime, Utc};
use common::CameraId;
use serde::{Deserialize, Serialize};

/// A single captured camera frame.
///
/// `seq` is strictly monotonic per session and orders inference results:
/// a completion for an older frame never overwrites a newer one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub camera_id: CameraId,
    pub seq: u64,
    pub captured_at: DateTime<Utc>,
    pub data: Vec<u8>,
}

/// One detected object within a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    /// Bounding box as `[x, y, width, height]` in pixel coordinates.
    pub bbox: [f32; 4],
}

/// The most recent inference result for a camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    pub detections: Vec<Detection>,
    /// Sequence number of the frame the detections came from. Zero means
    /// no inference has completed yet for this session.
    pub seq: u64,
    pub as_of: DateTime<Utc>,
}

impl DetectionSnapshot {
    pub(crate) fn empty() -> Self {
        Self {
            detections: Vec::new(),
            seq: 0,
            as_of: Utc::now(),
        }
    }
}

/// A frame paired with the latest known detections, published on the
/// per-camera broadcast feed. Detections may lag the frame by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedFrame {
    pub frame: Frame,
    pub detections: Vec<Detection>,
}
