//! Real-time camera detection pipeline.
//!
//! Each open camera runs one capture loop that pushes frames into a small
//! bounded queue with a non-blocking insert; a fixed-size worker pool pulls
//! from the queue and runs object-detection inference, overwriting a single
//! "latest result" slot per camera. Capture never stalls waiting on
//! inference — detection is deliberately sampled relative to frame rate.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod source;
pub mod types;

pub use config::DetectionConfig;
pub use error::DetectionError;
pub use pipeline::DetectionPipeline;
pub use registry::{SessionRegistry, SessionState};
pub use source::{CameraBackend, Detector, FrameCapture, ScriptedDetector, SyntheticCamera};
pub use types::{AnnotatedFrame, Detection, DetectionSnapshot, Frame};

/// Convenience type alias for detection results.
pub type Result<T> = std::result::Result<T, DetectionError>;
