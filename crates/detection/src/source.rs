//! Camera and detector abstractions, plus in-memory implementations
//! used by the test suite.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::CameraId;

use crate::error::DetectionError;
use crate::types::{Detection, Frame};

/// Opens cameras by id.
#[async_trait]
pub trait CameraBackend: Send + Sync + 'static {
    type Capture: FrameCapture;

    /// Attempts to open the camera. Called once per retry attempt.
    async fn open(&self, camera_id: CameraId) -> Result<Self::Capture, DetectionError>;
}

/// A live capture handle producing raw frame bytes.
///
/// Dropping the handle releases the underlying device.
#[async_trait]
pub trait FrameCapture: Send + 'static {
    async fn read_frame(&mut self) -> Result<Vec<u8>, DetectionError>;
}

/// Runs object-detection inference on a frame.
#[async_trait]
pub trait Detector: Send + Sync + 'static {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectionError>;
}

/// In-memory camera producing frames at a fixed interval.
///
/// Supports failure injection for open attempts and read calls, and
/// tracks how many capture handles are currently live so tests can
/// assert that stopping a session releases the device.
#[derive(Clone)]
pub struct SyntheticCamera {
    inner: Arc<SyntheticCameraState>,
}

struct SyntheticCameraState {
    frame_interval: Duration,
    fail_opens: std::sync::Mutex<HashMap<CameraId, u32>>,
    open_count: AtomicU32,
    active_captures: AtomicU32,
    fail_reads_after: AtomicU32,
    paused: AtomicBool,
}

impl SyntheticCamera {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            inner: Arc::new(SyntheticCameraState {
                frame_interval,
                fail_opens: std::sync::Mutex::new(HashMap::new()),
                open_count: AtomicU32::new(0),
                active_captures: AtomicU32::new(0),
                fail_reads_after: AtomicU32::new(u32::MAX),
                paused: AtomicBool::new(false),
            }),
        }
    }

    /// The next `n` open attempts for `camera_id` will fail.
    pub fn fail_next_opens(&self, camera_id: CameraId, n: u32) {
        self.inner.fail_opens.lock().unwrap().insert(camera_id, n);
    }

    /// Blocks frame production until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes frame production after a [`pause`](Self::pause).
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    /// Every read after the first `n` will fail.
    pub fn fail_reads_after(&self, n: u32) {
        self.inner.fail_reads_after.store(n, Ordering::SeqCst);
    }

    /// Total open attempts that succeeded.
    pub fn open_count(&self) -> u32 {
        self.inner.open_count.load(Ordering::SeqCst)
    }

    /// Capture handles currently live.
    pub fn active_captures(&self) -> u32 {
        self.inner.active_captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraBackend for SyntheticCamera {
    type Capture = SyntheticCapture;

    async fn open(&self, camera_id: CameraId) -> Result<Self::Capture, DetectionError> {
        {
            let mut fail_opens = self.inner.fail_opens.lock().unwrap();
            if let Some(remaining) = fail_opens.get_mut(&camera_id) {
                if *remaining > 0 {
                    *remaining = remaining.saturating_sub(1);
                    return Err(DetectionError::Capture(format!("{camera_id} not ready")));
                }
            }
        }
        self.inner.open_count.fetch_add(1, Ordering::SeqCst);
        self.inner.active_captures.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticCapture {
            state: self.inner.clone(),
            reads: 0,
        })
    }
}

/// Capture handle for [`SyntheticCamera`].
pub struct SyntheticCapture {
    state: Arc<SyntheticCameraState>,
    reads: u32,
}

#[async_trait]
impl FrameCapture for SyntheticCapture {
    async fn read_frame(&mut self) -> Result<Vec<u8>, DetectionError> {
        tokio::time::sleep(self.state.frame_interval).await;
        while self.state.paused.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        if self.reads >= self.state.fail_reads_after.load(Ordering::SeqCst) {
            return Err(DetectionError::Capture("device disconnected".into()));
        }
        self.reads += 1;
        Ok(vec![0u8; 16])
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.state.active_captures.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Detector returning scripted results, with per-frame delay and failure
/// injection keyed by frame sequence number.
#[derive(Clone, Default)]
pub struct ScriptedDetector {
    inner: Arc<ScriptedDetectorState>,
}

#[derive(Default)]
struct ScriptedDetectorState {
    default_delay: std::sync::Mutex<Duration>,
    delays: std::sync::Mutex<HashMap<u64, Duration>>,
    fail_seqs: std::sync::Mutex<HashSet<u64>>,
    confidence: std::sync::Mutex<Option<f32>>,
    completed: AtomicU32,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every inference unless overridden per sequence.
    pub fn with_default_delay(self, delay: Duration) -> Self {
        *self.inner.default_delay.lock().unwrap() = delay;
        self
    }

    /// Overrides the inference delay for one frame sequence.
    pub fn delay_for(&self, seq: u64, delay: Duration) {
        self.inner.delays.lock().unwrap().insert(seq, delay);
    }

    /// Inference for the given frame sequence will fail.
    pub fn fail_for(&self, seq: u64) {
        self.inner.fail_seqs.lock().unwrap().insert(seq);
    }

    /// Confidence reported for every detection (default 0.9).
    pub fn with_confidence(self, confidence: f32) -> Self {
        *self.inner.confidence.lock().unwrap() = Some(confidence);
        self
    }

    /// Number of inference calls that have completed, success or failure.
    pub fn completed(&self) -> u32 {
        self.inner.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        let delay = self
            .inner
            .delays
            .lock()
            .unwrap()
            .get(&frame.seq)
            .copied()
            .unwrap_or(*self.inner.default_delay.lock().unwrap());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.inner.completed.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_seqs.lock().unwrap().contains(&frame.seq) {
            return Err(DetectionError::Inference(format!(
                "model error on frame {}",
                frame.seq
            )));
        }
        let confidence = self.inner.confidence.lock().unwrap().unwrap_or(0.9);
        Ok(vec![Detection {
            label: format!("frame-{}", frame.seq),
            confidence,
            bbox: [0.0, 0.0, 64.0, 64.0],
        }])
    }
}
