//! Capture and inference pipeline.
//!
//! One capture loop per open camera pushes frames into a shared bounded
//! queue with a non-blocking insert; when the queue is full the frame is
//! dropped and counted. A fixed pool of inference workers drains the
//! queue and overwrites the per-camera latest-result slot. Slot writes
//! are guarded twice: a completion must carry the slot's session
//! generation (re-opening a camera bumps it, so in-flight work from a
//! torn-down session is discarded) and a frame sequence newer than the
//! slot's (so a slow inference for an old frame can never clobber the
//! result of a newer one).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use common::CameraId;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::DetectionConfig;
use crate::error::DetectionError;
use crate::registry::{SessionHandle, SessionRegistry, SessionState};
use crate::source::{CameraBackend, Detector, FrameCapture};
use crate::types::{AnnotatedFrame, DetectionSnapshot, Frame};

/// Consecutive read failures tolerated before a session is marked failed.
const MAX_READ_FAILURES: u32 = 3;

struct InferenceJob {
    frame: Frame,
    generation: u64,
}

struct LatestSlot {
    generation: u64,
    snapshot: DetectionSnapshot,
}

type LatestMap = Arc<RwLock<HashMap<CameraId, LatestSlot>>>;

/// Drives camera sessions and the shared inference worker pool.
pub struct DetectionPipeline<B: CameraBackend, D: Detector> {
    backend: B,
    config: DetectionConfig,
    registry: SessionRegistry,
    latest: LatestMap,
    jobs: mpsc::Sender<InferenceJob>,
    /// One lock per camera id. Start/stop for the same camera serialize;
    /// a slow open on one camera never blocks control calls for another.
    session_locks: Mutex<HashMap<CameraId, Arc<Mutex<()>>>>,
    /// Bumped on every session start; stamps frames and the result slot.
    generations: AtomicU64,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    _detector: std::marker::PhantomData<D>,
}

impl<B: CameraBackend, D: Detector> DetectionPipeline<B, D> {
    /// Creates the pipeline and spawns its inference workers.
    pub fn new(backend: B, detector: D, config: DetectionConfig) -> Self {
        let (jobs, rx) = mpsc::channel::<InferenceJob>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let detector = Arc::new(detector);
        let latest: LatestMap = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            workers.push(tokio::spawn(inference_worker(
                worker_id,
                rx.clone(),
                detector.clone(),
                latest.clone(),
                config.confidence_threshold,
                shutdown.clone(),
            )));
        }

        Self {
            backend,
            config,
            registry: SessionRegistry::new(),
            latest,
            jobs,
            session_locks: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
            shutdown,
            workers: Mutex::new(workers),
            _detector: std::marker::PhantomData,
        }
    }

    /// Opens a camera and starts streaming frames from it.
    ///
    /// If the camera already has a session, that session is torn down
    /// first. The open is retried with backoff; when the retry budget is
    /// exhausted the session is left in [`SessionState::Failed`] and the
    /// error reports the attempt count. A later call re-arms the session
    /// from the failed state.
    #[tracing::instrument(skip(self))]
    pub async fn start_session(&self, camera_id: CameraId) -> Result<(), DetectionError> {
        let lock = self.session_lock(camera_id).await;
        let _guard = lock.lock().await;

        if let Some(existing) = self.registry.remove(camera_id).await {
            self.teardown(camera_id, existing).await;
        }

        let token = CancellationToken::new();
        let (frames_tx, _) = broadcast::channel(self.config.frame_buffer);
        self.registry
            .insert(
                camera_id,
                SessionHandle {
                    state: SessionState::Opening,
                    token: token.clone(),
                    capture_task: None,
                    frames: frames_tx.clone(),
                },
            )
            .await;

        let capture = match self.open_with_retry(camera_id).await {
            Ok(capture) => capture,
            Err(e) => {
                self.registry.set_state(camera_id, SessionState::Failed).await;
                metrics::counter!("detection_open_failures_total").increment(1);
                return Err(e);
            }
        };

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        self.latest.write().await.insert(
            camera_id,
            LatestSlot {
                generation,
                snapshot: DetectionSnapshot::empty(),
            },
        );

        let task = tokio::spawn(capture_loop(
            capture,
            camera_id,
            generation,
            token,
            frames_tx,
            self.jobs.clone(),
            self.latest.clone(),
            self.registry.clone(),
        ));
        self.registry.set_capture_task(camera_id, task).await;
        self.registry
            .set_state(camera_id, SessionState::Streaming)
            .await;

        metrics::counter!("detection_sessions_started_total").increment(1);
        tracing::info!(%camera_id, generation, "camera session streaming");
        Ok(())
    }

    /// Stops a camera session, releasing the capture handle and clearing
    /// the latest-result slot.
    #[tracing::instrument(skip(self))]
    pub async fn stop_session(&self, camera_id: CameraId) -> Result<(), DetectionError> {
        let lock = self.session_lock(camera_id).await;
        let _guard = lock.lock().await;

        self.registry
            .set_state(camera_id, SessionState::Closing)
            .await;
        let session = self
            .registry
            .remove(camera_id)
            .await
            .ok_or(DetectionError::SessionNotFound(camera_id))?;
        self.teardown(camera_id, session).await;

        tracing::info!(%camera_id, "camera session stopped");
        Ok(())
    }

    /// The most recent inference result for a camera.
    pub async fn latest_detections(
        &self,
        camera_id: CameraId,
    ) -> Result<DetectionSnapshot, DetectionError> {
        self.latest
            .read()
            .await
            .get(&camera_id)
            .map(|slot| slot.snapshot.clone())
            .ok_or(DetectionError::SessionNotFound(camera_id))
    }

    /// Subscribes to a camera's annotated-frame feed.
    pub async fn subscribe(
        &self,
        camera_id: CameraId,
    ) -> Result<broadcast::Receiver<AnnotatedFrame>, DetectionError> {
        self.registry
            .subscribe(camera_id)
            .await
            .ok_or(DetectionError::SessionNotFound(camera_id))
    }

    /// Current lifecycle state of a camera session.
    pub async fn session_state(&self, camera_id: CameraId) -> SessionState {
        self.registry.state(camera_id).await
    }

    /// Cameras currently streaming.
    pub async fn active_cameras(&self) -> Vec<CameraId> {
        self.registry.streaming().await
    }

    /// Stops all sessions, failed ones included, and the worker pool.
    pub async fn shutdown(&self) {
        for camera_id in self.registry.camera_ids().await {
            let lock = self.session_lock(camera_id).await;
            let _guard = lock.lock().await;
            if let Some(session) = self.registry.remove(camera_id).await {
                self.teardown(camera_id, session).await;
            }
        }
        self.shutdown.cancel();
        for worker in self.workers.lock().await.drain(..) {
            let _ = worker.await;
        }
    }

    async fn session_lock(&self, camera_id: CameraId) -> Arc<Mutex<()>> {
        self.session_locks
            .lock()
            .await
            .entry(camera_id)
            .or_default()
            .clone()
    }

    async fn open_with_retry(&self, camera_id: CameraId) -> Result<B::Capture, DetectionError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.backend.open(camera_id).await {
                Ok(capture) => return Ok(capture),
                Err(e) if attempts < self.config.open_retries => {
                    tracing::warn!(%camera_id, attempts, error = %e, "camera open failed, retrying");
                    tokio::time::sleep(self.config.open_backoff).await;
                }
                Err(e) => {
                    tracing::error!(%camera_id, attempts, error = %e, "camera open retry budget exhausted");
                    return Err(DetectionError::CameraOpen {
                        camera_id,
                        attempts,
                    });
                }
            }
        }
    }

    /// Cancels a session's capture loop, waits for it to exit, and clears
    /// the latest-result slot so a stale inference completion cannot
    /// resurrect a stopped session.
    async fn teardown(&self, camera_id: CameraId, mut session: SessionHandle) {
        session.token.cancel();
        if let Some(task) = session.capture_task.take() {
            let _ = task.await;
        }
        self.latest.write().await.remove(&camera_id);
    }
}

async fn capture_loop<C: FrameCapture>(
    mut capture: C,
    camera_id: CameraId,
    generation: u64,
    token: CancellationToken,
    frames: broadcast::Sender<AnnotatedFrame>,
    jobs: mpsc::Sender<InferenceJob>,
    latest: LatestMap,
    registry: SessionRegistry,
) {
    let mut seq: u64 = 0;
    let mut read_failures: u32 = 0;
    loop {
        let read = tokio::select! {
            _ = token.cancelled() => return,
            read = capture.read_frame() => read,
        };
        let data = match read {
            Ok(data) => {
                read_failures = 0;
                data
            }
            Err(e) => {
                read_failures += 1;
                tracing::warn!(%camera_id, read_failures, error = %e, "frame read failed");
                if read_failures >= MAX_READ_FAILURES {
                    registry.set_state(camera_id, SessionState::Failed).await;
                    // No capture means no current result to serve.
                    latest.write().await.remove(&camera_id);
                    return;
                }
                continue;
            }
        };

        seq += 1;
        let frame = Frame {
            camera_id,
            seq,
            captured_at: Utc::now(),
            data,
        };
        metrics::counter!("detection_frames_total").increment(1);

        let detections = latest
            .read()
            .await
            .get(&camera_id)
            .map(|slot| slot.snapshot.detections.clone())
            .unwrap_or_default();
        // No subscribers is fine; the feed is best-effort.
        let _ = frames.send(AnnotatedFrame {
            frame: frame.clone(),
            detections,
        });

        if jobs.try_send(InferenceJob { frame, generation }).is_err() {
            metrics::counter!("detection_frames_dropped_total").increment(1);
            tracing::trace!(%camera_id, seq, "inference queue full, frame dropped");
        }
    }
}

async fn inference_worker<D: Detector>(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<InferenceJob>>>,
    detector: Arc<D>,
    latest: LatestMap,
    confidence_threshold: f32,
    shutdown: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = jobs.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => return,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => return,
                },
            }
        };

        let camera_id = job.frame.camera_id;
        let seq = job.frame.seq;
        let detections = match detector.detect(&job.frame).await {
            Ok(detections) => detections
                .into_iter()
                .filter(|d| d.confidence >= confidence_threshold)
                .collect(),
            Err(e) => {
                metrics::counter!("detection_inference_failures_total").increment(1);
                tracing::warn!(worker_id, %camera_id, seq, error = %e, "inference failed");
                Vec::new()
            }
        };

        // get_mut only: a completion for a stopped session finds no slot
        // and is discarded. The generation check keeps work from a
        // torn-down session out of a re-opened camera's slot; the seq
        // check keeps an older frame from overwriting a newer one.
        let mut latest = latest.write().await;
        if let Some(slot) = latest.get_mut(&camera_id) {
            if job.generation == slot.generation && seq > slot.snapshot.seq {
                slot.snapshot = DetectionSnapshot {
                    detections,
                    seq,
                    as_of: Utc::now(),
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ScriptedDetector, SyntheticCamera};
    use std::time::Duration;

    fn pipeline(
        camera: &SyntheticCamera,
        detector: &ScriptedDetector,
    ) -> DetectionPipeline<SyntheticCamera, ScriptedDetector> {
        DetectionPipeline::new(camera.clone(), detector.clone(), DetectionConfig::default())
    }

    #[tokio::test]
    async fn start_session_streams_and_reports_state() {
        let camera = SyntheticCamera::new(Duration::from_millis(5));
        let detector = ScriptedDetector::new();
        let pipeline = pipeline(&camera, &detector);
        let camera_id = CameraId::new(0);

        pipeline.start_session(camera_id).await.unwrap();
        assert_eq!(pipeline.session_state(camera_id).await, SessionState::Streaming);
        assert_eq!(pipeline.active_cameras().await, vec![camera_id]);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let snapshot = pipeline.latest_detections(camera_id).await.unwrap();
        assert!(snapshot.seq > 0);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn stop_without_session_is_not_found() {
        let camera = SyntheticCamera::new(Duration::from_millis(5));
        let detector = ScriptedDetector::new();
        let pipeline = pipeline(&camera, &detector);

        let err = pipeline.stop_session(CameraId::new(9)).await.unwrap_err();
        assert!(matches!(err, DetectionError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn latest_detections_without_session_is_not_found() {
        let camera = SyntheticCamera::new(Duration::from_millis(5));
        let detector = ScriptedDetector::new();
        let pipeline = pipeline(&camera, &detector);

        let err = pipeline
            .latest_detections(CameraId::new(4))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectionError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn persistent_read_failures_mark_the_session_failed() {
        let camera = SyntheticCamera::new(Duration::from_millis(2));
        camera.fail_reads_after(2);
        let detector = ScriptedDetector::new();
        let pipeline = pipeline(&camera, &detector);
        let camera_id = CameraId::new(1);

        pipeline.start_session(camera_id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(pipeline.session_state(camera_id).await, SessionState::Failed);
        // A camera that stopped capturing has no current result to serve.
        assert!(matches!(
            pipeline.latest_detections(camera_id).await,
            Err(DetectionError::SessionNotFound(_))
        ));
        pipeline.shutdown().await;
    }
}
