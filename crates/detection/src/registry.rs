//! Per-camera session bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use common::CameraId;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::AnnotatedFrame;

/// Lifecycle of a camera session.
///
/// ```text
/// idle -> opening -> streaming -> closing -> idle
///           |            |
///           v            v
///         failed       failed
/// ```
///
/// A camera with no registry entry is `Idle`. `Failed` is sticky until a
/// new start request re-arms the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Opening,
    Streaming,
    Closing,
    Failed,
}

pub(crate) struct SessionHandle {
    pub(crate) state: SessionState,
    pub(crate) token: CancellationToken,
    pub(crate) capture_task: Option<JoinHandle<()>>,
    pub(crate) frames: broadcast::Sender<AnnotatedFrame>,
}

/// Tracks active camera sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<CameraId, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Current state of a camera. Unknown cameras are `Idle`.
    pub async fn state(&self, camera_id: CameraId) -> SessionState {
        self.sessions
            .read()
            .await
            .get(&camera_id)
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    /// Cameras currently streaming.
    pub async fn streaming(&self) -> Vec<CameraId> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.state == SessionState::Streaming)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Subscribes to a camera's annotated-frame feed.
    pub async fn subscribe(
        &self,
        camera_id: CameraId,
    ) -> Option<broadcast::Receiver<AnnotatedFrame>> {
        self.sessions
            .read()
            .await
            .get(&camera_id)
            .map(|s| s.frames.subscribe())
    }

    pub(crate) async fn camera_ids(&self) -> Vec<CameraId> {
        self.sessions.read().await.keys().copied().collect()
    }

    pub(crate) async fn insert(&self, camera_id: CameraId, handle: SessionHandle) {
        self.sessions.write().await.insert(camera_id, handle);
    }

    pub(crate) async fn remove(&self, camera_id: CameraId) -> Option<SessionHandle> {
        self.sessions.write().await.remove(&camera_id)
    }

    pub(crate) async fn set_state(&self, camera_id: CameraId, state: SessionState) {
        if let Some(session) = self.sessions.write().await.get_mut(&camera_id) {
            session.state = state;
        }
    }

    pub(crate) async fn set_capture_task(&self, camera_id: CameraId, task: JoinHandle<()>) {
        if let Some(session) = self.sessions.write().await.get_mut(&camera_id) {
            session.capture_task = Some(task);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
