// src/session/registry.rs
//
// Connection id → session map. The map lock is held only for lookup,
// insert and remove; each session has its own FIFO mutex, so one
// connection's frames are processed in arrival order and connections never
// wait on each other.

use super::{ConnectionId, Session};
use crate::types::RecognitionConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub type SharedSession = Arc<Mutex<Session>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, SharedSession>>,
    config: RecognitionConfig,
}

impl SessionRegistry {
    pub fn new(config: RecognitionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// The session for `id`, created empty on first use.
    pub fn get_or_create(&self, id: ConnectionId) -> SharedSession {
        if let Some(session) = self.sessions.read().get(&id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write();
        sessions
            .entry(id)
            .or_insert_with(|| {
                debug!(%id, "Creating session");
                Arc::new(Mutex::new(Session::new(id, &self.config)))
            })
            .clone()
    }

    /// Empty the window and return the debouncer to idle.
    pub async fn reset(&self, id: ConnectionId) {
        let session = self.get_or_create(id);
        session.lock().await.reset();
        debug!(%id, "Session reset");
    }

    /// Drop the session and release its camera. Waits for an in-flight frame
    /// of this session to finish; its result goes nowhere.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.sessions.write().remove(&id);
        match removed {
            Some(session) => {
                let camera = session.lock().await.take_camera();
                if let Some(camera) = camera {
                    camera.release().await;
                }
                info!(%id, "Session removed");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
