use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::{EditingSession, RoundDefaults};
use crate::question_set::draft::QuestionSetDraft;

pub type SessionHandle = Arc<Mutex<EditingSession>>;

struct Entry {
    handle: SessionHandle,
    touched: Instant,
}

/// Open editing sessions, keyed by session id. Every lookup counts as
/// activity; sessions nobody looked up for a while are swept.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
    pub async fn open(&self, draft: QuestionSetDraft, defaults: RoundDefaults) -> SessionHandle {
        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(EditingSession::new(id, draft, defaults)));
        self.sessions.write().await.insert(
            id,
            Entry {
                handle: handle.clone(),
                touched: Instant::now(),
            },
        );
        info!(session_id = %id, "Editing session opened");
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.touched = Instant::now();
        Some(entry.handle.clone())
    }

    /// Removes the session and stops its generation. Returns false if unknown.
    pub async fn close(&self, id: Uuid) -> bool {
        let Some(entry) = self.sessions.write().await.remove(&id) else {
            return false;
        };
        entry.handle.lock().await.cancel_generation();
        info!(session_id = %id, "Editing session closed");
        true
    }

    /// Closes sessions untouched for longer than `max_idle`. A session that
    /// is saving or generating counts as active. Returns how many were closed.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<(Uuid, SessionHandle)> = {
            let mut sessions = self.sessions.write().await;
            let mut expired = Vec::new();
            for (id, entry) in sessions.iter_mut() {
                if now.duration_since(entry.touched) <= max_idle {
                    continue;
                }
                let busy = entry.handle.try_lock().map_or(true, |s| s.is_busy());
                if busy {
                    entry.touched = now;
                } else {
                    expired.push(*id);
                }
            }
            expired
                .into_iter()
                .filter_map(|id| sessions.remove(&id).map(|e| (id, e.handle)))
                .collect()
        };

        for (id, handle) in &expired {
            handle.lock().await.cancel_generation();
            info!(session_id = %id, "Idle editing session closed");
        }
        expired.len()
    }

    /// Sweeps idle sessions every `every` for the life of the process.
    pub fn spawn_sweeper(self: Arc<Self>, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // First tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let closed = self.sweep_idle(max_idle).await;
                debug!(closed, "Session sweep finished");
            }
        })
    }
}
