//! Per-session conversation logs
//!
//! Each session sits behind its own async mutex. A turn holds that mutex from
//! appending the user message until the reply is stored, so two requests for
//! the same session never interleave, while different sessions run in
//! parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::window::MessageWindow;
use crate::config::AssistantConfig;
use crate::llm::Message;

/// One user's conversation
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: String,
    pub(crate) window: MessageWindow,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    turns: u64,
}

impl ConversationSession {
    fn new(id: &str, seed: &SessionSeed) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            window: MessageWindow::seeded(seed.preamble.clone(), seed.acknowledgement.clone(), seed.token_budget),
            created_at: now,
            updated_at: now,
            turns: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn window(&self) -> &MessageWindow {
        &self.window
    }

    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Store a completed turn
    pub(crate) fn commit(&mut self, window: MessageWindow) {
        self.window = window;
        self.turns += 1;
        self.updated_at = Utc::now();
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            messages: self.window.to_vec(),
            total_tokens: self.window.total_tokens(),
            token_budget: self.window.budget(),
            turns: self.turns,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only copy of a session for inspection endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub total_tokens: usize,
    pub token_budget: usize,
    pub turns: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fixed content every new session starts with
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub preamble: String,
    pub acknowledgement: String,
    pub token_budget: usize,
}

impl From<&AssistantConfig> for SessionSeed {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            preamble: config.preamble.clone(),
            acknowledgement: config.acknowledgement.clone(),
            token_budget: config.token_budget,
        }
    }
}

pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// In-memory store of all live sessions
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
    seed: SessionSeed,
}

impl SessionStore {
    pub fn new(seed: SessionSeed) -> Self {
        debug!(token_budget = seed.token_budget, "SessionStore::new: called");
        Self {
            sessions: RwLock::new(HashMap::new()),
            seed,
        }
    }

    /// Get a session, seeding it on first use
    pub async fn session(&self, id: &str) -> SharedSession {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.to_string()).or_insert_with(|| {
            info!(session_id = %id, "Session created");
            Arc::new(Mutex::new(ConversationSession::new(id, &self.seed)))
        });
        Arc::clone(session)
    }

    /// Lock the live session for `id`, creating it if needed
    ///
    /// A session evicted or reset while the caller waited for its lock is
    /// orphaned; the lock is dropped and taken again on the live entry.
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<ConversationSession> {
        loop {
            let session = self.session(id).await;
            let guard = Arc::clone(&session).lock_owned().await;
            let live = self
                .sessions
                .read()
                .await
                .get(id)
                .is_some_and(|current| Arc::ptr_eq(current, &session));
            if live {
                return guard;
            }
            debug!(session_id = %id, "SessionStore::lock: session replaced while waiting, retrying");
        }
    }

    /// Existing session, without creating one
    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Snapshot of a session; waits for any turn in progress
    pub async fn history(&self, id: &str) -> Option<SessionView> {
        let session = self.get(id).await?;
        let guard = session.lock().await;
        Some(guard.view())
    }

    /// Forget a session; the next message starts over from the seed
    pub async fn reset(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        debug!(session_id = %id, removed, "SessionStore::reset: called");
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than `ttl`
    ///
    /// Sessions that are locked or referenced by a turn in progress are kept.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        let Some(cutoff) = cutoff else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(guard) => guard.updated_at >= cutoff,
                Err(_) => true,
            }
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Periodically evict idle sessions until `cancel` fires
    pub fn spawn_sweeper(self: Arc<Self>, ttl: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let period = (ttl / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Session sweeper stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        self.evict_idle(ttl).await;
                    }
                }
            }
        })
    }
}
