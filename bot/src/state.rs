//! Process-wide state: the event store, its backing file, and the private-chat
//! sessions. Constructed once in `main` and handed to every handler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use santa_core::{EventStore, GroupId, UserId};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("state file i/o failed: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("state file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Budget,
    Rules,
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupConversation {
    pub group_id: GroupId,
    pub step: SetupStep,
}

/// Per-user private-chat context. In-memory only: a restart drops active
/// prompts but never event data.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub active_group: Option<GroupId>,
    pub setup: Option<SetupConversation>,
}

#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<RwLock<EventStore>>,
    sessions: Arc<RwLock<HashMap<UserId, Session>>>,
    persist_path: Option<PathBuf>,
    pub bot_id: UserId,
    pub bot_username: String,
}

impl AppState {
    pub fn new(bot_id: UserId, bot_username: impl Into<String>) -> Self {
        Self {
            store: Arc::new(RwLock::new(EventStore::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            persist_path: None,
            bot_id,
            bot_username: bot_username.into(),
        }
    }

    /// Rehydrates the store from `path`. A missing file starts empty
    /// silently; an unreadable or malformed file starts empty with the
    /// failure logged.
    pub async fn with_persistence(
        bot_id: UserId,
        bot_username: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        let path = path.into();
        let mut state = Self::new(bot_id, bot_username);
        state.persist_path = Some(path.clone());
        match load(&path).await {
            Ok(store) => {
                tracing::info!(path = %path.display(), events = store.len(), "state loaded");
                *state.store.write().await = store;
            }
            Err(StorageError::Persistence(err))
                if err.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::debug!(path = %path.display(), "no state file yet, starting empty");
            }
            Err(err) => {
                tracing::error!(path = %path.display(), %err, "could not load state, starting empty");
            }
        }
        state
    }

    /// Writes the whole store to the state file. Save failures are logged and
    /// swallowed; the in-memory state stays authoritative for the rest of the
    /// process lifetime.
    pub async fn persist(&self) {
        let Some(path) = &self.persist_path else {
            return;
        };
        let snapshot = {
            let store = self.store.read().await;
            store.clone()
        };
        if let Err(err) = save(path, &snapshot).await {
            tracing::error!(path = %path.display(), %err, "failed to persist state");
        }
    }

    pub async fn session(&self, user_id: UserId) -> Session {
        self.sessions
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set_session(&self, user_id: UserId, session: Session) {
        self.sessions.write().await.insert(user_id, session);
    }
}

async fn load(path: &Path) -> Result<EventStore, StorageError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn save(path: &Path, store: &EventStore) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(store)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
