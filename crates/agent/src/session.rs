use std::collections::HashMap;
use std::sync::Arc;

use quotesmith_core::{InteractionLog, ProjectContext, SessionId};
use tokio::sync::{Mutex, RwLock};

/// State owned by one session: its project context and audit trail.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub context: ProjectContext,
    pub history: InteractionLog,
}

/// Keyed sessions with exclusive access per key.
///
/// The outer lock only guards membership. Work on a session holds that
/// session's mutex, so distinct sessions never wait on each other.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    /// Returns the session for `id`, creating an empty one on first use.
    pub async fn session(&self, id: &SessionId) -> Arc<Mutex<Session>> {
        if let Some(session) = self.existing(id).await {
            return session;
        }
        let mut sessions = self.sessions.write().await;
        sessions.entry(id.clone()).or_default().clone()
    }

    pub async fn existing(&self, id: &SessionId) -> Option<Arc<Mutex<Session>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    pub async fn remove(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quotesmith_core::SessionId;

    use super::SessionStore;

    #[tokio::test]
    async fn session_is_created_once_and_shared() {
        let store = SessionStore::default();
        let id = SessionId::new("S-1");

        let first = store.session(&id).await;
        let second = store.session(&id).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn existing_never_creates() {
        let store = SessionStore::default();
        assert!(store.existing(&SessionId::new("S-missing")).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn remove_drops_the_session() {
        let store = SessionStore::default();
        let id = SessionId::new("S-2");
        store.session(&id).await;

        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert!(store.existing(&id).await.is_none());
    }
}
