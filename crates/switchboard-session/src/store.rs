use crate::session::{Session, SessionMetadata};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use switchboard_core::{is_well_formed_session_id, Modality, SwitchboardError, SwitchboardResult};
use uuid::Uuid;

/// A metadata mutation applied under the store's write lock.
pub type MetadataUpdate = Box<dyn FnOnce(&mut SessionMetadata) + Send>;

/// Which timestamp a session's age is measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Age counts from `created_at`; long conversations expire mid-flight.
    #[default]
    FromCreation,
    /// Age counts from `last_activity`.
    Sliding,
}

impl ExpiryPolicy {
    fn reference(self, session: &Session) -> DateTime<Utc> {
        match self {
            Self::FromCreation => session.created_at,
            Self::Sliding => session.last_activity,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return a live session id for `identifier`, creating the session if needed.
    ///
    /// Absent or malformed identifiers get a fresh UUID. Never fails.
    async fn resolve(&self, identifier: Option<&str>) -> String;
    async fn get(&self, id: &str) -> Option<Session>;
    /// Append a turn; a missing session is a silent no-op.
    async fn append_turn(&self, id: &str, user_text: &str, bot_text: &str, modality: Modality);
    async fn update_metadata(&self, id: &str, update: MetadataUpdate) -> SwitchboardResult<()>;
    /// Remove every session older than `ttl` at `now`; returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> usize;
    async fn len(&self) -> usize;
}

/// In-memory session store. All mutations take one write lock; the lock is
/// never held across an `.await`.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    policy: ExpiryPolicy,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(ExpiryPolicy::default())
    }
}

impl InMemorySessionStore {
    pub fn new(policy: ExpiryPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn resolve(&self, identifier: Option<&str>) -> String {
        let id = match identifier.map(str::trim) {
            Some(id) if is_well_formed_session_id(id) => id.to_string(),
            Some(rejected) => {
                tracing::debug!(
                    len = rejected.len(),
                    "Malformed session id supplied, allocating a new one"
                );
                Uuid::new_v4().to_string()
            }
            None => Uuid::new_v4().to_string(),
        };

        let mut sessions = self.sessions.write();
        match sessions.get_mut(&id) {
            Some(session) => session.last_activity = Utc::now(),
            None => {
                tracing::info!(session_id = %id, "Session created");
                sessions.insert(id.clone(), Session::new(id.clone()));
            }
        }
        id
    }

    async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    async fn append_turn(&self, id: &str, user_text: &str, bot_text: &str, modality: Modality) {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(id) {
            Some(session) => {
                session.push_turn(user_text.to_string(), bot_text.to_string(), modality);
            }
            None => tracing::debug!(session_id = %id, "Dropping turn for unknown session"),
        }
    }

    async fn update_metadata(&self, id: &str, update: MetadataUpdate) -> SwitchboardResult<()> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SwitchboardError::NotFound(format!("Session {id}")))?;
        update(&mut session.metadata);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let policy = self.policy;
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| {
            // A reference in the future (clock skew) counts as age zero.
            let age = (now - policy.reference(session))
                .to_std()
                .unwrap_or_default();
            age <= ttl
        });
        before - sessions.len()
    }

    async fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn backdate(store: &InMemorySessionStore, id: &str, created: DateTime<Utc>, active: DateTime<Utc>) {
        let mut sessions = store.sessions.write();
        let session = sessions.get_mut(id).unwrap();
        session.created_at = created;
        session.last_activity = active;
    }

    #[tokio::test]
    async fn test_resolve_absent_generates_uuid() {
        let store = InMemorySessionStore::default();
        let id = store.resolve(None).await;
        assert!(Uuid::parse_str(&id).is_ok());
        assert!(store.get(&id).await.is_some());
    }

    #[tokio::test]
    async fn test_resolve_malformed_generates_uuid() {
        let store = InMemorySessionStore::default();
        let id = store.resolve(Some("not a valid id!")).await;
        assert_ne!(id, "not a valid id!");
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_known_id_refreshes() {
        let store = InMemorySessionStore::default();
        let id = store.resolve(Some("telegram_42")).await;
        assert_eq!(id, "telegram_42");

        let old = Utc::now() - chrono::Duration::minutes(10);
        backdate(&store, &id, old, old);
        let again = store.resolve(Some("telegram_42")).await;
        assert_eq!(again, id);

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.created_at, old);
        assert!(session.last_activity > old);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_creates_one_session() {
        let store = Arc::new(InMemorySessionStore::default());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.resolve(Some("whatsapp_2348012345678")).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "whatsapp_2348012345678");
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_append_turn_and_missing_session() {
        let store = InMemorySessionStore::default();
        let id = store.resolve(None).await;
        store.append_turn(&id, "hello", "Hi there!", Modality::Text).await;
        store.append_turn(&id, "bye", "Goodbye!", Modality::Text).await;
        store.append_turn("web_missing", "x", "y", Modality::Text).await;

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[1].user_text, "bye");
        assert!(session.history[0].timestamp <= session.history[1].timestamp);
        assert!(store.get("web_missing").await.is_none());
    }

    #[tokio::test]
    async fn test_update_metadata() {
        let store = InMemorySessionStore::default();
        let id = store.resolve(Some("web_abc")).await;
        store
            .update_metadata(&id, Box::new(|meta| meta.request_handoff("angry customer")))
            .await
            .unwrap();
        assert!(store.get(&id).await.unwrap().metadata.handoff_requested);

        let err = store
            .update_metadata("web_nope", Box::new(|meta| meta.language = "fr".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sweep_from_creation() {
        let store = InMemorySessionStore::default();
        let now = Utc::now();
        let old = store.resolve(Some("telegram_1")).await;
        let young = store.resolve(Some("telegram_2")).await;
        // Old session stays active but was created two days ago.
        backdate(&store, &old, now - chrono::Duration::hours(48), now);
        backdate(&store, &young, now - chrono::Duration::hours(1), now);

        let removed = store.sweep(now, Duration::from_secs(24 * 3600)).await;
        assert_eq!(removed, 1);
        assert!(store.get(&old).await.is_none());
        assert!(store.get(&young).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_sliding() {
        let store = InMemorySessionStore::new(ExpiryPolicy::Sliding);
        let now = Utc::now();
        let active = store.resolve(Some("web_active")).await;
        let idle = store.resolve(Some("web_idle")).await;
        backdate(&store, &active, now - chrono::Duration::hours(48), now);
        backdate(
            &store,
            &idle,
            now - chrono::Duration::hours(48),
            now - chrono::Duration::hours(30),
        );

        assert_eq!(store.sweep(now, Duration::from_secs(24 * 3600)).await, 1);
        assert!(store.get(&active).await.is_some());
        assert!(store.get(&idle).await.is_none());
    }
}
