//! Search session registry.
//!
//! A session binds a validated reference embedding to a requester across
//! multiple follow-up queries, so the caller does not re-upload a reference
//! face for every question. Sessions expire lazily: the timeout is checked
//! on access and an expired session is removed then, not by a background
//! task. Deployments that want bounded memory for abandoned sessions can
//! call [`SessionRegistry::sweep`] on whatever cadence suits them.

use chrono::{DateTime, Duration, Utc};
use faceseek_core::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One logged query and its response summary.
#[derive(Debug, Clone)]
pub struct QueryLogEntry {
    /// The natural-language query text.
    pub query: String,
    /// Short summary of the response served for it.
    pub summary: String,
}

/// Short-lived state binding a reference embedding to a requester.
#[derive(Debug, Clone)]
pub struct SearchSession {
    /// Opaque unique token.
    pub session_id: String,
    /// The validated reference face embedding.
    pub reference_embedding: Vec<f32>,
    /// Creation time; expiry is measured from here.
    pub created_at: DateTime<Utc>,
    /// Ordered log of queries served within this session.
    pub query_log: Vec<QueryLogEntry>,
}

impl SearchSession {
    fn is_expired(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        now - self.created_at > idle_timeout
    }
}

/// Registry of live search sessions, keyed by session id.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SearchSession>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    /// Create a registry with the given idle timeout in seconds.
    pub fn new(idle_timeout_secs: u64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout: Duration::seconds(idle_timeout_secs as i64),
        }
    }

    /// Number of sessions currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the registry holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Create a session for a validated reference embedding.
    pub async fn create(&self, reference_embedding: Vec<f32>) -> String {
        self.create_at(reference_embedding, Utc::now()).await
    }

    /// Fetch a session by id.
    ///
    /// An expired session is removed on this access and reported as
    /// [`Error::SessionExpired`]; so is an id that never existed or was
    /// already removed, since the caller cannot tell the difference.
    pub async fn get(&self, session_id: &str) -> Result<SearchSession> {
        self.get_at(session_id, Utc::now()).await
    }

    /// Append a query and its response summary to a session's log.
    ///
    /// Fails silently when the session no longer exists; callers re-check
    /// liveness with [`SessionRegistry::get`] when they need to know.
    pub async fn append_query(
        &self,
        session_id: &str,
        query: impl Into<String>,
        summary: impl Into<String>,
    ) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.query_log.push(QueryLogEntry {
                query: query.into(),
                summary: summary.into(),
            });
        }
    }

    /// Remove every expired session, returning how many were dropped.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    pub(crate) async fn create_at(
        &self,
        reference_embedding: Vec<f32>,
        now: DateTime<Utc>,
    ) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = SearchSession {
            session_id: session_id.clone(),
            reference_embedding,
            created_at: now,
            query_log: Vec::new(),
        };
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), session);
        log::info!("created search session {session_id}");
        session_id
    }

    pub(crate) async fn get_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SearchSession> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session_id) {
            Some(session) if session.is_expired(now, self.idle_timeout) => {
                sessions.remove(session_id);
                log::info!("session {session_id} expired");
                Err(Error::session_expired(session_id))
            }
            Some(session) => Ok(session.clone()),
            None => Err(Error::session_expired(session_id)),
        }
    }

    pub(crate) async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, self.idle_timeout));
        let dropped = before - sessions.len();
        if dropped > 0 {
            log::info!("swept {dropped} expired sessions");
        }
        dropped
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding() -> Vec<f32> {
        vec![0.5, 0.5, 0.5, 0.5]
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = SessionRegistry::new(1800);
        let id = registry.create(embedding()).await;

        let session = registry.get(&id).await.unwrap();
        assert_eq!(session.session_id, id);
        assert_eq!(session.reference_embedding, embedding());
        assert!(session.query_log.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_expired() {
        let registry = SessionRegistry::new(1800);
        let err = registry.get("no-such-session").await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired(_)));
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let registry = SessionRegistry::new(1800);
        let a = registry.create(embedding()).await;
        let b = registry.create(embedding()).await;
        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_access() {
        let registry = SessionRegistry::new(60);
        let now = Utc::now();
        let id = registry.create_at(embedding(), now).await;

        // Still valid just inside the timeout
        let later = now + Duration::seconds(59);
        assert!(registry.get_at(&id, later).await.is_ok());

        // Past the timeout: expired and removed
        let later = now + Duration::seconds(61);
        let err = registry.get_at(&id, later).await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired(_)));
        assert_eq!(registry.len().await, 0);

        // A second access reports expiry again, it does not crash
        let err = registry.get_at(&id, later).await.unwrap_err();
        assert!(matches!(err, Error::SessionExpired(_)));
    }

    #[tokio::test]
    async fn test_append_query() {
        let registry = SessionRegistry::new(1800);
        let id = registry.create(embedding()).await;

        registry
            .append_query(&id, "photos at the beach", "3 photos")
            .await;
        registry.append_query(&id, "with grandma", "1 photo").await;

        let session = registry.get(&id).await.unwrap();
        assert_eq!(session.query_log.len(), 2);
        assert_eq!(session.query_log[0].query, "photos at the beach");
        assert_eq!(session.query_log[1].summary, "1 photo");
    }

    #[tokio::test]
    async fn test_append_query_missing_session_is_silent() {
        let registry = SessionRegistry::new(1800);
        registry.append_query("gone", "query", "summary").await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_drops_only_expired() {
        let registry = SessionRegistry::new(60);
        let now = Utc::now();
        let old = registry.create_at(embedding(), now).await;
        let fresh = registry
            .create_at(embedding(), now + Duration::seconds(50))
            .await;

        let dropped = registry.sweep_at(now + Duration::seconds(70)).await;
        assert_eq!(dropped, 1);
        assert!(registry.get_at(&old, now + Duration::seconds(70)).await.is_err());
        assert!(registry.get_at(&fresh, now + Duration::seconds(70)).await.is_ok());
    }
}
