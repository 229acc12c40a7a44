//! Session-backed storage for conversation histories
//!
//! Each client owns one history under one key. Entries expire a fixed
//! time after their last write, the way a cookie session with a permanent
//! lifetime does.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ParleyError, Result};

use super::history::ConversationHistory;

/// Default session lifetime
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Longest accepted session lifetime; browsers cap cookie lifetimes at 400 days.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(400 * 24 * 60 * 60);

/// Opaque per-client session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random session id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Produce the signed cookie value `<uuid>.<digest>`.
    pub fn sign(&self, secret: &str) -> String {
        format!("{}.{}", self.0, digest(secret, &self.0))
    }

    /// Verify a signed cookie value. Returns `None` when the value is
    /// malformed or was signed with another secret.
    pub fn verify(signed: &str, secret: &str) -> Option<Self> {
        let (id, signature) = signed.split_once('.')?;
        let id = Uuid::parse_str(id).ok()?;
        if digest(secret, &id) == signature {
            Some(Self(id))
        } else {
            None
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn digest(secret: &str, id: &Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Per-client key/value store holding conversation histories.
///
/// Implementations are shared between concurrent requests and must do
/// their own synchronization. Concurrent writers for one session are
/// last-writer-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the history for a session. Unknown or expired sessions yield an
    /// empty history.
    async fn load(&self, id: &SessionId) -> Result<ConversationHistory>;

    /// Replace the stored history for a session and refresh its expiry.
    async fn save(&self, id: &SessionId, history: &ConversationHistory) -> Result<()>;

    /// Drop the session's history entirely.
    async fn reset(&self, id: &SessionId) -> Result<()>;
}

#[derive(Debug, Clone)]
struct SessionEntry {
    history: ConversationHistory,
    expires_at: DateTime<Utc>,
}

/// In-memory session store with time-bounded entries
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<SessionId, SessionEntry>>,
    ttl: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl InMemorySessionStore {
    /// Create a store whose entries live `ttl` past their last write
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove expired entries, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    fn expiry(&self) -> Result<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| ParleyError::Session(format!("Invalid session TTL: {}", e)))?;
        Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| {
                ParleyError::Session(format!("Session TTL out of range: {:?}", self.ttl))
            })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<ConversationHistory> {
        let entries = self.entries.read().await;
        let history = entries
            .get(id)
            .filter(|e| e.expires_at > Utc::now())
            .map(|e| e.history.clone())
            .unwrap_or_default();
        Ok(history)
    }

    async fn save(&self, id: &SessionId, history: &ConversationHistory) -> Result<()> {
        let expires_at = self.expiry()?;
        let mut entries = self.entries.write().await;
        entries.insert(
            id.clone(),
            SessionEntry {
                history: history.clone(),
                expires_at,
            },
        );

        let now = Utc::now();
        entries.retain(|_, e| e.expires_at > now);
        tracing::trace!(session = %id, turns = history.len(), "session saved");
        Ok(())
    }

    async fn reset(&self, id: &SessionId) -> Result<()> {
        self.entries.write().await.remove(id);
        tracing::debug!(session = %id, "session history reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_sign_and_verify() {
        let id = SessionId::generate();
        let signed = id.sign("secret");

        assert_eq!(SessionId::verify(&signed, "secret"), Some(id.clone()));
        assert_eq!(SessionId::verify(&signed, "other-secret"), None);
    }

    #[test]
    fn test_session_id_rejects_tampering() {
        let id = SessionId::generate();
        let signed = id.sign("secret");
        let (_, signature) = signed.split_once('.').unwrap();

        let forged = format!("{}.{}", Uuid::new_v4(), signature);
        assert_eq!(SessionId::verify(&forged, "secret"), None);
        assert_eq!(SessionId::verify("not-a-cookie", "secret"), None);
        assert_eq!(SessionId::verify("", "secret"), None);
    }

    #[tokio::test]
    async fn test_load_unknown_session_is_empty() {
        let store = InMemorySessionStore::default();
        let history = store.load(&SessionId::generate()).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_save_load_reset() {
        let store = InMemorySessionStore::default();
        let id = SessionId::generate();

        let mut history = ConversationHistory::new();
        history.push_user("Hi");
        history.push_assistant("Hello");
        store.save(&id, &history).await.unwrap();

        assert_eq!(store.load(&id).await.unwrap(), history);
        assert_eq!(store.len().await, 1);

        store.reset(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::default();
        let a = SessionId::generate();
        let b = SessionId::generate();

        let mut history = ConversationHistory::new();
        history.push_user("only a");
        store.save(&a, &history).await.unwrap();

        assert!(store.load(&b).await.unwrap().is_empty());
        assert_eq!(store.load(&a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_dropped() {
        let store = InMemorySessionStore::new(Duration::from_millis(20));
        let id = SessionId::generate();

        let mut history = ConversationHistory::new();
        history.push_user("short-lived");
        store.save(&id, &history).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.load(&id).await.unwrap().is_empty());
        assert_eq!(store.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_an_error() {
        // ~1,000,000 years: a valid chrono delta that overflows once added to now
        let ttl = Duration::from_secs(1_000_000 * 365 * 24 * 60 * 60);
        let store = InMemorySessionStore::new(ttl);
        let id = SessionId::generate();

        let err = store.save(&id, &ConversationHistory::new()).await.unwrap_err();
        assert!(matches!(err, ParleyError::Session(_)));
        assert!(store.load(&id).await.unwrap().is_empty());
    }
}
