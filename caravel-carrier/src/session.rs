use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// A carrier API session obtained from a login call.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: String, ttl_seconds: i64) -> Self {
        Self {
            token,
            expires_at: Utc::now() + Duration::seconds(ttl_seconds),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Lazily refreshed credential cache. Adapters reuse the stored session
/// until it expires and re-authenticate only then.
pub struct SessionCache {
    slot: RwLock<Option<Session>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// The cached session, if present and still valid.
    pub async fn valid(&self) -> Option<Session> {
        let slot = self.slot.read().await;
        slot.as_ref().filter(|s| !s.is_expired()).cloned()
    }

    pub async fn store(&self, session: Session) {
        let mut slot = self.slot.write().await;
        *slot = Some(session);
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_cache_yields_nothing() {
        let cache = SessionCache::new();
        assert!(cache.valid().await.is_none());
    }

    #[tokio::test]
    async fn test_stored_session_is_reused_until_expiry() {
        let cache = SessionCache::new();
        cache.store(Session::new("tok-1".into(), 3600)).await;
        assert_eq!(cache.valid().await.unwrap().token, "tok-1");

        // An already-expired session is not handed out again.
        cache.store(Session::new("tok-2".into(), -1)).await;
        assert!(cache.valid().await.is_none());
    }
}
