//! Per-session discovery caches.
//!
//! Each session owns one [`DiscoveryCache`] behind an async mutex, so
//! lookups within a session run one at a time while separate sessions
//! proceed independently. Sessions idle longer than the store's TTL are
//! evicted the next time the store is touched.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use site_lookup_parcel::DiscoveryCache;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// A session's cache handle.
pub type SessionCache = Arc<AsyncMutex<DiscoveryCache>>;

/// Idle time after which a session is dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Environment variable overriding [`DEFAULT_SESSION_TTL`], in seconds.
pub const SESSION_TTL_ENV: &str = "SITE_LOOKUP_SESSION_TTL_SECS";

struct Session {
    cache: SessionCache,
    last_used: Instant,
}

pub struct SessionStore {
    sessions: Mutex<BTreeMap<Uuid, Session>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            ttl,
        }
    }

    /// Reads the TTL from [`SESSION_TTL_ENV`], falling back to
    /// [`DEFAULT_SESSION_TTL`] when unset, zero, or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let ttl = std::env::var(SESSION_TTL_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .map_or(DEFAULT_SESSION_TTL, Duration::from_secs);
        Self::with_ttl(ttl)
    }

    /// Opens a session with an empty cache.
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.lock();
        self.prune(&mut sessions, Instant::now());
        sessions.insert(
            id,
            Session {
                cache: Arc::new(AsyncMutex::new(DiscoveryCache::new())),
                last_used: Instant::now(),
            },
        );
        log::debug!("Opened session {id}");
        id
    }

    /// Returns the session's cache and marks it used. Expired sessions
    /// are gone.
    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<SessionCache> {
        let now = Instant::now();
        let mut sessions = self.lock();
        self.prune(&mut sessions, now);
        let session = sessions.get_mut(id)?;
        session.last_used = now;
        Some(session.cache.clone())
    }

    /// Ends a session, dropping its cache. Returns `false` if it did not
    /// exist.
    pub fn remove(&self, id: &Uuid) -> bool {
        let mut sessions = self.lock();
        self.prune(&mut sessions, Instant::now());
        let removed = sessions.remove(id).is_some();
        if removed {
            log::debug!("Closed session {id}");
        }
        removed
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut sessions = self.lock();
        self.prune(&mut sessions, Instant::now());
        sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&self, sessions: &mut BTreeMap<Uuid, Session>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, s| now.duration_since(s.last_used) < self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            log::debug!("Evicted {evicted} idle session(s)");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Uuid, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
