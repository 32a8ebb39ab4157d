//! Short-lived keyed locks.
//!
//! Two keys are used per room:
//!
//! - `admission:<room>` serializes the commit phase of joins, so two
//!   admissions can never both take the last seat.
//! - `pending-bot-join:<room>` marks a bot backfill in flight. The room
//!   actor releases it when a seat is taken by someone else, which makes
//!   the queued bot join drop out.
//!
//! Every lock has a TTL, so a crashed holder never wedges a room.
//! [`RoomLock::Local`] covers a single process; [`RoomLock::Redis`] (behind
//! the `redis` feature) covers several processes sharing one store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ludo_protocol::RoomId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::RoomError;

pub fn admission_key(room_id: RoomId) -> String {
    format!("admission:{}", room_id.0)
}

pub fn pending_bot_key(room_id: RoomId) -> String {
    format!("pending-bot-join:{}", room_id.0)
}

/// Proof of holding a lock. Only the holder can release or renew it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken {
    key: String,
    value: String,
}

impl LockToken {
    fn generate(key: &str) -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self {
            key: key.to_owned(),
            value: bytes.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Which lock backend to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum LockConfig {
    #[default]
    Local,
    Redis {
        url: String,
    },
}

// ---------------------------------------------------------------------------
// Local backend
// ---------------------------------------------------------------------------

struct Held {
    value: String,
    expires: Instant,
}

/// Lock table for a single process.
#[derive(Clone, Default)]
pub struct LocalLock {
    held: Arc<Mutex<HashMap<String, Held>>>,
}

impl LocalLock {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, key: &str, ttl: Duration) -> Option<LockToken> {
        let mut held = self.held.lock().await;
        let now = Instant::now();
        if held.get(key).is_some_and(|h| h.expires > now) {
            return None;
        }
        let token = LockToken::generate(key);
        held.insert(
            key.to_owned(),
            Held {
                value: token.value.clone(),
                expires: now + ttl,
            },
        );
        Some(token)
    }

    async fn release(&self, token: &LockToken) -> bool {
        let mut held = self.held.lock().await;
        let owned = held
            .get(&token.key)
            .is_some_and(|h| h.value == token.value && h.expires > Instant::now());
        if owned {
            held.remove(&token.key);
        }
        owned
    }

    async fn renew(&self, token: &LockToken, ttl: Duration) -> bool {
        let mut held = self.held.lock().await;
        let now = Instant::now();
        match held.get_mut(&token.key) {
            Some(h) if h.value == token.value && h.expires > now => {
                h.expires = now + ttl;
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Redis backend
// ---------------------------------------------------------------------------

#[cfg(feature = "redis")]
mod redis_backend {
    use std::sync::LazyLock;
    use std::time::Duration;

    use redis::Script;
    use redis::aio::MultiplexedConnection;

    use super::LockToken;
    use crate::RoomError;

    static RELEASE: LazyLock<Script> = LazyLock::new(|| {
        Script::new(
            r#"if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end"#,
        )
    });

    static RENEW: LazyLock<Script> = LazyLock::new(|| {
        Script::new(
            r#"if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("PEXPIRE", KEYS[1], ARGV[2])
            else
                return 0
            end"#,
        )
    });

    fn external(err: redis::RedisError) -> RoomError {
        RoomError::External(format!("redis: {err}"))
    }

    fn ttl_millis(ttl: Duration) -> u64 {
        (ttl.as_millis() as u64).max(1)
    }

    /// Lock table shared through Redis (`SET NX PX` + compare-and-delete).
    #[derive(Clone)]
    pub struct RedisLock {
        conn: MultiplexedConnection,
    }

    impl RedisLock {
        pub async fn connect(url: &str) -> Result<Self, RoomError> {
            let client = redis::Client::open(url).map_err(external)?;
            let conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(external)?;
            tracing::info!(url, "connected to redis lock backend");
            Ok(Self { conn })
        }

        pub(super) async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, RoomError> {
            let token = LockToken::generate(key);
            let mut conn = self.conn.clone();
            let reply: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(&token.value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(external)?;
            Ok(reply.map(|_| token))
        }

        pub(super) async fn release(&self, token: &LockToken) -> Result<bool, RoomError> {
            let mut conn = self.conn.clone();
            let removed: i64 = RELEASE
                .key(&token.key)
                .arg(&token.value)
                .invoke_async(&mut conn)
                .await
                .map_err(external)?;
            Ok(removed == 1)
        }

        pub(super) async fn renew(&self, token: &LockToken, ttl: Duration) -> Result<bool, RoomError> {
            let mut conn = self.conn.clone();
            let renewed: i64 = RENEW
                .key(&token.key)
                .arg(&token.value)
                .arg(ttl_millis(ttl))
                .invoke_async(&mut conn)
                .await
                .map_err(external)?;
            Ok(renewed == 1)
        }
    }
}

#[cfg(feature = "redis")]
pub use redis_backend::RedisLock;

// ---------------------------------------------------------------------------
// RoomLock
// ---------------------------------------------------------------------------

/// A lock backend. Cheap to clone.
#[derive(Clone)]
pub enum RoomLock {
    Local(LocalLock),
    #[cfg(feature = "redis")]
    Redis(RedisLock),
}

impl Default for RoomLock {
    fn default() -> Self {
        Self::Local(LocalLock::new())
    }
}

impl RoomLock {
    pub fn local() -> Self {
        Self::default()
    }

    /// Builds the backend named by `config`.
    pub async fn connect(config: &LockConfig) -> Result<Self, RoomError> {
        match config {
            LockConfig::Local => Ok(Self::local()),
            #[cfg(feature = "redis")]
            LockConfig::Redis { url } => Ok(Self::Redis(RedisLock::connect(url).await?)),
            #[cfg(not(feature = "redis"))]
            LockConfig::Redis { .. } => Err(RoomError::External(
                "redis lock backend requested but the `redis` feature is disabled".into(),
            )),
        }
    }

    /// Takes `key` for `ttl`, or returns `None` if someone else holds it.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, RoomError> {
        match self {
            Self::Local(lock) => Ok(lock.acquire(key, ttl).await),
            #[cfg(feature = "redis")]
            Self::Redis(lock) => lock.acquire(key, ttl).await,
        }
    }

    /// Like [`acquire`](Self::acquire), retrying up to `attempts` times
    /// with `backoff` between tries.
    pub async fn acquire_with_retry(
        &self,
        key: &str,
        ttl: Duration,
        attempts: u32,
        backoff: Duration,
    ) -> Result<Option<LockToken>, RoomError> {
        for attempt in 1..=attempts.max(1) {
            if let Some(token) = self.acquire(key, ttl).await? {
                return Ok(Some(token));
            }
            tracing::trace!(key, attempt, "lock busy");
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
            }
        }
        Ok(None)
    }

    /// Releases the lock if `token` still holds it. Returns `false` if the
    /// lock had expired or changed hands.
    pub async fn release(&self, token: &LockToken) -> Result<bool, RoomError> {
        match self {
            Self::Local(lock) => Ok(lock.release(token).await),
            #[cfg(feature = "redis")]
            Self::Redis(lock) => lock.release(token).await,
        }
    }

    /// Extends the lock to `ttl` from now if `token` still holds it.
    pub async fn renew(&self, token: &LockToken, ttl: Duration) -> Result<bool, RoomError> {
        match self {
            Self::Local(lock) => Ok(lock.renew(token, ttl).await),
            #[cfg(feature = "redis")]
            Self::Redis(lock) => lock.renew(token, ttl).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn test_acquire_is_exclusive() {
        let lock = RoomLock::local();
        let token = lock.acquire("k", TTL).await.unwrap();
        assert!(token.is_some());
        assert!(lock.acquire("k", TTL).await.unwrap().is_none());
        assert!(lock.acquire("other", TTL).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_frees_key() {
        let lock = RoomLock::local();
        let token = lock.acquire("k", TTL).await.unwrap().unwrap();
        assert!(lock.release(&token).await.unwrap());
        assert!(!lock.release(&token).await.unwrap());
        assert!(lock.acquire("k", TTL).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_expires_after_ttl() {
        let lock = RoomLock::local();
        let stale = lock.acquire("k", TTL).await.unwrap().unwrap();
        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        let fresh = lock.acquire("k", TTL).await.unwrap().unwrap();
        // The expired holder can neither renew nor release the new lock.
        assert!(!lock.renew(&stale, TTL).await.unwrap());
        assert!(!lock.release(&stale).await.unwrap());
        assert!(lock.renew(&fresh, TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_extends_lifetime() {
        let lock = RoomLock::local();
        let token = lock.acquire("k", TTL).await.unwrap().unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(lock.renew(&token, TTL).await.unwrap());
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(lock.acquire("k", TTL).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_with_retry_waits_for_release() {
        let lock = RoomLock::local();
        let token = lock.acquire("k", TTL).await.unwrap().unwrap();

        let background = lock.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            background.release(&token).await.unwrap();
        });

        let got = lock
            .acquire_with_retry("k", TTL, 5, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(got.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_with_retry_gives_up() {
        let lock = RoomLock::local();
        let _held = lock.acquire("k", TTL).await.unwrap().unwrap();
        let got = lock
            .acquire_with_retry("k", TTL, 3, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_lock_config_json() {
        let config: LockConfig =
            serde_json::from_str(r#"{"backend":"redis","url":"redis://127.0.0.1/"}"#).unwrap();
        assert_eq!(
            config,
            LockConfig::Redis {
                url: "redis://127.0.0.1/".into()
            }
        );
        assert_eq!(serde_json::from_str::<LockConfig>(r#"{"backend":"local"}"#).unwrap(), LockConfig::Local);
    }

    #[test]
    fn test_keys_are_namespaced_by_room() {
        assert_eq!(admission_key(RoomId(7)), "admission:7");
        assert_eq!(pending_bot_key(RoomId(7)), "pending-bot-join:7");
    }
}
