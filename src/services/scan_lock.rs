//! Per-application scan lock in Redis.
//!
//! Acquired with `SET key token NX PX ttl` and released with a
//! compare-and-delete script, so a run whose lock expired cannot release the
//! lock of the run that replaced it. When Redis is unreachable the lock
//! degrades to a no-op and scans proceed unserialized.

use std::time::Duration;

use uuid::Uuid;

const KEY_PREFIX: &str = "codepulse:scan-lock:";

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[derive(Debug, Clone)]
pub struct ScanLock {
    client: redis::Client,
    ttl: Duration,
}

/// Outcome of a lock attempt.
#[derive(Debug)]
pub enum LockAttempt {
    Acquired(LockGuard),
    /// Another cycle holds the lock.
    Held,
    /// Redis could not be reached; the caller proceeds without a lock.
    Unavailable,
}

/// Proof of ownership; pass back to `ScanLock::release`.
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    token: String,
}

impl ScanLock {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self { client, ttl }
    }

    pub fn key(application_id: Uuid) -> String {
        format!("{KEY_PREFIX}{application_id}")
    }

    pub async fn acquire(&self, application_id: Uuid) -> LockAttempt {
        let key = Self::key(application_id);
        let token = Uuid::new_v4().to_string();

        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, %application_id, "Redis unavailable, scanning without lock");
                return LockAttempt::Unavailable;
            }
        };

        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let reply: redis::RedisResult<Option<String>> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await;

        match reply {
            Ok(Some(_)) => LockAttempt::Acquired(LockGuard { key, token }),
            Ok(None) => LockAttempt::Held,
            Err(e) => {
                tracing::warn!(error = %e, %application_id, "Scan lock acquisition failed, scanning without lock");
                LockAttempt::Unavailable
            }
        }
    }

    /// Release a lock this process still owns. Failures are logged; the TTL
    /// bounds how long a stuck lock can live.
    pub async fn release(&self, guard: LockGuard) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, key = %guard.key, "Redis unavailable, lock left to expire");
                return;
            }
        };

        let released: redis::RedisResult<i64> = redis::Script::new(RELEASE_SCRIPT)
            .key(&guard.key)
            .arg(&guard.token)
            .invoke_async(&mut conn)
            .await;

        match released {
            Ok(1) => {}
            Ok(_) => tracing::warn!(key = %guard.key, "Scan lock expired before release"),
            Err(e) => tracing::warn!(error = %e, key = %guard.key, "Scan lock release failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced_per_application() {
        let id = Uuid::nil();
        assert_eq!(
            ScanLock::key(id),
            "codepulse:scan-lock:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    async fn unreachable_redis_degrades_to_unavailable() {
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let lock = ScanLock::new(client, Duration::from_secs(5));
        assert!(matches!(lock.acquire(Uuid::new_v4()).await, LockAttempt::Unavailable));
    }
}
