//! Redis-backed cooldown store.
//!
//! Check-and-record runs as one Lua script on the server, so every instance
//! of the service sharing the Redis sees a linearizable history per key.
//! Granted records carry a TTL equal to the window.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{RedisError, Script};

use crate::store::types::{
    duration_millis, CooldownOutcome, CooldownStore, GrantMode, KeyValueStore, StoreError,
    StoreResult,
};

/// KEYS[1]: record. ARGV: now, window ms, claim window ms (0 for checks),
/// stamp for a fresh grant.
///
/// Replies `{1, 0}` granted, `{2, grant}` claimed, `{0, record}` held.
const CHECK_AND_RECORD_LUA: &str = r#"
local last = redis.call('GET', KEYS[1])
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local claim = tonumber(ARGV[3])
if last then
  local last_ms = tonumber(last)
  if not last_ms or last_ms < 0 or last_ms ~= math.floor(last_ms) then
    return redis.error_reply('ERR corrupt cooldown record ' .. last)
  end
  local age = now - last_ms
  if age < window then
    if claim > 0 and last_ms % 2 == 0 and age < claim then
      local ttl = window - math.max(age, 0)
      redis.call('SET', KEYS[1], string.format('%d', last_ms + 1), 'PX', string.format('%d', ttl))
      return {2, last_ms}
    end
    return {0, last_ms}
  end
end
redis.call('SET', KEYS[1], ARGV[4], 'PX', ARGV[2])
return {1, 0}
"#;

/// Shared Redis connection plus the preloaded script.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    script: Script,
}

impl RedisStore {
    /// Connect to Redis.
    ///
    /// The multiplexed connection is cheap to clone and reconnects lazily.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("Invalid Redis URL: {}", e)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::from)?;

        tracing::info!("Redis cooldown store connected");

        Ok(Self {
            conn,
            script: Script::new(CHECK_AND_RECORD_LUA),
        })
    }
}

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
        {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

/// Interpret the script's `{code, value}` reply.
fn decode_reply((code, value): (i64, i64)) -> StoreResult<CooldownOutcome> {
    match (code, u64::try_from(value)) {
        (1, _) => Ok(CooldownOutcome::Granted),
        (2, Ok(granted_ms)) => Ok(CooldownOutcome::Claimed { granted_ms }),
        (0, Ok(last_granted_ms)) => Ok(CooldownOutcome::Held { last_granted_ms }),
        _ => Err(StoreError::Command(format!(
            "unexpected script reply ({}, {})",
            code, value
        ))),
    }
}

#[async_trait]
impl CooldownStore for RedisStore {
    async fn check_and_record(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
        mode: GrantMode,
    ) -> StoreResult<CooldownOutcome> {
        let mut conn = self.conn.clone();
        let reply: (i64, i64) = self
            .script
            .key(key)
            .arg(now_ms)
            .arg(duration_millis(window))
            .arg(mode.claim_window_ms())
            .arg(mode.stamp(now_ms))
            .invoke_async(&mut conn)
            .await?;
        decode_reply(reply)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(duration_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }
}
