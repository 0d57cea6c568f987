use async_trait::async_trait;
use catalog::pipeline::{Command, CommandOutcome, Pipeline};
use catalog::ports::{CacheStore, Settlement};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, Script, Value};
use shared::{Error, Result};
use std::time::Duration;

/// Redis-backed cache store over a reconnecting connection manager
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    url: String,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| unavailable(url, e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| unavailable(url, e))?;

        tracing::info!("Connected to Redis at {}", url);

        Ok(Self {
            conn,
            url: url.to_string(),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

// KEYS: counter, baseline. ARGV: value, counter ttl ms, baseline ttl ms.
const SEED_COUNTER_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('SET', KEYS[2], ARGV[1], 'PX', ARGV[3])
redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
return 1
"#;

// KEYS: counter, baseline. ARGV: flushed value, baseline seen ('' when absent).
// Returns 1 cleared, 2 rebased, 0 untouched.
const SETTLE_COUNTER_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return 0
end
local baseline = redis.call('GET', KEYS[2])
if (baseline or '') ~= ARGV[2] then
    return 0
end
if tonumber(current) == tonumber(ARGV[1]) then
    redis.call('DEL', KEYS[1], KEYS[2])
    return 1
end
local ttl = redis.call('PTTL', KEYS[2])
if ttl < 0 then
    ttl = redis.call('PTTL', KEYS[1]) * 2
end
if ttl > 0 then
    redis.call('SET', KEYS[2], ARGV[1], 'PX', ttl)
else
    redis.call('SET', KEYS[2], ARGV[1])
end
return 2
"#;

const SCAN_BATCH: usize = 500;

fn unavailable(target: &str, e: RedisError) -> Error {
    Error::Unavailable(format!("redis {}: {}", target, e))
}

fn store_error(key: &str, e: RedisError) -> Error {
    if e.code() == Some("WRONGTYPE") {
        Error::WrongType(key.to_string())
    } else {
        unavailable(key, e)
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn set_cmd(key: &str, value: &[u8], ttl: Option<Duration>) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl {
        cmd.arg("PX").arg(millis(ttl));
    }
    cmd
}

fn outcome(value: Value) -> CommandOutcome {
    match value {
        Value::Int(n) => CommandOutcome::Count(n),
        Value::ServerError(e) => CommandOutcome::Failed(RedisError::from(e).to_string()),
        _ => CommandOutcome::Ok,
    }
}

fn settlement(code: i64) -> Settlement {
    match code {
        1 => Settlement::Cleared,
        2 => Settlement::Rebased,
        _ => Settlement::Untouched,
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = self
            .conn()
            .get(key)
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let (): () = set_cmd(key, &value, ttl)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let mut cmd = set_cmd(key, &value, ttl);
        cmd.arg("NX");
        // Nil when the key already exists
        let reply: Option<String> = cmd
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(reply.is_some())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let value: i64 = self
            .conn()
            .incr(key, 1i64)
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let set: bool = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis(ttl))
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(set)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        // -2 missing key, -1 no expiry
        let ms: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(u64::try_from(ms).ok().map(Duration::from_millis))
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let len: u64 = self
            .conn()
            .rpush(key, value)
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(len)
    }

    async fn list_last(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value: Option<Vec<u8>> = self
            .conn()
            .lindex(key, -1)
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(value)
    }

    async fn zadd(&self, key: &str, score: f64, member: Vec<u8>) -> Result<bool> {
        let added: i64 = self
            .conn()
            .zadd(key, member, score)
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(added > 0)
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        if start > stop {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(stop).unwrap_or(isize::MAX);
        let start = isize::try_from(start).unwrap_or(isize::MAX);
        let members: Vec<(Vec<u8>, f64)> = self
            .conn()
            .zrevrange_withscores(key, start, stop)
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(members)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}*", prefix);
        let mut conn = self.conn();

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| store_error(&pattern, e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed: i64 = self
            .conn()
            .del(key)
            .await
            .map_err(|e| store_error(key, e))?;
        Ok(removed > 0)
    }

    async fn seed_counter(
        &self,
        counter: &str,
        baseline: &str,
        value: i64,
        ttl: Duration,
        baseline_ttl: Duration,
    ) -> Result<bool> {
        let seeded: i64 = Script::new(SEED_COUNTER_SCRIPT)
            .key(counter)
            .key(baseline)
            .arg(value)
            .arg(millis(ttl))
            .arg(millis(baseline_ttl))
            .invoke_async(&mut self.conn())
            .await
            .map_err(|e| store_error(counter, e))?;
        Ok(seeded == 1)
    }

    async fn settle_counter(
        &self,
        counter: &str,
        baseline: &str,
        flushed: i64,
        baseline_seen: Option<i64>,
    ) -> Result<Settlement> {
        let seen = baseline_seen.map(|b| b.to_string()).unwrap_or_default();
        let code: i64 = Script::new(SETTLE_COUNTER_SCRIPT)
            .key(counter)
            .key(baseline)
            .arg(flushed)
            .arg(seen)
            .invoke_async(&mut self.conn())
            .await
            .map_err(|e| store_error(counter, e))?;
        Ok(settlement(code))
    }

    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<CommandOutcome>> {
        if pipeline.is_empty() {
            return Ok(Vec::new());
        }

        // Error replies come back as values, one per command
        let mut pipe = redis::pipe();
        pipe.ignore_errors();
        for command in pipeline.commands() {
            match command {
                Command::Set { key, value, ttl } => {
                    pipe.add_command(set_cmd(key, value, *ttl));
                }
                Command::RPush { key, value } => {
                    pipe.cmd("RPUSH").arg(key).arg(value);
                }
                Command::ZAdd { key, score, member } => {
                    pipe.cmd("ZADD").arg(key).arg(*score).arg(member);
                }
                Command::Expire { key, ttl } => {
                    pipe.cmd("PEXPIRE").arg(key).arg(millis(*ttl));
                }
            }
        }

        let values: Vec<Value> = pipe
            .query_async(&mut self.conn())
            .await
            .map_err(|e| unavailable("pipeline", e))?;

        Ok(values.into_iter().map(outcome).collect())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish()
    }
}
