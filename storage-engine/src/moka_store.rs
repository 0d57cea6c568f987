use async_trait::async_trait;
use catalog::pipeline::{Command, CommandOutcome, Pipeline};
use catalog::ports::{CacheStore, Settlement};
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use shared::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
enum Data {
    Str(Vec<u8>),
    List(Vec<Vec<u8>>),
    ZSet(HashMap<Vec<u8>, f64>),
}

#[derive(Clone, Debug)]
struct StoredValue {
    data: Arc<Data>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(data: Data, expires_at: Option<Instant>) -> Self {
        Self {
            data: Arc::new(data),
            expires_at,
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| at > Instant::now())
    }

    // Same deadline, new content
    fn replace(&self, data: Data) -> Self {
        Self::new(data, self.expires_at)
    }
}

/// Per-entry expiry: every value carries its own deadline
struct DeadlineExpiry;

impl Expiry<String, StoredValue> for DeadlineExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        created_at: Instant,
    ) -> Option<Duration> {
        value
            .expires_at
            .map(|at| at.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value
            .expires_at
            .map(|at| at.saturating_duration_since(updated_at))
    }
}

fn deadline(ttl: Option<Duration>) -> Option<Instant> {
    ttl.map(|ttl| Instant::now() + ttl)
}

fn counter(key: &str, raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| Error::InvalidCounter {
            key: key.to_string(),
            value: String::from_utf8_lossy(raw).into_owned(),
        })
}

fn written(result: CompResult<String, StoredValue>) -> bool {
    matches!(result, CompResult::Inserted(_) | CompResult::ReplacedWith(_))
}

/// Moka-based in-process stand-in for the remote store.
/// Mirrors Redis semantics for the commands the catalog uses, including per-key TTLs, and
/// counts round trips so batching can be observed.
pub struct MokaStore {
    cache: Cache<String, StoredValue>,
    round_trips: AtomicU64,
    // Serializes the two-key counter operations
    counter_lock: Mutex<()>,
}

impl MokaStore {
    /// Create a Moka store with an optional bound on the number of keys
    pub fn new(name: &str, max_entries: Option<u64>) -> Self {
        let mut builder = Cache::builder().name(name).expire_after(DeadlineExpiry);

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        tracing::debug!("Created Moka store {} (max entries: {:?})", name, max_entries);

        Self {
            cache: builder.build(),
            round_trips: AtomicU64::new(0),
            counter_lock: Mutex::new(()),
        }
    }

    pub fn new_unbounded() -> Self {
        Self::new("catalog-cache", None)
    }

    /// Number of calls made against the store; a pipeline counts once
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    fn round_trip(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }

    async fn live(&self, key: &str) -> Option<StoredValue> {
        self.cache.get(key).await.filter(StoredValue::is_live)
    }

    /// Atomic read-modify-write of one key; expired entries are presented as absent
    async fn update<F>(&self, key: &str, f: F) -> Result<CompResult<String, StoredValue>>
    where
        F: FnOnce(Option<StoredValue>) -> Result<Op<StoredValue>> + Send,
    {
        self.cache
            .entry(key.to_string())
            .and_try_compute_with(|entry| {
                let current = entry
                    .map(|entry| entry.into_value())
                    .filter(StoredValue::is_live);
                std::future::ready(f(current))
            })
            .await
    }

    async fn do_get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.live(key).await {
            None => Ok(None),
            Some(value) => match value.data.as_ref() {
                Data::Str(bytes) => Ok(Some(bytes.clone())),
                _ => Err(Error::WrongType(key.to_string())),
            },
        }
    }

    async fn do_set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.cache
            .insert(key.to_string(), StoredValue::new(Data::Str(value), deadline(ttl)))
            .await;
        Ok(())
    }

    async fn do_set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let result = self
            .update(key, |current| {
                Ok(match current {
                    Some(_) => Op::Nop,
                    None => Op::Put(StoredValue::new(Data::Str(value), deadline(ttl))),
                })
            })
            .await?;
        Ok(written(result))
    }

    async fn do_incr(&self, key: &str) -> Result<i64> {
        let mut next = 0;
        self.update(key, |current| {
            let value = match current {
                None => {
                    next = 1;
                    StoredValue::new(Data::Str(b"1".to_vec()), None)
                }
                Some(current) => {
                    let Data::Str(raw) = current.data.as_ref() else {
                        return Err(Error::WrongType(key.to_string()));
                    };
                    next = counter(key, raw)?
                        .checked_add(1)
                        .ok_or_else(|| Error::InvalidCounter {
                            key: key.to_string(),
                            value: String::from_utf8_lossy(raw).into_owned(),
                        })?;
                    current.replace(Data::Str(next.to_string().into_bytes()))
                }
            };
            Ok(Op::Put(value))
        })
        .await?;
        Ok(next)
    }

    async fn do_expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let result = self
            .update(key, |current| {
                Ok(match current {
                    Some(current) => Op::Put(StoredValue {
                        data: current.data,
                        expires_at: deadline(Some(ttl)),
                    }),
                    None => Op::Nop,
                })
            })
            .await?;
        Ok(written(result))
    }

    async fn do_ttl(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self
            .live(key)
            .await
            .and_then(|value| value.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now())))
    }

    async fn do_rpush(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let mut len = 0;
        self.update(key, |current| {
            let updated = match current {
                None => StoredValue::new(Data::List(vec![value]), None),
                Some(current) => {
                    let Data::List(items) = current.data.as_ref() else {
                        return Err(Error::WrongType(key.to_string()));
                    };
                    let mut items = items.clone();
                    items.push(value);
                    current.replace(Data::List(items))
                }
            };
            if let Data::List(items) = updated.data.as_ref() {
                len = items.len() as u64;
            }
            Ok(Op::Put(updated))
        })
        .await?;
        Ok(len)
    }

    async fn do_list_last(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.live(key).await {
            None => Ok(None),
            Some(value) => match value.data.as_ref() {
                Data::List(items) => Ok(items.last().cloned()),
                _ => Err(Error::WrongType(key.to_string())),
            },
        }
    }

    async fn do_zadd(&self, key: &str, score: f64, member: Vec<u8>) -> Result<bool> {
        let mut added = false;
        self.update(key, |current| {
            let updated = match current {
                None => {
                    added = true;
                    StoredValue::new(Data::ZSet(HashMap::from([(member, score)])), None)
                }
                Some(current) => {
                    let Data::ZSet(members) = current.data.as_ref() else {
                        return Err(Error::WrongType(key.to_string()));
                    };
                    let mut members = members.clone();
                    added = members.insert(member, score).is_none();
                    current.replace(Data::ZSet(members))
                }
            };
            Ok(Op::Put(updated))
        })
        .await?;
        Ok(added)
    }

    async fn do_zrevrange(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        let Some(value) = self.live(key).await else {
            return Ok(Vec::new());
        };
        let Data::ZSet(members) = value.data.as_ref() else {
            return Err(Error::WrongType(key.to_string()));
        };
        if start > stop {
            return Ok(Vec::new());
        }

        let mut ranked: Vec<(Vec<u8>, f64)> = members
            .iter()
            .map(|(member, score)| (member.clone(), *score))
            .collect();
        // Highest score first, equal scores in reverse lexicographic member order
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        Ok(ranked
            .into_iter()
            .skip(start)
            .take((stop - start).saturating_add(1))
            .collect())
    }

    async fn do_scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, value)| key.starts_with(prefix) && value.is_live())
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn do_delete(&self, key: &str) -> Result<bool> {
        Ok(self
            .cache
            .remove(key)
            .await
            .is_some_and(|value| value.is_live()))
    }

    async fn do_seed_counter(
        &self,
        counter: &str,
        baseline: &str,
        value: i64,
        ttl: Duration,
        baseline_ttl: Duration,
    ) -> Result<bool> {
        let _guard = self.counter_lock.lock().await;
        if self.live(counter).await.is_some() {
            return Ok(false);
        }

        let raw = value.to_string().into_bytes();
        // Baseline first, a seeded counter is never visible without it
        self.do_set(baseline, raw.clone(), Some(baseline_ttl)).await?;
        self.do_set_nx(counter, raw, Some(ttl)).await
    }

    async fn do_settle_counter(
        &self,
        counter_key: &str,
        baseline_key: &str,
        flushed: i64,
        baseline_seen: Option<i64>,
    ) -> Result<Settlement> {
        let _guard = self.counter_lock.lock().await;

        let baseline = match self.do_get(baseline_key).await? {
            Some(raw) => Some(counter(baseline_key, &raw)?),
            None => None,
        };
        if baseline != baseline_seen {
            return Ok(Settlement::Untouched);
        }

        let mut settlement = Settlement::Untouched;
        let mut counter_deadline = None;
        self.update(counter_key, |current| {
            let Some(current) = current else {
                return Ok(Op::Nop);
            };
            let Data::Str(raw) = current.data.as_ref() else {
                return Err(Error::WrongType(counter_key.to_string()));
            };
            if counter(counter_key, raw)? == flushed {
                settlement = Settlement::Cleared;
                Ok(Op::Remove)
            } else {
                settlement = Settlement::Rebased;
                counter_deadline = current.expires_at;
                Ok(Op::Nop)
            }
        })
        .await?;

        match settlement {
            Settlement::Cleared => {
                self.cache.remove(baseline_key).await;
            }
            Settlement::Rebased => {
                let raw = flushed.to_string().into_bytes();
                let expires_at = match self.live(baseline_key).await {
                    Some(existing) => existing.expires_at,
                    // Raw counter: the new baseline outlives it
                    None => counter_deadline.map(|at| {
                        let now = Instant::now();
                        now + at.saturating_duration_since(now) * 2
                    }),
                };
                self.cache
                    .insert(
                        baseline_key.to_string(),
                        StoredValue::new(Data::Str(raw), expires_at),
                    )
                    .await;
            }
            Settlement::Untouched => {}
        }

        Ok(settlement)
    }

    async fn run_command(&self, command: Command) -> Result<CommandOutcome> {
        match command {
            Command::Set { key, value, ttl } => {
                self.do_set(&key, value, ttl).await?;
                Ok(CommandOutcome::Ok)
            }
            Command::RPush { key, value } => {
                let len = self.do_rpush(&key, value).await?;
                Ok(CommandOutcome::Count(len as i64))
            }
            Command::ZAdd { key, score, member } => {
                let added = self.do_zadd(&key, score, member).await?;
                Ok(CommandOutcome::Count(i64::from(added)))
            }
            Command::Expire { key, ttl } => {
                let set = self.do_expire(&key, ttl).await?;
                Ok(CommandOutcome::Count(i64::from(set)))
            }
        }
    }
}

impl Default for MokaStore {
    fn default() -> Self {
        Self::new_unbounded()
    }
}

#[async_trait]
impl CacheStore for MokaStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.round_trip();
        self.do_get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.round_trip();
        self.do_set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        self.round_trip();
        self.do_set_nx(key, value, ttl).await
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.round_trip();
        self.do_incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.round_trip();
        self.do_expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.round_trip();
        self.do_ttl(key).await
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        self.round_trip();
        self.do_rpush(key, value).await
    }

    async fn list_last(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.round_trip();
        self.do_list_last(key).await
    }

    async fn zadd(&self, key: &str, score: f64, member: Vec<u8>) -> Result<bool> {
        self.round_trip();
        self.do_zadd(key, score, member).await
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        self.round_trip();
        self.do_zrevrange(key, start, stop).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.round_trip();
        self.do_scan_prefix(prefix).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.round_trip();
        self.do_delete(key).await
    }

    async fn seed_counter(
        &self,
        counter: &str,
        baseline: &str,
        value: i64,
        ttl: Duration,
        baseline_ttl: Duration,
    ) -> Result<bool> {
        self.round_trip();
        self.do_seed_counter(counter, baseline, value, ttl, baseline_ttl)
            .await
    }

    async fn settle_counter(
        &self,
        counter: &str,
        baseline: &str,
        flushed: i64,
        baseline_seen: Option<i64>,
    ) -> Result<Settlement> {
        self.round_trip();
        self.do_settle_counter(counter, baseline, flushed, baseline_seen)
            .await
    }

    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<CommandOutcome>> {
        self.round_trip();

        let mut outcomes = Vec::with_capacity(pipeline.len());
        for command in pipeline.into_commands() {
            let outcome = self
                .run_command(command)
                .await
                .unwrap_or_else(|e| CommandOutcome::Failed(e.to_string()));
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}

impl std::fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("entry_count", &self.cache.entry_count())
            .field("round_trips", &self.round_trips())
            .finish()
    }
}
