use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Which cache store backs the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store, state is lost on restart.
    Memory { max_entries: Option<u64> },
    /// Remote Redis-compatible store.
    Redis { url: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: String,
    pub store: StoreBackend,
    pub view_ttl: Duration,
    pub view_ttl_sliding: bool,
    pub detail_ttl: Duration,
    pub reconcile_interval: Duration,
    pub ranking_limit: usize,
    pub warmup_on_start: bool,
}

impl Config {
    const DEFAULT_DATA_DIR: &'static str = "./data";
    const DEFAULT_VIEW_TTL_SECS: u64 = 35 * 60;
    const DEFAULT_DETAIL_TTL_SECS: u64 = 60 * 60;
    const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 100 * 60;
    const DEFAULT_RANKING_LIMIT: usize = 100;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = match lookup("CATALOG_REDIS_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => StoreBackend::Redis { url },
            None => StoreBackend::Memory {
                max_entries: lookup("CATALOG_MEMORY_MAX_ENTRIES")
                    .and_then(|raw| parse_or_warn("CATALOG_MEMORY_MAX_ENTRIES", &raw)),
            },
        };

        Self {
            data_dir: lookup("CATALOG_DATA_DIR")
                .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            store,
            view_ttl: Duration::from_secs(var_or(
                &lookup,
                "CATALOG_VIEW_TTL_SECS",
                Self::DEFAULT_VIEW_TTL_SECS,
            )),
            view_ttl_sliding: var_or(&lookup, "CATALOG_VIEW_TTL_SLIDING", false),
            detail_ttl: Duration::from_secs(var_or(
                &lookup,
                "CATALOG_DETAIL_TTL_SECS",
                Self::DEFAULT_DETAIL_TTL_SECS,
            )),
            reconcile_interval: Duration::from_secs(var_or(
                &lookup,
                "CATALOG_RECONCILE_INTERVAL_SECS",
                Self::DEFAULT_RECONCILE_INTERVAL_SECS,
            )),
            ranking_limit: var_or(&lookup, "CATALOG_RANKING_LIMIT", Self::DEFAULT_RANKING_LIMIT),
            warmup_on_start: var_or(&lookup, "CATALOG_WARMUP_ON_START", false),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn var_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name)
        .and_then(|raw| parse_or_warn(name, &raw))
        .unwrap_or(default)
}

fn parse_or_warn<T: FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{} has an unparseable value '{}', using default", name, raw);
            None
        }
    }
}
