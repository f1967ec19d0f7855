//! Response cache in front of the gateway
//!
//! Keys are SHA-256 hashes of `(operation, parameters)`. Entries are written
//! with a short TTL and read without locking beyond the store's own map;
//! two concurrent misses on the same key both fetch, which is accepted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use persistence::repository::{unix_now, CacheRepository};
use persistence::SqlitePool;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::CacheTtls;
use crate::error::{CacheError, GatewayError};
use crate::gateway::MarketGateway;
use crate::types::{ContractListing, Quote};

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// Deterministic cache key for an operation and its parameters
pub fn cache_key(operation: &str, params: &[&str]) -> String {
    let input = format!("{}:{}", operation, params.join("|"));
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Process-local store
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries only
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|m| m.values().filter(|(_, exp)| *exp > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let map = self.entries.read().unwrap_or_else(|p| p.into_inner());
        Ok(map
            .get(key)
            .filter(|(_, expires)| *expires > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        // An expiry past the clock's range is not stored
        let Some(expires) = Instant::now().checked_add(ttl) else {
            debug!(ttl_secs = ttl.as_secs(), "TTL out of range, entry not cached");
            return Ok(());
        };
        let mut map = self.entries.write().unwrap_or_else(|p| p.into_inner());
        map.retain(|_, (_, exp)| *exp > Instant::now());
        map.insert(key.to_string(), (value, expires));
        Ok(())
    }
}

/// Store backed by the `cache_entries` table
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Remove rows that have already expired
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let removed = CacheRepository::new(&self.pool)
            .purge_expired(unix_now())
            .await?;
        Ok(removed)
    }

    /// Reclaim file space after a purge
    pub async fn vacuum(&self) -> Result<(), CacheError> {
        CacheRepository::new(&self.pool).vacuum().await?;
        Ok(())
    }

    /// Stored rows, expired or not
    pub async fn count(&self) -> Result<i64, CacheError> {
        Ok(CacheRepository::new(&self.pool).count().await?)
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let record = CacheRepository::new(&self.pool)
            .get_live(key, unix_now())
            .await?;
        Ok(record.map(|r| r.value))
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl_secs = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);
        let expires_at = unix_now().saturating_add(ttl_secs);
        CacheRepository::new(&self.pool)
            .upsert(key, &value, expires_at)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Caching gateway
// ---------------------------------------------------------------------------

/// Serves gateway calls from `cache` when fresh, otherwise from `inner`
pub struct CachedGateway {
    inner: Arc<dyn MarketGateway>,
    cache: Arc<dyn CacheStore>,
    ttls: CacheTtls,
}

impl CachedGateway {
    pub fn new(inner: Arc<dyn MarketGateway>, cache: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        Self { inner, cache, ttls }
    }

    async fn cached<T, F, Fut>(
        &self,
        operation: &str,
        param: &str,
        ttl_secs: u64,
        fetch: F,
    ) -> Result<T, GatewayError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let key = cache_key(operation, &[param]);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(operation, param, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(operation, param, error = %e, "Discarding unreadable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(operation, param, error = %e, "Cache read failed, fetching upstream"),
        }

        let value = fetch().await?;

        if ttl_secs > 0 {
            match serde_json::to_string(&value) {
                Ok(raw) => {
                    if let Err(e) = self
                        .cache
                        .set_with_ttl(&key, raw, Duration::from_secs(ttl_secs))
                        .await
                    {
                        warn!(operation, param, error = %e, "Cache write failed");
                    }
                }
                Err(e) => warn!(operation, param, error = %e, "Cache encode failed"),
            }
        }

        Ok(value)
    }
}

#[async_trait]
impl MarketGateway for CachedGateway {
    async fn spot_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        self.cached("spot_price", symbol, self.ttls.spot_secs, || {
            self.inner.spot_price(symbol)
        })
        .await
    }

    async fn call_contracts(&self, underlying: &str) -> Result<Vec<ContractListing>, GatewayError> {
        self.cached("call_contracts", underlying, self.ttls.contracts_secs, || {
            self.inner.call_contracts(underlying)
        })
        .await
    }

    async fn quote(&self, contract_symbol: &str) -> Result<Quote, GatewayError> {
        self.cached("quote", contract_symbol, self.ttls.quotes_secs, || {
            self.inner.quote(contract_symbol)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::Database;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingGateway {
        spot_calls: AtomicU32,
        fail: bool,
    }

    impl CountingGateway {
        fn new(fail: bool) -> Self {
            Self {
                spot_calls: AtomicU32::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl MarketGateway for CountingGateway {
        async fn spot_price(&self, _symbol: &str) -> Result<Decimal, GatewayError> {
            self.spot_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GatewayError::NotFound("XYZ".into()))
            } else {
                Ok(dec!(139.57))
            }
        }

        async fn call_contracts(&self, _u: &str) -> Result<Vec<ContractListing>, GatewayError> {
            Ok(Vec::new())
        }

        async fn quote(&self, _c: &str) -> Result<Quote, GatewayError> {
            Ok(Quote {
                bid: dec!(1.11),
                ask: dec!(1.50),
            })
        }
    }

    #[test]
    fn test_cache_key_is_deterministic_and_distinct() {
        let a = cache_key("spot_price", &["AAPL"]);
        assert_eq!(a, cache_key("spot_price", &["AAPL"]));
        assert_ne!(a, cache_key("spot_price", &["MSFT"]));
        assert_ne!(a, cache_key("quote", &["AAPL"]));
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v".into(), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cached_gateway_serves_second_call_from_cache() {
        let inner = Arc::new(CountingGateway::new(false));
        let gateway = CachedGateway::new(
            inner.clone(),
            Arc::new(MemoryCache::new()),
            CacheTtls::default(),
        );

        assert_eq!(gateway.spot_price("XYZ").await.unwrap(), dec!(139.57));
        assert_eq!(gateway.spot_price("XYZ").await.unwrap(), dec!(139.57));
        assert_eq!(inner.spot_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_gateway_does_not_cache_errors() {
        let inner = Arc::new(CountingGateway::new(true));
        let gateway = CachedGateway::new(
            inner.clone(),
            Arc::new(MemoryCache::new()),
            CacheTtls::default(),
        );

        assert!(gateway.spot_price("XYZ").await.is_err());
        assert!(gateway.spot_price("XYZ").await.is_err());
        assert_eq!(inner.spot_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_caching() {
        let inner = Arc::new(CountingGateway::new(false));
        let ttls = CacheTtls {
            spot_secs: 0,
            ..Default::default()
        };
        let gateway = CachedGateway::new(inner.clone(), Arc::new(MemoryCache::new()), ttls);

        gateway.spot_price("XYZ").await.unwrap();
        gateway.spot_price("XYZ").await.unwrap();
        assert_eq!(inner.spot_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sqlite_cache_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let cache = SqliteCache::new(db.pool_clone());

        let quote = Quote {
            bid: dec!(1.11),
            ask: dec!(1.50),
        };
        let raw = serde_json::to_string(&quote).unwrap();
        cache
            .set_with_ttl("q", raw, Duration::from_secs(60))
            .await
            .unwrap();

        let back: Quote = serde_json::from_str(&cache.get("q").await.unwrap().unwrap()).unwrap();
        assert_eq!(back, quote);
        assert_eq!(cache.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_cache_purge_and_vacuum() {
        let db = Database::in_memory().await.unwrap();
        let cache = SqliteCache::new(db.pool_clone());
        let repo = persistence::repository::CacheRepository::new(db.pool());
        repo.upsert("stale", "v", unix_now() - 10).await.unwrap();
        cache
            .set_with_ttl("fresh", "v".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.count().await.unwrap(), 2);

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        cache.vacuum().await.unwrap();
        assert_eq!(cache.count().await.unwrap(), 1);
        assert_eq!(cache.get("fresh").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_not_cached() {
        let memory = MemoryCache::new();
        memory.set_with_ttl("k", "v".into(), Duration::MAX).await.unwrap();
        assert_eq!(memory.get("k").await.unwrap(), None);

        let db = Database::in_memory().await.unwrap();
        let sqlite = SqliteCache::new(db.pool_clone());
        sqlite.set_with_ttl("k", "v".into(), Duration::MAX).await.unwrap();
        assert_eq!(sqlite.get("k").await.unwrap(), Some("v".to_string()));
    }
}
