//! Cached per-symbol constraints with remote refresh and static fallback.
//!
//! Lookups resolve in this order:
//!
//! 1. A cache entry younger than its TTL (no I/O).
//! 2. A fetch from the [`MetadataProvider`], bounded by a timeout and validated
//!    field by field against the static table.
//! 3. On fetch failure: the previous cache entry if one exists, otherwise the
//!    static table entry, otherwise the global default.
//!
//! Refreshes are serialized per symbol. Concurrent misses for the same symbol
//! wait on a single in-flight fetch and then read its result, so the provider
//! sees at most one request per symbol at a time. Reads of other symbols and
//! fresh cache hits never wait on a refresh.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use quantgate_core::{
    InstrumentConfig, MetadataProvider, ProviderError, RawInstrumentFilters, SymbolNormalizer,
};
use rust_decimal::Decimal;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constraint::{ConstraintSource, InstrumentConstraint};
use crate::static_table::StaticConstraintTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub cache_ttl: Duration,
    pub fallback_ttl: Duration,
    pub fetch_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from(&InstrumentConfig::default())
    }
}

impl From<&InstrumentConfig> for StoreConfig {
    fn from(config: &InstrumentConfig) -> Self {
        Self {
            cache_ttl: config.cache_ttl(),
            fallback_ttl: config.fallback_ttl(),
            fetch_timeout: config.fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    constraint: InstrumentConstraint,
    stored_at: Instant,
    ttl: Duration,
    /// Monotonic refresh counter; lets a waiter tell whether a refresh
    /// completed while it was queued.
    generation: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// Why a fetched payload was not used.
#[derive(Debug)]
enum FetchFailure {
    Provider(ProviderError),
    Timeout(Duration),
    Empty,
    SymbolMismatch(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider(e) => write!(f, "{e}"),
            Self::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
            Self::Empty => write!(f, "payload carried no filters"),
            Self::SymbolMismatch(other) => write!(f, "payload is for {other}"),
        }
    }
}

pub struct ConstraintStore {
    provider: Arc<dyn MetadataProvider>,
    table: StaticConstraintTable,
    normalizer: SymbolNormalizer,
    config: StoreConfig,
    cache: RwLock<HashMap<String, CacheEntry>>,
    refresh_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for ConstraintStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintStore")
            .field("config", &self.config)
            .field("static_entries", &self.table.len())
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

impl ConstraintStore {
    #[must_use]
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        table: StaticConstraintTable,
        config: StoreConfig,
    ) -> Self {
        Self {
            provider,
            table,
            normalizer: SymbolNormalizer::new(),
            config,
            cache: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Builds a store from application configuration: built-in table with
    /// configured overrides, configured TTLs and suffixes.
    #[must_use]
    pub fn from_config(provider: Arc<dyn MetadataProvider>, config: &InstrumentConfig) -> Self {
        let normalizer = SymbolNormalizer::new().with_suffixes(&config.extra_suffixes);
        let table = StaticConstraintTable::builtin().with_overrides(&config.overrides, &normalizer);
        Self::new(provider, table, StoreConfig::from(config)).with_normalizer(normalizer)
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: SymbolNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn normalizer(&self) -> &SymbolNormalizer {
        &self.normalizer
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the constraint for `symbol`, refreshing from the provider when
    /// the cached entry is missing, expired, or `force_refresh` is set.
    ///
    /// Never fails: provider problems degrade to the fallback chain.
    pub async fn get(&self, symbol: &str, force_refresh: bool) -> InstrumentConstraint {
        let key = self.normalizer.normalize(symbol);

        let seen_generation = {
            let cache = self.cache.read();
            match cache.get(&key) {
                Some(entry) if !force_refresh && entry.is_fresh(Instant::now()) => {
                    debug!(symbol = %key, source = %entry.constraint.source, "Constraint cache hit");
                    return entry.constraint.clone();
                }
                Some(entry) => Some(entry.generation),
                None => None,
            }
        };

        let lock = self.refresh_lock(&key);
        let constraint = {
            let _guard = lock.lock().await;

            // Another caller may have completed a refresh while we were queued.
            let reusable = self.cache.read().get(&key).and_then(|entry| {
                let refreshed_meanwhile = Some(entry.generation) != seen_generation;
                (refreshed_meanwhile && (force_refresh || entry.is_fresh(Instant::now())))
                    .then(|| entry.constraint.clone())
            });
            match reusable {
                Some(constraint) => constraint,
                None => self.refresh(&key).await,
            }
        };
        self.release_refresh_lock(&key, lock);
        constraint
    }

    /// Returns the cached constraint (even if expired) or the static fallback.
    /// Never performs I/O and never waits on an in-flight refresh.
    #[must_use]
    pub fn peek(&self, symbol: &str) -> InstrumentConstraint {
        let key = self.normalizer.normalize(symbol);
        if let Some(entry) = self.cache.read().get(&key) {
            return entry.constraint.clone();
        }
        self.table.resolve(&key)
    }

    /// Drops one cached symbol, or the whole cache when `symbol` is `None`.
    pub fn invalidate(&self, symbol: Option<&str>) {
        match symbol {
            Some(symbol) => {
                let key = self.normalizer.normalize(symbol);
                if self.cache.write().remove(&key).is_some() {
                    info!(symbol = %key, "Constraint cache entry invalidated");
                }
            }
            None => {
                let mut cache = self.cache.write();
                let dropped = cache.len();
                cache.clear();
                self.refresh_locks
                    .lock()
                    .retain(|_, lock| Arc::strong_count(lock) > 1);
                info!(dropped, "Constraint cache cleared");
            }
        }
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Number of symbols with a refresh lock currently allocated.
    #[must_use]
    pub fn refresh_lock_count(&self) -> usize {
        self.refresh_locks.lock().len()
    }

    fn refresh_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.refresh_locks.lock();
        Arc::clone(
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Drops the map's lock for `key` once no other caller holds or waits on
    /// it. Clones are only taken under the map lock, so the count is exact.
    fn release_refresh_lock(&self, key: &str, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.refresh_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
        drop(lock);
    }

    /// Fetches, validates and caches. The cache is written once, after the
    /// replacement entry is complete; a cancelled or timed-out fetch leaves the
    /// previous entry untouched.
    async fn refresh(&self, key: &str) -> InstrumentConstraint {
        let fetched = tokio::time::timeout(
            self.config.fetch_timeout,
            self.provider.fetch_instrument_metadata(key),
        )
        .await;

        let outcome = match fetched {
            Ok(Ok(raw)) if raw.is_empty() => Err(FetchFailure::Empty),
            Ok(Ok(raw)) => match raw.symbol.as_deref().map(|s| self.normalizer.normalize(s)) {
                Some(reported) if reported != key => Err(FetchFailure::SymbolMismatch(reported)),
                _ => Ok(raw),
            },
            Ok(Err(e)) => Err(FetchFailure::Provider(e)),
            Err(_) => Err(FetchFailure::Timeout(self.config.fetch_timeout)),
        };

        let (constraint, ttl) = match outcome {
            Ok(raw) => {
                let constraint = self.from_remote(key, &raw);
                debug!(
                    symbol = %key,
                    tick_size = %constraint.tick_size,
                    qty_step = %constraint.qty_step,
                    min_qty = %constraint.min_qty,
                    min_notional = %constraint.min_notional,
                    "Constraint refreshed from provider"
                );
                (constraint, self.config.cache_ttl)
            }
            Err(failure) => {
                let constraint = self.fallback(key);
                warn!(
                    symbol = %key,
                    reason = %failure,
                    source = %constraint.source,
                    "Metadata fetch failed, using fallback constraint"
                );
                (constraint, self.config.fallback_ttl)
            }
        };

        let entry = CacheEntry {
            constraint: constraint.clone(),
            stored_at: Instant::now(),
            ttl,
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
        };
        self.cache.write().insert(key.to_string(), entry);
        constraint
    }

    fn fallback(&self, key: &str) -> InstrumentConstraint {
        if let Some(entry) = self.cache.read().get(key) {
            return entry.constraint.clone();
        }
        self.table.resolve(key)
    }

    /// Builds a constraint from provider filters. Each absent, unparseable or
    /// non-positive field falls back to the table value; steps that are
    /// implausibly fine compared to a known symbol's table value are replaced.
    fn from_remote(&self, key: &str, raw: &RawInstrumentFilters) -> InstrumentConstraint {
        let known = self.table.lookup(key);
        let base = self.table.resolve(key);

        let positive = |v: Option<Decimal>| v.filter(|v| *v > Decimal::ZERO);

        let qty_step = guard_suspect(
            key,
            "qty_step",
            positive(raw.qty_step()),
            known.map(|k| k.qty_step),
        )
        .unwrap_or(base.qty_step);
        let min_qty = guard_suspect(
            key,
            "min_qty",
            positive(raw.min_qty()),
            known.map(|k| k.min_qty),
        )
        .unwrap_or(base.min_qty);

        InstrumentConstraint {
            symbol: key.to_string(),
            tick_size: positive(raw.tick_size()).unwrap_or(base.tick_size),
            qty_step,
            min_qty,
            max_qty: positive(raw.max_qty()).unwrap_or(base.max_qty),
            max_market_qty: positive(raw.max_market_qty()).unwrap_or(base.max_market_qty),
            min_notional: raw
                .min_notional()
                .filter(|v| *v >= Decimal::ZERO)
                .unwrap_or(base.min_notional),
            min_price: positive(raw.min_price()).or(base.min_price),
            max_price: positive(raw.max_price()).or(base.max_price),
            source: ConstraintSource::Remote,
        }
    }
}

/// Rejects a fetched value below half of the known table value.
fn guard_suspect(
    key: &str,
    field: &'static str,
    fetched: Option<Decimal>,
    reference: Option<Decimal>,
) -> Option<Decimal> {
    match (fetched, reference) {
        (Some(value), Some(reference)) if value < reference / Decimal::TWO => {
            warn!(
                symbol = %key,
                field,
                fetched = %value,
                reference = %reference,
                "Suspect metadata value below half of reference, using reference"
            );
            Some(reference)
        }
        (fetched, _) => fetched,
    }
}
