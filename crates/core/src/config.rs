use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub instruments: InstrumentConfig,
    pub validator: ValidatorConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Age after which a fetched constraint is refreshed on next access.
    pub cache_ttl_secs: u64,
    /// Shorter lifetime for entries that came from a fallback after a failed fetch.
    pub fallback_ttl_secs: u64,
    /// Upper bound on a single metadata fetch.
    pub fetch_timeout_ms: u64,
    /// Derivative suffixes stripped in addition to the built-in ones.
    pub extra_suffixes: Vec<String>,
    /// Per-symbol corrections layered over the compiled-in table.
    pub overrides: HashMap<String, ConstraintOverride>,
}

impl InstrumentConfig {
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub const fn fallback_ttl(&self) -> Duration {
        Duration::from_secs(self.fallback_ttl_secs)
    }

    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 1800,
            fallback_ttl_secs: 60,
            fetch_timeout_ms: 2000,
            extra_suffixes: Vec::new(),
            overrides: HashMap::new(),
        }
    }
}

/// Partial constraint values; unset fields keep the table value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintOverride {
    pub tick_size: Option<Decimal>,
    pub qty_step: Option<Decimal>,
    pub min_qty: Option<Decimal>,
    pub max_qty: Option<Decimal>,
    pub max_market_qty: Option<Decimal>,
    pub min_notional: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Raise undersized quantities to the instrument minimum instead of rejecting them.
    pub enforce_min: bool,
    pub round_up_qty: bool,
    pub round_up_price: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enforce_min: true,
            round_up_qty: false,
            round_up_price: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Reject fills whose quantity is not a multiple of the symbol's quantity step.
    pub reject_off_grid_fills: bool,
    /// Closed positions retained in memory; oldest are dropped first.
    pub history_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reject_off_grid_fills: true,
            history_limit: 10_000,
        }
    }
}
