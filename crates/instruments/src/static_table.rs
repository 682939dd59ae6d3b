//! Compiled-in constraint table used when the metadata provider is unavailable
//! or reports values that fail validation.

use std::collections::HashMap;

use quantgate_core::{ConstraintOverride, SymbolNormalizer};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::constraint::{ConstraintSource, InstrumentConstraint};

/// (symbol, tick, step, min, max, max market, min notional)
type Row = (&'static str, Decimal, Decimal, Decimal, Decimal, Decimal, Decimal);

const BUILTIN: &[Row] = &[
    ("BTCUSDT", dec!(0.10), dec!(0.001), dec!(0.001), dec!(1190), dec!(119), dec!(5)),
    ("ETHUSDT", dec!(0.01), dec!(0.01), dec!(0.01), dec!(7240), dec!(724), dec!(5)),
    ("SOLUSDT", dec!(0.010), dec!(0.1), dec!(0.1), dec!(79770), dec!(7977), dec!(5)),
    ("BNBUSDT", dec!(0.010), dec!(0.01), dec!(0.01), dec!(1500), dec!(150), dec!(5)),
    ("XRPUSDT", dec!(0.0001), dec!(1), dec!(1), dec!(1946700), dec!(194670), dec!(5)),
    ("DOGEUSDT", dec!(0.00001), dec!(1), dec!(1), dec!(92778000), dec!(9277800), dec!(5)),
    ("ADAUSDT", dec!(0.0001), dec!(1), dec!(1), dec!(3773800), dec!(377380), dec!(5)),
    ("LINKUSDT", dec!(0.001), dec!(0.1), dec!(0.1), dec!(59080), dec!(5908), dec!(5)),
    ("AVAXUSDT", dec!(0.001), dec!(0.1), dec!(0.1), dec!(22640), dec!(2264), dec!(5)),
    ("LTCUSDT", dec!(0.01), dec!(0.1), dec!(0.1), dec!(7100), dec!(710), dec!(5)),
];

/// Values for symbols absent from every other source.
pub const DEFAULT_TICK_SIZE: Decimal = dec!(0.01);
pub const DEFAULT_QTY_STEP: Decimal = dec!(0.001);
pub const DEFAULT_MIN_QTY: Decimal = dec!(0.001);
pub const DEFAULT_MAX_QTY: Decimal = dec!(1000000);
pub const DEFAULT_MAX_MARKET_QTY: Decimal = dec!(100000);
pub const DEFAULT_MIN_NOTIONAL: Decimal = dec!(5);

#[derive(Debug, Clone)]
pub struct StaticConstraintTable {
    entries: HashMap<String, InstrumentConstraint>,
}

impl StaticConstraintTable {
    /// The compiled-in table.
    #[must_use]
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(symbol, tick, step, min, max, max_mkt, notional)| {
                (
                    symbol.to_string(),
                    InstrumentConstraint {
                        symbol: symbol.to_string(),
                        tick_size: tick,
                        qty_step: step,
                        min_qty: min,
                        max_qty: max,
                        max_market_qty: max_mkt,
                        min_notional: notional,
                        min_price: None,
                        max_price: None,
                        source: ConstraintSource::Static,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// An empty table; every lookup resolves to the global default.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Layers configured overrides over the table. Symbols the table does not
    /// know start from the global default.
    #[must_use]
    pub fn with_overrides(
        mut self,
        overrides: &HashMap<String, ConstraintOverride>,
        normalizer: &SymbolNormalizer,
    ) -> Self {
        for (symbol, patch) in overrides {
            let key = normalizer.normalize(symbol);
            let base = self
                .entries
                .remove(&key)
                .unwrap_or_else(|| Self::default_for(&key));
            self.entries.insert(key, apply_override(base, patch));
        }
        self
    }

    /// Adds or replaces a single entry.
    #[must_use]
    pub fn with_entry(mut self, constraint: InstrumentConstraint) -> Self {
        self.entries.insert(constraint.symbol.clone(), constraint);
        self
    }

    /// Entry for a known symbol. `key` must already be normalized.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&InstrumentConstraint> {
        self.entries.get(key)
    }

    /// Entry for `key`, or the global default carrying `key` as its symbol.
    #[must_use]
    pub fn resolve(&self, key: &str) -> InstrumentConstraint {
        self.lookup(key)
            .cloned()
            .unwrap_or_else(|| Self::default_for(key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn default_for(key: &str) -> InstrumentConstraint {
        InstrumentConstraint {
            symbol: key.to_string(),
            tick_size: DEFAULT_TICK_SIZE,
            qty_step: DEFAULT_QTY_STEP,
            min_qty: DEFAULT_MIN_QTY,
            max_qty: DEFAULT_MAX_QTY,
            max_market_qty: DEFAULT_MAX_MARKET_QTY,
            min_notional: DEFAULT_MIN_NOTIONAL,
            min_price: None,
            max_price: None,
            source: ConstraintSource::Default,
        }
    }
}

impl Default for StaticConstraintTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn apply_override(base: InstrumentConstraint, patch: &ConstraintOverride) -> InstrumentConstraint {
    InstrumentConstraint {
        tick_size: patch.tick_size.unwrap_or(base.tick_size),
        qty_step: patch.qty_step.unwrap_or(base.qty_step),
        min_qty: patch.min_qty.unwrap_or(base.min_qty),
        max_qty: patch.max_qty.unwrap_or(base.max_qty),
        max_market_qty: patch.max_market_qty.unwrap_or(base.max_market_qty),
        min_notional: patch.min_notional.unwrap_or(base.min_notional),
        source: ConstraintSource::Override,
        ..base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_known_symbol() {
        let table = StaticConstraintTable::builtin();
        let btc = table.lookup("BTCUSDT").unwrap();
        assert_eq!(btc.qty_step, dec!(0.001));
        assert_eq!(btc.tick_size, dec!(0.1));
        assert_eq!(btc.source, ConstraintSource::Static);
    }

    #[test]
    fn test_builtin_rows_are_self_consistent() {
        let table = StaticConstraintTable::builtin();
        for &(symbol, ..) in BUILTIN {
            let c = table.lookup(symbol).unwrap();
            assert!(c.tick_size > Decimal::ZERO, "{symbol} tick");
            assert!(c.qty_step > Decimal::ZERO, "{symbol} step");
            assert!(c.is_on_qty_grid(c.min_qty), "{symbol} min on grid");
            assert!(c.max_market_qty <= c.max_qty, "{symbol} market cap");
        }
    }

    #[test]
    fn test_unknown_symbol_resolves_to_default() {
        let table = StaticConstraintTable::builtin();
        assert!(table.lookup("NEWCOINUSDT").is_none());

        let resolved = table.resolve("NEWCOINUSDT");
        assert_eq!(resolved.symbol, "NEWCOINUSDT");
        assert_eq!(resolved.source, ConstraintSource::Default);
        assert_eq!(resolved.qty_step, DEFAULT_QTY_STEP);
    }

    #[test]
    fn test_overrides_patch_known_and_add_unknown() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "BTCUSDT.P".to_string(),
            ConstraintOverride {
                min_notional: Some(dec!(10)),
                ..ConstraintOverride::default()
            },
        );
        overrides.insert(
            "NEWCOINUSDT".to_string(),
            ConstraintOverride {
                qty_step: Some(dec!(10)),
                min_qty: Some(dec!(10)),
                ..ConstraintOverride::default()
            },
        );

        let table =
            StaticConstraintTable::builtin().with_overrides(&overrides, &SymbolNormalizer::new());

        let btc = table.lookup("BTCUSDT").unwrap();
        assert_eq!(btc.min_notional, dec!(10));
        assert_eq!(btc.qty_step, dec!(0.001));
        assert_eq!(btc.source, ConstraintSource::Override);

        let new_coin = table.lookup("NEWCOINUSDT").unwrap();
        assert_eq!(new_coin.qty_step, dec!(10));
        assert_eq!(new_coin.tick_size, DEFAULT_TICK_SIZE);
    }
}
