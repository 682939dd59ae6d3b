//! Per-instrument quantization constraints and the grid operations on them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::quantizer::{self, QuantizeError, RoundingDirection};

/// Where a constraint's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintSource {
    /// Fetched from the metadata provider and validated.
    Remote,
    /// Compiled-in table entry for a known symbol.
    Static,
    /// Configured override layered over the table.
    Override,
    /// Global default for symbols nobody knows about.
    Default,
}

impl std::fmt::Display for ConstraintSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Static => write!(f, "static"),
            Self::Override => write!(f, "override"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Exchange-defined grid and size limits for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentConstraint {
    /// Normalized lookup key (e.g. `BTCUSDT`).
    pub symbol: String,
    pub tick_size: Decimal,
    pub qty_step: Decimal,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
    /// Cap applied to market orders only.
    pub max_market_qty: Decimal,
    pub min_notional: Decimal,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub source: ConstraintSource,
}

impl InstrumentConstraint {
    /// Snaps `price` onto the tick grid.
    ///
    /// # Errors
    /// Returns `QuantizeError::NegativePrice` for negative input.
    pub fn round_price(
        &self,
        price: Decimal,
        direction: RoundingDirection,
    ) -> Result<Decimal, QuantizeError> {
        if price < Decimal::ZERO {
            return Err(QuantizeError::NegativePrice { price });
        }
        Ok(quantizer::snap_to_step(price, self.tick_size, direction))
    }

    /// Snaps `qty` onto the quantity grid.
    ///
    /// With `enforce_min`, a result below `min_qty` is raised to exactly
    /// `min_qty`, and `min_qty` itself is returned unchanged.
    ///
    /// # Errors
    /// Returns `QuantizeError::NegativeQuantity` for negative input.
    pub fn round_qty(
        &self,
        qty: Decimal,
        direction: RoundingDirection,
        enforce_min: bool,
    ) -> Result<Decimal, QuantizeError> {
        if qty < Decimal::ZERO {
            return Err(QuantizeError::NegativeQuantity { qty });
        }
        // The minimum is a legal size even when it sits off the grid.
        if enforce_min && qty == self.min_qty {
            return Ok(self.min_qty);
        }
        let rounded = quantizer::snap_to_step(qty, self.qty_step, direction);

        if enforce_min && rounded < self.min_qty {
            warn!(
                symbol = %self.symbol,
                requested = %qty,
                rounded = %rounded,
                min_qty = %self.min_qty,
                "Quantity raised to instrument minimum"
            );
            return Ok(self.min_qty);
        }
        Ok(rounded)
    }

    /// Renders `qty` with exactly the decimal places of `qty_step`.
    #[must_use]
    pub fn format_qty(&self, qty: Decimal) -> String {
        quantizer::format_to_step(qty, self.qty_step)
    }

    /// Renders `price` with exactly the decimal places of `tick_size`.
    #[must_use]
    pub fn format_price(&self, price: Decimal) -> String {
        quantizer::format_to_step(price, self.tick_size)
    }

    #[must_use]
    pub fn qty_decimals(&self) -> u32 {
        quantizer::step_decimals(self.qty_step)
    }

    #[must_use]
    pub fn price_decimals(&self) -> u32 {
        quantizer::step_decimals(self.tick_size)
    }

    /// True when `qty` is an exact multiple of `qty_step`.
    #[must_use]
    pub fn is_on_qty_grid(&self, qty: Decimal) -> bool {
        quantizer::is_multiple_of(qty, self.qty_step)
    }

    #[must_use]
    pub fn is_on_price_grid(&self, price: Decimal) -> bool {
        quantizer::is_multiple_of(price, self.tick_size)
    }

    /// True when `price` sits inside the optional `[min_price, max_price]` band.
    #[must_use]
    pub fn price_in_band(&self, price: Decimal) -> bool {
        self.min_price.map_or(true, |min| price >= min)
            && self.max_price.map_or(true, |max| price <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn constraint(qty_step: Decimal, min_qty: Decimal) -> InstrumentConstraint {
        InstrumentConstraint {
            symbol: "TESTUSDT".to_string(),
            tick_size: dec!(0.01),
            qty_step,
            min_qty,
            max_qty: dec!(1000),
            max_market_qty: dec!(100),
            min_notional: dec!(5),
            min_price: Some(dec!(0.01)),
            max_price: Some(dec!(100000)),
            source: ConstraintSource::Static,
        }
    }

    #[test]
    fn test_round_qty_down_tenths() {
        let c = constraint(dec!(0.1), dec!(0.1));
        let qty = c.round_qty(dec!(3.256), RoundingDirection::Down, true).unwrap();
        assert_eq!(qty, dec!(3.2));
        assert_eq!(c.format_qty(qty), "3.2");
    }

    #[test]
    fn test_round_qty_clamps_to_min() {
        let c = constraint(dec!(1.0), dec!(1.0));
        let qty = c.round_qty(dec!(0.09), RoundingDirection::Down, true).unwrap();
        assert_eq!(qty, dec!(1.0));
        assert_eq!(c.format_qty(qty), "1");
    }

    #[test]
    fn test_off_grid_min_survives_second_rounding() {
        let c = constraint(dec!(0.1), dec!(0.25));
        let once = c.round_qty(dec!(0.2), RoundingDirection::Up, true).unwrap();
        assert_eq!(once, dec!(0.25));
        assert_eq!(c.round_qty(once, RoundingDirection::Up, true).unwrap(), dec!(0.25));
        assert_eq!(c.round_qty(dec!(0.26), RoundingDirection::Up, true).unwrap(), dec!(0.3));
        assert_eq!(c.round_qty(dec!(0.25), RoundingDirection::Up, false).unwrap(), dec!(0.3));
    }

    #[test]
    fn test_round_qty_without_min_enforcement() {
        let c = constraint(dec!(1.0), dec!(1.0));
        let qty = c.round_qty(dec!(0.09), RoundingDirection::Down, false).unwrap();
        assert_eq!(qty, Decimal::ZERO);
    }

    #[test]
    fn test_round_qty_up() {
        let c = constraint(dec!(0.001), dec!(0.001));
        let qty = c.round_qty(dec!(0.0101), RoundingDirection::Up, false).unwrap();
        assert_eq!(qty, dec!(0.011));
    }

    #[test]
    fn test_round_price_directions() {
        let c = constraint(dec!(0.1), dec!(0.1));
        assert_eq!(
            c.round_price(dec!(100.126), RoundingDirection::Down).unwrap(),
            dec!(100.12)
        );
        assert_eq!(
            c.round_price(dec!(100.121), RoundingDirection::Up).unwrap(),
            dec!(100.13)
        );
        assert_eq!(c.format_price(dec!(100.1)), "100.10");
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let c = constraint(dec!(0.1), dec!(0.1));
        assert!(matches!(
            c.round_price(dec!(-1), RoundingDirection::Down),
            Err(QuantizeError::NegativePrice { .. })
        ));
        assert!(matches!(
            c.round_qty(dec!(-0.5), RoundingDirection::Down, true),
            Err(QuantizeError::NegativeQuantity { .. })
        ));
    }

    #[test]
    fn test_price_band() {
        let c = constraint(dec!(0.1), dec!(0.1));
        assert!(c.price_in_band(dec!(50000)));
        assert!(!c.price_in_band(dec!(100000.01)));
        assert!(!c.price_in_band(dec!(0.001)));

        let open = InstrumentConstraint {
            min_price: None,
            max_price: None,
            ..c
        };
        assert!(open.price_in_band(dec!(1000000000)));
    }

    #[test]
    fn test_grid_membership() {
        let c = constraint(dec!(0.001), dec!(0.001));
        assert!(c.is_on_qty_grid(dec!(0.123)));
        assert!(!c.is_on_qty_grid(dec!(0.1234)));
        assert!(c.is_on_price_grid(dec!(50000.01)));
    }
}
