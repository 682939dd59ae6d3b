//! Exact base-10 quantization onto exchange grids.
//!
//! All arithmetic is done in [`Decimal`]. The number of decimal places a grid
//! implies comes from the step's own decimal text (`0.10` and `0.1` both imply
//! one place), never from inspecting a binary float.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::ConstraintStore;

/// Malformed numeric input. These are caller bugs, not constraint violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuantizeError {
    #[error("price must not be negative: {price}")]
    NegativePrice { price: Decimal },

    #[error("quantity must not be negative: {qty}")]
    NegativeQuantity { qty: Decimal },

    #[error("{field} is not a finite number: {value}")]
    NonFinite { field: &'static str, value: String },

    #[error("{field} is outside the decimal range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingDirection {
    Down,
    Up,
}

impl RoundingDirection {
    #[must_use]
    pub const fn from_round_up(round_up: bool) -> Self {
        if round_up {
            Self::Up
        } else {
            Self::Down
        }
    }
}

/// Before/after pair for one quantized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rounded {
    pub original: Decimal,
    pub rounded: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizationResult {
    pub symbol: String,
    pub price: Rounded,
    pub qty: Rounded,
    pub direction: RoundingDirection,
}

/// Decimal places implied by `step`. Integral steps imply zero.
#[must_use]
pub fn step_decimals(step: Decimal) -> u32 {
    if step <= Decimal::ZERO {
        return 0;
    }
    step.normalize().scale()
}

/// Snaps `value` to an integer multiple of `step` in `direction`.
///
/// A non-positive step means "no grid" and returns `value` unchanged.
#[must_use]
pub fn snap_to_step(value: Decimal, step: Decimal, direction: RoundingDirection) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    let Some(units) = value.checked_div(step) else {
        return value;
    };
    let units = match direction {
        RoundingDirection::Down => units.floor(),
        RoundingDirection::Up => units.ceil(),
    };
    let Some(snapped) = units.checked_mul(step) else {
        return value;
    };

    let mut snapped = snapped.round_dp(step_decimals(step));
    snapped.rescale(step_decimals(step));
    snapped
}

/// True when `value` is an exact multiple of `step`. Every value is on a
/// non-positive step's grid.
#[must_use]
pub fn is_multiple_of(value: Decimal, step: Decimal) -> bool {
    if step <= Decimal::ZERO {
        return true;
    }
    value
        .checked_rem(step)
        .is_some_and(|remainder| remainder.is_zero())
}

/// Renders `value` with exactly the decimal places implied by `step`.
///
/// Excess precision is truncated toward zero so the text never exceeds the
/// value it was derived from.
#[must_use]
pub fn format_to_step(value: Decimal, step: Decimal) -> String {
    if step <= Decimal::ZERO {
        return value.normalize().to_string();
    }
    let dp = step_decimals(step);
    let mut text = value.round_dp_with_strategy(dp, RoundingStrategy::ToZero);
    text.rescale(dp);
    text.to_string()
}

/// Converts a float from an untyped boundary into a decimal via its shortest
/// decimal text.
///
/// # Errors
/// Returns `QuantizeError::NonFinite` for NaN or infinities and
/// `QuantizeError::OutOfRange` for finite values `Decimal` cannot hold.
pub fn decimal_from_f64(field: &'static str, value: f64) -> Result<Decimal, QuantizeError> {
    if !value.is_finite() {
        return Err(QuantizeError::NonFinite {
            field,
            value: value.to_string(),
        });
    }
    let text = value.to_string();
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| QuantizeError::OutOfRange {
            field,
            value: format!("{value:e}"),
        })
}

/// Symbol-level quantization backed by a [`ConstraintStore`].
#[derive(Clone)]
pub struct Quantizer {
    store: Arc<ConstraintStore>,
}

impl Quantizer {
    #[must_use]
    pub fn new(store: Arc<ConstraintStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ConstraintStore> {
        &self.store
    }

    /// # Errors
    /// Returns `QuantizeError::NegativePrice` for negative input.
    pub async fn round_price(
        &self,
        symbol: &str,
        price: Decimal,
        round_up: bool,
    ) -> Result<Decimal, QuantizeError> {
        let constraint = self.store.get(symbol, false).await;
        constraint.round_price(price, RoundingDirection::from_round_up(round_up))
    }

    /// # Errors
    /// Returns `QuantizeError::NegativeQuantity` for negative input.
    pub async fn round_qty(
        &self,
        symbol: &str,
        qty: Decimal,
        round_up: bool,
        enforce_min: bool,
    ) -> Result<Decimal, QuantizeError> {
        let constraint = self.store.get(symbol, false).await;
        constraint.round_qty(qty, RoundingDirection::from_round_up(round_up), enforce_min)
    }

    pub async fn format_qty(&self, symbol: &str, qty: Decimal) -> String {
        self.store.get(symbol, false).await.format_qty(qty)
    }

    pub async fn format_price(&self, symbol: &str, price: Decimal) -> String {
        self.store.get(symbol, false).await.format_price(price)
    }

    /// Quantizes a price/quantity pair in one direction, keeping the originals.
    ///
    /// # Errors
    /// Returns an error for negative price or quantity.
    pub async fn quantize(
        &self,
        symbol: &str,
        qty: Decimal,
        price: Decimal,
        direction: RoundingDirection,
        enforce_min: bool,
    ) -> Result<QuantizationResult, QuantizeError> {
        let constraint = self.store.get(symbol, false).await;
        let rounded_price = constraint.round_price(price, direction)?;
        let rounded_qty = constraint.round_qty(qty, direction, enforce_min)?;

        Ok(QuantizationResult {
            symbol: symbol.to_string(),
            price: Rounded {
                original: price,
                rounded: rounded_price,
            },
            qty: Rounded {
                original: qty,
                rounded: rounded_qty,
            },
            direction,
        })
    }
}
