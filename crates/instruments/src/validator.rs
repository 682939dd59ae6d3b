//! Order validation against instrument constraints.
//!
//! Validation never rejects by returning `Err` for a rule violation: a
//! quantity below the minimum or a notional too small to trade is a normal
//! outcome reported in [`OrderValidationResult::violations`]. Only malformed
//! input (negative or non-finite numbers) is an error. Reduce-only orders are
//! exempt from the minimum notional so a small residual can always be closed.

use std::sync::Arc;

use quantgate_core::{OrderSide, OrderType, ValidatorConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::quantizer::{decimal_from_f64, QuantizeError, Quantizer, RoundingDirection};
use crate::store::ConstraintStore;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error(transparent)]
    Quantize(#[from] QuantizeError),
}

/// A single rule an order breaks after quantization.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("quantity {qty} below minimum {min_qty}")]
    BelowMinQty { qty: Decimal, min_qty: Decimal },

    #[error("notional {notional} below minimum notional {min_notional}")]
    BelowMinNotional {
        notional: Decimal,
        min_notional: Decimal,
    },

    #[error("notional of {qty} at {price} exceeds the decimal range")]
    NotionalOverflow { qty: Decimal, price: Decimal },

    #[error("quantity {qty} above maximum {max_qty}")]
    AboveMaxQty { qty: Decimal, max_qty: Decimal },

    #[error("market order quantity {qty} above market maximum {max_market_qty}")]
    AboveMaxMarketQty {
        qty: Decimal,
        max_market_qty: Decimal,
    },

    #[error("price {price} outside band [{}, {}]", bound(.min_price), bound(.max_price))]
    PriceOutOfBand {
        price: Decimal,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
    },

    #[error("quantity rounds to zero")]
    ZeroQuantity,
}

fn bound(value: &Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// An order as produced upstream, before quantization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub reduce_only: bool,
}

impl OrderRequest {
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        order_type: OrderType,
        qty: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            qty,
            price,
            reduce_only: false,
        }
    }

    #[must_use]
    pub fn with_reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

/// A validated order ready for the exchange adapter. The text fields carry
/// exactly the decimal places the venue accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: Decimal,
    pub price: Decimal,
    pub qty_text: String,
    pub price_text: String,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderValidationResult {
    /// Symbol exactly as the caller passed it.
    pub symbol: String,
    pub side: Option<OrderSide>,
    pub order_type: Option<OrderType>,
    pub reduce_only: bool,
    pub valid: bool,
    pub corrected_qty: Decimal,
    pub corrected_price: Decimal,
    pub notional_value: Decimal,
    pub formatted_qty: String,
    pub formatted_price: String,
    pub violations: Vec<Violation>,
    /// Rendered `violations`, same order.
    pub errors: Vec<String>,
}

impl OrderValidationResult {
    /// The order to submit. `None` when the result is invalid or carries no side.
    #[must_use]
    pub fn submission(&self) -> Option<SubmissionOrder> {
        if !self.valid {
            return None;
        }
        Some(SubmissionOrder {
            symbol: self.symbol.clone(),
            side: self.side?,
            order_type: self.order_type.unwrap_or(OrderType::Limit),
            qty: self.corrected_qty,
            price: self.corrected_price,
            qty_text: self.formatted_qty.clone(),
            price_text: self.formatted_price.clone(),
            reduce_only: self.reduce_only,
        })
    }
}

#[derive(Clone)]
pub struct OrderValidator {
    quantizer: Quantizer,
    config: ValidatorConfig,
}

impl OrderValidator {
    #[must_use]
    pub fn new(store: Arc<ConstraintStore>) -> Self {
        Self {
            quantizer: Quantizer::new(store),
            config: ValidatorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    #[must_use]
    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    /// Quantizes and checks a bare quantity/price pair.
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty symbol or negative input.
    pub async fn validate(
        &self,
        symbol: &str,
        qty: Decimal,
        price: Decimal,
    ) -> Result<OrderValidationResult, ValidationError> {
        self.check(symbol, None, None, false, qty, price).await
    }

    /// Like [`validate`](Self::validate) for values arriving as floats from an
    /// untyped boundary.
    ///
    /// # Errors
    /// Also returns `ValidationError::Quantize` for NaN or infinite input.
    pub async fn validate_f64(
        &self,
        symbol: &str,
        qty: f64,
        price: f64,
    ) -> Result<OrderValidationResult, ValidationError> {
        let qty = decimal_from_f64("qty", qty)?;
        let price = decimal_from_f64("price", price)?;
        self.validate(symbol, qty, price).await
    }

    /// Quantizes and checks a full order, including market-size limits.
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty symbol or negative input.
    pub async fn validate_order(
        &self,
        order: &OrderRequest,
    ) -> Result<OrderValidationResult, ValidationError> {
        self.check(
            &order.symbol,
            Some(order.side),
            Some(order.order_type),
            order.reduce_only,
            order.qty,
            order.price,
        )
        .await
    }

    async fn check(
        &self,
        symbol: &str,
        side: Option<OrderSide>,
        order_type: Option<OrderType>,
        reduce_only: bool,
        qty: Decimal,
        price: Decimal,
    ) -> Result<OrderValidationResult, ValidationError> {
        if symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let constraint = self.quantizer.store().get(symbol, false).await;

        let corrected_price = constraint.round_price(
            price,
            RoundingDirection::from_round_up(self.config.round_up_price),
        )?;
        let corrected_qty = constraint.round_qty(
            qty,
            RoundingDirection::from_round_up(self.config.round_up_qty),
            self.config.enforce_min,
        )?;
        let notional = corrected_qty.checked_mul(corrected_price);
        let notional_value = notional.unwrap_or(Decimal::MAX);

        let mut violations = Vec::new();
        if corrected_qty < constraint.min_qty {
            violations.push(Violation::BelowMinQty {
                qty: corrected_qty,
                min_qty: constraint.min_qty,
            });
        }
        // Venues accept reduce-only exits below the notional floor.
        if !reduce_only && notional_value < constraint.min_notional {
            violations.push(Violation::BelowMinNotional {
                notional: notional_value,
                min_notional: constraint.min_notional,
            });
        }
        if notional.is_none() {
            violations.push(Violation::NotionalOverflow {
                qty: corrected_qty,
                price: corrected_price,
            });
        }
        if corrected_qty > constraint.max_qty {
            violations.push(Violation::AboveMaxQty {
                qty: corrected_qty,
                max_qty: constraint.max_qty,
            });
        }
        if order_type == Some(OrderType::Market) && corrected_qty > constraint.max_market_qty {
            violations.push(Violation::AboveMaxMarketQty {
                qty: corrected_qty,
                max_market_qty: constraint.max_market_qty,
            });
        }
        if !constraint.price_in_band(corrected_price) {
            violations.push(Violation::PriceOutOfBand {
                price: corrected_price,
                min_price: constraint.min_price,
                max_price: constraint.max_price,
            });
        }
        if corrected_qty.is_zero() {
            violations.push(Violation::ZeroQuantity);
        }

        let valid = violations.is_empty();
        debug!(
            symbol,
            qty = %corrected_qty,
            price = %corrected_price,
            notional = %notional_value,
            valid,
            violations = violations.len(),
            "Order validated"
        );

        Ok(OrderValidationResult {
            symbol: symbol.to_string(),
            side,
            order_type,
            reduce_only,
            valid,
            corrected_qty,
            corrected_price,
            notional_value,
            formatted_qty: constraint.format_qty(corrected_qty),
            formatted_price: constraint.format_price(corrected_price),
            errors: violations.iter().map(ToString::to_string).collect(),
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OfflineMetadataProvider;
    use crate::static_table::StaticConstraintTable;
    use crate::store::StoreConfig;
    use rust_decimal_macros::dec;

    fn validator() -> OrderValidator {
        let store = ConstraintStore::new(
            Arc::new(OfflineMetadataProvider),
            StaticConstraintTable::builtin(),
            StoreConfig::default(),
        );
        OrderValidator::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_valid_order_is_corrected() {
        let result = validator()
            .validate("BTCUSDT.P", dec!(0.01234), dec!(50000.17))
            .await
            .unwrap();

        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(result.symbol, "BTCUSDT.P");
        assert_eq!(result.corrected_qty, dec!(0.012));
        assert_eq!(result.corrected_price, dec!(50000.1));
        assert_eq!(result.formatted_qty, "0.012");
        assert_eq!(result.formatted_price, "50000.1");
        assert_eq!(result.notional_value, dec!(600.0012));
    }

    #[tokio::test]
    async fn test_min_notional_violation() {
        let result = validator()
            .validate("XRPUSDT", dec!(2), dec!(0.5))
            .await
            .unwrap();

        assert!(!result.valid);
        assert_eq!(
            result.violations,
            vec![Violation::BelowMinNotional {
                notional: dec!(1.0),
                min_notional: dec!(5),
            }]
        );
        assert!(result.errors[0].contains("notional"));
        assert!(result.submission().is_none());
    }

    #[tokio::test]
    async fn test_below_min_without_enforcement() {
        let validator = validator().with_config(ValidatorConfig {
            enforce_min: false,
            ..ValidatorConfig::default()
        });
        let result = validator.validate("ETHUSDT", dec!(0.004), dec!(3000)).await.unwrap();

        assert!(!result.valid);
        assert!(matches!(result.violations[0], Violation::BelowMinQty { .. }));
        assert!(result.violations.contains(&Violation::ZeroQuantity));
    }

    #[tokio::test]
    async fn test_violations_accumulate_in_order() {
        let validator = validator();
        let order = OrderRequest::new("BTCUSDT", OrderSide::Buy, OrderType::Market, dec!(5000), dec!(100));
        let result = validator.validate_order(&order).await.unwrap();

        assert_eq!(result.violations.len(), 2);
        assert!(matches!(result.violations[0], Violation::AboveMaxQty { .. }));
        assert!(matches!(result.violations[1], Violation::AboveMaxMarketQty { .. }));
    }

    #[tokio::test]
    async fn test_market_cap_only_applies_to_market_orders() {
        let validator = validator();
        let limit = OrderRequest::new("BTCUSDT", OrderSide::Sell, OrderType::Limit, dec!(200), dec!(50000));
        let result = validator.validate_order(&limit).await.unwrap();
        assert!(result.valid);

        let submission = result.submission().unwrap();
        assert_eq!(submission.side, OrderSide::Sell);
        assert_eq!(submission.qty_text, "200.000");

        let market = OrderRequest { order_type: OrderType::Market, ..limit };
        assert!(!validator.validate_order(&market).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_bare_validation_has_no_submission() {
        let result = validator().validate("ETHUSDT", dec!(1), dec!(3000)).await.unwrap();
        assert!(result.valid);
        assert!(result.submission().is_none());
    }

    #[tokio::test]
    async fn test_malformed_input_is_error() {
        let validator = validator();
        assert!(matches!(
            validator.validate("BTCUSDT", dec!(-1), dec!(50000)).await,
            Err(ValidationError::Quantize(QuantizeError::NegativeQuantity { .. }))
        ));
        assert!(matches!(
            validator.validate("  ", dec!(1), dec!(50000)).await,
            Err(ValidationError::EmptySymbol)
        ));
        assert!(matches!(
            validator.validate_f64("BTCUSDT", f64::NAN, 50000.0).await,
            Err(ValidationError::Quantize(QuantizeError::NonFinite { .. }))
        ));
    }

    #[tokio::test]
    async fn test_reduce_only_exempt_from_min_notional() {
        let validator = validator();
        let exit = OrderRequest::new("BTCUSDT", OrderSide::Sell, OrderType::Market, dec!(0.001), dec!(4000));

        let plain = validator.validate_order(&exit).await.unwrap();
        assert!(matches!(plain.violations[..], [Violation::BelowMinNotional { .. }]));

        let reduce = validator.validate_order(&exit.with_reduce_only()).await.unwrap();
        assert!(reduce.valid, "{:?}", reduce.errors);
        assert!(reduce.submission().unwrap().reduce_only);
    }

    #[tokio::test]
    async fn test_notional_overflow_is_a_violation() {
        let qty = Decimal::from_i128_with_scale(10_i128.pow(20), 0);
        let price = Decimal::from(10_000_000_000_u64);
        let result = validator().validate("BTCUSDT", qty, price).await.unwrap();

        assert!(!result.valid);
        assert_eq!(result.notional_value, Decimal::MAX);
        assert!(result.violations.contains(&Violation::NotionalOverflow { qty, price }));
        assert!(matches!(result.violations[..], [Violation::NotionalOverflow { .. }, Violation::AboveMaxQty { .. }]));
    }

    #[test]
    fn test_price_band_message() {
        let violation = Violation::PriceOutOfBand {
            price: dec!(0.05),
            min_price: Some(dec!(0.1)),
            max_price: None,
        };
        assert_eq!(violation.to_string(), "price 0.05 outside band [0.1, -]");
    }
}
