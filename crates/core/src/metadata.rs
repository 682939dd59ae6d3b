//! Wire types for instrument metadata as published by exchanges.
//!
//! The shape follows the instruments-info payload of unified-margin venues:
//! a price filter, a lot-size filter and, on some venues, a separate notional
//! filter. Every field is optional and may be encoded as a JSON string or a
//! number; conversion to [`Decimal`] goes through the decimal text so binary
//! float artifacts never reach the quantizer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("metadata provider unavailable: {0}")]
    Unavailable(String),

    #[error("no metadata for symbol {0}")]
    SymbolNotFound(String),

    #[error("malformed metadata: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A numeric field that venues encode either as text or as a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Parses the value into an exact decimal. Returns `None` for unparseable text
    /// and for non-finite floats.
    #[must_use]
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Integer(v) => Some(Decimal::from(*v)),
            Self::Float(v) if v.is_finite() => parse_decimal_text(&v.to_string()),
            Self::Float(_) => None,
            Self::Text(s) => parse_decimal_text(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

fn parse_decimal_text(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceFilter {
    pub tick_size: Option<MetadataValue>,
    pub min_price: Option<MetadataValue>,
    pub max_price: Option<MetadataValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LotSizeFilter {
    pub qty_step: Option<MetadataValue>,
    pub min_order_qty: Option<MetadataValue>,
    pub max_order_qty: Option<MetadataValue>,
    pub max_mkt_order_qty: Option<MetadataValue>,
    pub min_notional_value: Option<MetadataValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotionalFilter {
    pub min_notional: Option<MetadataValue>,
}

/// Raw filters for one instrument, exactly as the provider reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawInstrumentFilters {
    pub symbol: Option<String>,
    pub price_filter: Option<PriceFilter>,
    pub lot_size_filter: Option<LotSizeFilter>,
    pub notional_filter: Option<NotionalFilter>,
}

impl RawInstrumentFilters {
    #[must_use]
    pub fn tick_size(&self) -> Option<Decimal> {
        self.price_filter.as_ref()?.tick_size.as_ref()?.to_decimal()
    }

    #[must_use]
    pub fn min_price(&self) -> Option<Decimal> {
        self.price_filter.as_ref()?.min_price.as_ref()?.to_decimal()
    }

    #[must_use]
    pub fn max_price(&self) -> Option<Decimal> {
        self.price_filter.as_ref()?.max_price.as_ref()?.to_decimal()
    }

    #[must_use]
    pub fn qty_step(&self) -> Option<Decimal> {
        self.lot_size_filter.as_ref()?.qty_step.as_ref()?.to_decimal()
    }

    #[must_use]
    pub fn min_qty(&self) -> Option<Decimal> {
        self.lot_size_filter.as_ref()?.min_order_qty.as_ref()?.to_decimal()
    }

    #[must_use]
    pub fn max_qty(&self) -> Option<Decimal> {
        self.lot_size_filter.as_ref()?.max_order_qty.as_ref()?.to_decimal()
    }

    #[must_use]
    pub fn max_market_qty(&self) -> Option<Decimal> {
        self.lot_size_filter.as_ref()?.max_mkt_order_qty.as_ref()?.to_decimal()
    }

    /// Minimum notional, preferring the lot-size filter's value over a separate
    /// notional filter.
    #[must_use]
    pub fn min_notional(&self) -> Option<Decimal> {
        self.lot_size_filter
            .as_ref()
            .and_then(|f| f.min_notional_value.as_ref())
            .and_then(MetadataValue::to_decimal)
            .or_else(|| {
                self.notional_filter
                    .as_ref()?
                    .min_notional
                    .as_ref()?
                    .to_decimal()
            })
    }

    /// True when the payload carries no filter at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.price_filter.is_none() && self.lot_size_filter.is_none() && self.notional_filter.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parses_string_encoded_filters() {
        let json = r#"{
            "symbol": "BTCUSDT",
            "priceFilter": {"minPrice": "0.10", "maxPrice": "199999.80", "tickSize": "0.10"},
            "lotSizeFilter": {
                "maxOrderQty": "1190.000",
                "minOrderQty": "0.001",
                "qtyStep": "0.001",
                "maxMktOrderQty": "500.000",
                "minNotionalValue": "5"
            }
        }"#;
        let raw: RawInstrumentFilters = serde_json::from_str(json).unwrap();

        assert_eq!(raw.symbol.as_deref(), Some("BTCUSDT"));
        assert_eq!(raw.tick_size(), Some(dec!(0.10)));
        assert_eq!(raw.min_price(), Some(dec!(0.1)));
        assert_eq!(raw.max_price(), Some(dec!(199999.8)));
        assert_eq!(raw.qty_step(), Some(dec!(0.001)));
        assert_eq!(raw.min_qty(), Some(dec!(0.001)));
        assert_eq!(raw.max_qty(), Some(dec!(1190)));
        assert_eq!(raw.max_market_qty(), Some(dec!(500)));
        assert_eq!(raw.min_notional(), Some(dec!(5)));
    }

    #[test]
    fn test_numeric_fields_keep_decimal_text() {
        let json = r#"{"lotSizeFilter": {"qtyStep": 0.1, "minOrderQty": 1}}"#;
        let raw: RawInstrumentFilters = serde_json::from_str(json).unwrap();

        // 0.1 must not turn into 0.1000000000000000055511151231
        assert_eq!(raw.qty_step().unwrap().to_string(), "0.1");
        assert_eq!(raw.min_qty(), Some(dec!(1)));
        assert_eq!(raw.tick_size(), None);
    }

    #[test]
    fn test_separate_notional_filter() {
        let json = r#"{"notionalFilter": {"minNotional": "10"}}"#;
        let raw: RawInstrumentFilters = serde_json::from_str(json).unwrap();
        assert_eq!(raw.min_notional(), Some(dec!(10)));
    }

    #[test]
    fn test_unparseable_field_is_absent_not_fatal() {
        let json = r#"{"priceFilter": {"tickSize": "n/a"}, "lotSizeFilter": {"qtyStep": "1e-3"}}"#;
        let raw: RawInstrumentFilters = serde_json::from_str(json).unwrap();
        assert_eq!(raw.tick_size(), None);
        assert_eq!(raw.qty_step(), Some(dec!(0.001)));
    }

    #[test]
    fn test_empty_payload() {
        let raw: RawInstrumentFilters = serde_json::from_str("{}").unwrap();
        assert!(raw.is_empty());
    }
}
