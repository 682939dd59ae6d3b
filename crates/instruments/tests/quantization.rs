//! End-to-end quantization and validation through a shared store.

use std::sync::Arc;

use quantgate_core::{OrderSide, OrderType, ValidatorConfig};
use quantgate_instruments::{
    ConstraintSource, ConstraintStore, InstrumentConstraint, OfflineMetadataProvider, OrderRequest,
    OrderValidator, Quantizer, RoundingDirection, StaticConstraintTable, StoreConfig, Violation,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn entry(symbol: &str, qty_step: Decimal, min_qty: Decimal) -> InstrumentConstraint {
    InstrumentConstraint {
        symbol: symbol.to_string(),
        tick_size: dec!(0.01),
        qty_step,
        min_qty,
        max_qty: dec!(100000),
        max_market_qty: dec!(10000),
        min_notional: dec!(5),
        min_price: None,
        max_price: None,
        source: ConstraintSource::Static,
    }
}

fn offline_store() -> Arc<ConstraintStore> {
    let table = StaticConstraintTable::builtin()
        .with_entry(entry("TENTHUSDT", dec!(0.1), dec!(0.1)))
        .with_entry(entry("WHOLEUSDT", dec!(1.0), dec!(1.0)));
    Arc::new(ConstraintStore::new(
        Arc::new(OfflineMetadataProvider),
        table,
        StoreConfig::default(),
    ))
}

#[tokio::test]
async fn rounds_down_to_tenths() {
    let quantizer = Quantizer::new(offline_store());

    let qty = quantizer.round_qty("TENTHUSDT", dec!(3.256), false, true).await.unwrap();
    assert_eq!(qty, dec!(3.2));
    assert_eq!(quantizer.format_qty("TENTHUSDT", qty).await, "3.2");
}

#[tokio::test]
async fn undersized_quantity_clamped_to_minimum() {
    let quantizer = Quantizer::new(offline_store());

    let qty = quantizer.round_qty("WHOLEUSDT", dec!(0.09), false, true).await.unwrap();
    assert_eq!(qty, dec!(1.0));
    assert_eq!(quantizer.format_qty("WHOLEUSDT", qty).await, "1");

    let unclamped = quantizer.round_qty("WHOLEUSDT", dec!(0.09), false, false).await.unwrap();
    assert_eq!(unclamped, Decimal::ZERO);
}

#[tokio::test]
async fn quantize_keeps_originals() {
    let quantizer = Quantizer::new(offline_store());

    let result = quantizer
        .quantize("BTCUSDT-PERP", dec!(0.0125), dec!(50000.55), RoundingDirection::Up, true)
        .await
        .unwrap();

    assert_eq!(result.symbol, "BTCUSDT-PERP");
    assert_eq!(result.qty.original, dec!(0.0125));
    assert_eq!(result.qty.rounded, dec!(0.013));
    assert_eq!(result.price.original, dec!(50000.55));
    assert_eq!(result.price.rounded, dec!(50000.6));
    assert_eq!(quantizer.format_price("BTCUSDT", result.price.rounded).await, "50000.6");
}

#[tokio::test]
async fn tiny_order_rejected_for_notional() {
    // 0.00001 is already on this grid and at the minimum
    let table = StaticConstraintTable::builtin()
        .with_entry(entry("BTCUSDT", dec!(0.00001), dec!(0.00001)));
    let store = Arc::new(ConstraintStore::new(
        Arc::new(OfflineMetadataProvider),
        table,
        StoreConfig::default(),
    ));
    let validator = OrderValidator::new(store);

    let result = validator.validate("BTCUSDT", dec!(0.00001), dec!(50000)).await.unwrap();

    assert!(!result.valid);
    assert_eq!(result.notional_value, dec!(0.5));
    assert!(matches!(result.violations[..], [Violation::BelowMinNotional { .. }]));
    assert!(result.errors.iter().any(|e| e.contains("notional")));
}

#[tokio::test]
async fn round_up_configuration_is_honored() {
    let validator = OrderValidator::new(offline_store()).with_config(ValidatorConfig {
        round_up_qty: true,
        round_up_price: true,
        ..ValidatorConfig::default()
    });

    let order = OrderRequest::new("ETHUSDT", OrderSide::Buy, OrderType::Limit, dec!(1.001), dec!(3000.001));
    let result = validator.validate_order(&order).await.unwrap();

    assert_eq!(result.corrected_qty, dec!(1.01));
    assert_eq!(result.corrected_price, dec!(3000.01));
    let submission = result.submission().unwrap();
    assert_eq!(submission.qty_text, "1.01");
    assert_eq!(submission.price_text, "3000.01");
}

#[tokio::test]
async fn unknown_symbol_uses_global_default() {
    let validator = OrderValidator::new(offline_store());
    let result = validator.validate("NEWCOIN/USDT:USDT", dec!(12.3456), dec!(1.5)).await.unwrap();

    assert_eq!(result.symbol, "NEWCOIN/USDT:USDT");
    assert_eq!(result.formatted_qty, "12.345");
    assert!(result.valid);
}
