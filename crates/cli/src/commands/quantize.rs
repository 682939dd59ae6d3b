//! Quantize CLI command.

use anyhow::Result;
use clap::Args;
use quantgate_instruments::{QuantizationResult, Quantizer, RoundingDirection};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{print_json, Context};

/// Arguments for the quantize command.
#[derive(Args, Debug, Clone)]
pub struct QuantizeArgs {
    pub symbol: String,

    #[arg(long)]
    pub qty: Decimal,

    #[arg(long)]
    pub price: Decimal,

    /// Round up instead of down
    #[arg(long)]
    pub up: bool,

    /// Return the rounded quantity even when it falls below the instrument minimum
    #[arg(long)]
    pub no_min: bool,
}

#[derive(Debug, Serialize)]
struct QuantizeOutput {
    #[serde(flatten)]
    result: QuantizationResult,
    qty_text: String,
    price_text: String,
}

/// Prints the rounded price and quantity with their wire text.
///
/// # Errors
/// Returns an error for negative input.
pub async fn run_quantize(ctx: &Context, args: QuantizeArgs) -> Result<()> {
    let output = quantize(ctx, &args).await?;
    print_json(&output)
}

async fn quantize(ctx: &Context, args: &QuantizeArgs) -> Result<QuantizeOutput> {
    let quantizer = Quantizer::new(ctx.store.clone());
    let result = quantizer
        .quantize(
            &args.symbol,
            args.qty,
            args.price,
            RoundingDirection::from_round_up(args.up),
            !args.no_min,
        )
        .await?;

    Ok(QuantizeOutput {
        qty_text: quantizer.format_qty(&args.symbol, result.qty.rounded).await,
        price_text: quantizer.format_price(&args.symbol, result.price.rounded).await,
        result,
    })
}
