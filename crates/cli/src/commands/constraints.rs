//! Constraints CLI command.

use anyhow::Result;
use clap::Args;
use quantgate_instruments::InstrumentConstraint;

use super::{print_json, Context};

/// Arguments for the constraints command.
#[derive(Args, Debug, Clone)]
pub struct ConstraintsArgs {
    /// Symbols in any venue spelling (e.g. "BTCUSDT.P", "ETH/USDT:USDT")
    #[arg(required = true)]
    pub symbols: Vec<String>,

    /// Bypass the cache and fetch again
    #[arg(long)]
    pub refresh: bool,
}

/// Prints the resolved constraint for each symbol as JSON.
///
/// # Errors
/// Returns an error if output serialization fails.
pub async fn run_constraints(ctx: &Context, args: ConstraintsArgs) -> Result<()> {
    let constraints = resolve(ctx, &args).await;
    print_json(&constraints)
}

async fn resolve(ctx: &Context, args: &ConstraintsArgs) -> Vec<InstrumentConstraint> {
    let mut constraints = Vec::with_capacity(args.symbols.len());
    for symbol in &args.symbols {
        constraints.push(ctx.store.get(symbol, args.refresh).await);
    }
    constraints
}
