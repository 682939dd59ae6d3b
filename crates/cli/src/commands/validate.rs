//! Validate CLI command.

use anyhow::Result;
use clap::{Args, ValueEnum};
use quantgate_core::{OrderSide, OrderType};
use quantgate_instruments::{OrderRequest, OrderValidationResult};
use rust_decimal::Decimal;

use super::{print_json, Context};

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for OrderSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buy => Self::Buy,
            SideArg::Sell => Self::Sell,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OrderTypeArg {
    Market,
    Limit,
}

impl From<OrderTypeArg> for OrderType {
    fn from(order_type: OrderTypeArg) -> Self {
        match order_type {
            OrderTypeArg::Market => Self::Market,
            OrderTypeArg::Limit => Self::Limit,
        }
    }
}

/// Arguments for the validate command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    pub symbol: String,

    #[arg(long)]
    pub qty: Decimal,

    #[arg(long)]
    pub price: Decimal,

    /// Order side; with a side the output includes the submission order
    #[arg(long, value_enum)]
    pub side: Option<SideArg>,

    #[arg(long = "type", value_enum, default_value = "limit")]
    pub order_type: OrderTypeArg,
}

/// Prints the validation result and, for valid sided orders, the order to submit.
///
/// # Errors
/// Returns an error for malformed input or if the order is rejected.
pub async fn run_validate(ctx: &Context, args: ValidateArgs) -> Result<()> {
    let result = validate(ctx, &args).await?;
    print_json(&result)?;

    if let Some(order) = result.submission() {
        print_json(&order)?;
    }
    if !result.valid {
        anyhow::bail!("order rejected: {}", result.errors.join("; "));
    }
    Ok(())
}

async fn validate(ctx: &Context, args: &ValidateArgs) -> Result<OrderValidationResult> {
    let validator = ctx.validator();
    let result = match args.side {
        Some(side) => {
            let order = OrderRequest::new(
                args.symbol.clone(),
                side.into(),
                args.order_type.into(),
                args.qty,
                args.price,
            );
            validator.validate_order(&order).await?
        }
        None => validator.validate(&args.symbol, args.qty, args.price).await?,
    };
    Ok(result)
}
