//! Price feed loop: marks positions, fires triggers, emits exit instructions.

use std::sync::Arc;

use anyhow::Result;
use quantgate_core::{OrderType, PriceFeed};
use quantgate_instruments::{OrderRequest, OrderValidator, RoundingDirection, SubmissionOrder};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::ledger::PositionLedger;
use crate::types::{Position, PositionEvent, PositionStatus};

/// Counters reported when the feed loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub ticks: u64,
    pub rejected_ticks: u64,
    pub triggered: u64,
    pub orders_sent: u64,
    /// Triggered closes no valid order could be built for; each was sent as
    /// [`ExitInstruction::Manual`].
    pub orders_invalid: u64,
}

/// What the exchange side must do for one triggered close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ExitInstruction {
    /// Submit these orders; together they flatten the position.
    Submit {
        position: Position,
        orders: Vec<SubmissionOrder>,
    },
    /// The ledger closed the position but no valid exit order exists. The
    /// exchange position stays open until an operator flattens it.
    Manual {
        position: Position,
        errors: Vec<String>,
    },
}

impl ExitInstruction {
    #[must_use]
    pub const fn position(&self) -> &Position {
        match self {
            Self::Submit { position, .. } | Self::Manual { position, .. } => position,
        }
    }
}

/// Drains `feed` into `ledger` until the feed ends or the receiver of
/// `exit_tx` is dropped.
///
/// Every stop-loss or take-profit close becomes reduce-only market orders for
/// the full position size at the trigger level, split so no order exceeds the
/// instrument's market-order cap. When the orders cannot be made valid the
/// close is still delivered, as [`ExitInstruction::Manual`].
///
/// # Errors
/// Returns an error if the feed fails or a close order is malformed.
pub async fn run_price_feed<F: PriceFeed>(
    mut feed: F,
    ledger: Arc<PositionLedger>,
    validator: OrderValidator,
    exit_tx: mpsc::Sender<ExitInstruction>,
) -> Result<FeedSummary> {
    info!("Price feed started");
    let mut summary = FeedSummary::default();

    while let Some(tick) = feed.next_tick().await? {
        summary.ticks += 1;

        let events = match ledger.on_price_tick(&tick) {
            Ok(events) => events,
            Err(e) => {
                warn!(symbol = tick.symbol, error = %e, "Tick rejected");
                summary.rejected_ticks += 1;
                continue;
            }
        };

        for event in events {
            let PositionEvent::Closed { position } = event else {
                continue;
            };
            if !matches!(
                position.status,
                PositionStatus::ClosedSl | PositionStatus::ClosedTp
            ) {
                continue;
            }
            summary.triggered += 1;

            let instruction = exit_instruction(&validator, position).await?;
            let order_count = match &instruction {
                ExitInstruction::Submit { orders, .. } => orders.len() as u64,
                ExitInstruction::Manual { position, errors } => {
                    error!(
                        symbol = position.original_symbol,
                        side = %position.side,
                        size = %position.size,
                        status = %position.status,
                        errors = ?errors,
                        "No valid exit order, manual close required"
                    );
                    summary.orders_invalid += 1;
                    0
                }
            };

            if exit_tx.send(instruction).await.is_err() {
                info!(?summary, "Exit receiver dropped, stopping price feed");
                return Ok(summary);
            }
            summary.orders_sent += order_count;
        }
    }

    info!(?summary, "Price feed ended");
    Ok(summary)
}

async fn exit_instruction(
    validator: &OrderValidator,
    position: Position,
) -> Result<ExitInstruction> {
    let constraint = validator
        .quantizer()
        .store()
        .get(&position.original_symbol, false)
        .await;
    let cap = constraint.round_qty(constraint.max_market_qty, RoundingDirection::Down, false)?;

    let mut orders = Vec::new();
    let mut errors = Vec::new();
    for qty in split_qty(position.size, cap) {
        let result = validator.validate_order(&close_order(&position, qty)).await?;
        match result.submission() {
            Some(order) => orders.push(order),
            None => errors.extend(result.errors),
        }
    }

    if errors.is_empty() {
        Ok(ExitInstruction::Submit { position, orders })
    } else {
        Ok(ExitInstruction::Manual { position, errors })
    }
}

/// Splits `size` into chunks no larger than `cap`. A non-positive cap leaves
/// the size whole.
fn split_qty(size: Decimal, cap: Decimal) -> Vec<Decimal> {
    if cap <= Decimal::ZERO || size <= cap {
        return vec![size];
    }
    let mut chunks = Vec::new();
    let mut remaining = size;
    while remaining > cap {
        chunks.push(cap);
        remaining -= cap;
    }
    if !remaining.is_zero() {
        chunks.push(remaining);
    }
    chunks
}

fn close_order(position: &Position, qty: Decimal) -> OrderRequest {
    OrderRequest::new(
        position.original_symbol.clone(),
        position.side.closing_order_side(),
        OrderType::Market,
        qty,
        position.exit_price.unwrap_or(position.current_price),
    )
    .with_reduce_only()
}
