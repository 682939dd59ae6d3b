//! Stop-loss and take-profit rules, and conservative placement of both levels.

use quantgate_core::PositionSide;
use quantgate_instruments::{InstrumentConstraint, QuantizeError, RoundingDirection};
use rust_decimal::Decimal;

use crate::types::{Position, PositionStatus};

/// A protective level the price crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub status: PositionStatus,
    /// The level itself, not the tick that crossed it.
    pub exit_price: Decimal,
}

/// Check stop-loss then take-profit against `price`. When one tick crosses
/// both levels the stop-loss wins.
#[must_use]
pub fn check_triggers(pos: &Position, price: Decimal) -> Option<Trigger> {
    if let Some(trigger) = check_stop_loss(pos, price) {
        return Some(trigger);
    }
    check_take_profit(pos, price)
}

fn check_stop_loss(pos: &Position, price: Decimal) -> Option<Trigger> {
    let stop = pos.stop_loss?;
    let crossed = match pos.side {
        PositionSide::Long => price <= stop,
        PositionSide::Short => price >= stop,
    };
    if crossed {
        tracing::warn!(
            symbol = pos.symbol,
            side = %pos.side,
            price = %price,
            stop_loss = %stop,
            "Stop-loss triggered"
        );
        return Some(Trigger {
            status: PositionStatus::ClosedSl,
            exit_price: stop,
        });
    }
    None
}

fn check_take_profit(pos: &Position, price: Decimal) -> Option<Trigger> {
    let target = pos.take_profit?;
    let crossed = match pos.side {
        PositionSide::Long => price >= target,
        PositionSide::Short => price <= target,
    };
    if crossed {
        tracing::info!(
            symbol = pos.symbol,
            side = %pos.side,
            price = %price,
            take_profit = %target,
            "Take-profit triggered"
        );
        return Some(Trigger {
            status: PositionStatus::ClosedTp,
            exit_price: target,
        });
    }
    None
}

/// Snaps protective levels onto the tick grid toward the entry, so a level
/// never sits further from the entry than requested.
///
/// # Errors
/// Returns `QuantizeError::NegativePrice` for a negative level.
pub fn quantize_protection(
    constraint: &InstrumentConstraint,
    side: PositionSide,
    stop_loss: Option<Decimal>,
    take_profit: Option<Decimal>,
) -> Result<(Option<Decimal>, Option<Decimal>), QuantizeError> {
    let (sl_dir, tp_dir) = match side {
        PositionSide::Long => (RoundingDirection::Up, RoundingDirection::Down),
        PositionSide::Short => (RoundingDirection::Down, RoundingDirection::Up),
    };
    let stop_loss = stop_loss
        .map(|sl| constraint.round_price(sl, sl_dir))
        .transpose()?;
    let take_profit = take_profit
        .map(|tp| constraint.round_price(tp, tp_dir))
        .transpose()?;
    Ok((stop_loss, take_profit))
}
