//! Types for position tracking.

use chrono::{DateTime, Utc};
use quantgate_core::PositionSide;
use quantgate_instruments::QuantizeError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    ClosedSl,
    ClosedTp,
    ClosedManual,
}

impl PositionStatus {
    #[must_use]
    pub const fn is_closed(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::ClosedSl => write!(f, "closed_sl"),
            Self::ClosedTp => write!(f, "closed_tp"),
            Self::ClosedManual => write!(f, "closed_manual"),
        }
    }
}

/// A position on one side of one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Normalized instrument key.
    pub symbol: String,
    /// Symbol as the opening fill spelled it; exit orders use this spelling.
    pub original_symbol: String,
    pub side: PositionSide,
    /// Always positive and on the instrument's quantity grid.
    pub size: Decimal,
    /// Size-weighted average fill price.
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Unrealized PnL at `current_price`.
    pub pnl: Decimal,
    pub pnl_percentage: Decimal,
    /// PnL locked in by partial reductions and the final close.
    pub realized_pnl: Decimal,
    pub status: PositionStatus,
    pub exit_price: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    #[must_use]
    pub fn open(
        symbol: impl Into<String>,
        side: PositionSide,
        size: Decimal,
        entry_price: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            original_symbol: symbol.clone(),
            symbol,
            side,
            size,
            entry_price,
            current_price: entry_price,
            stop_loss: None,
            take_profit: None,
            pnl: Decimal::ZERO,
            pnl_percentage: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            exit_price: None,
            opened_at: at,
            updated_at: at,
            closed_at: None,
        }
    }

    #[must_use]
    pub fn with_original_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.original_symbol = symbol.into();
        self
    }

    /// PnL of `qty` units marked at `price`. Positive when the move favors
    /// this side.
    ///
    /// # Errors
    /// Returns `LedgerError::Overflow` when the result exceeds `Decimal`.
    pub fn pnl_at(&self, price: Decimal, qty: Decimal) -> Result<Decimal, LedgerError> {
        let diff = match self.side {
            PositionSide::Long => price.checked_sub(self.entry_price),
            PositionSide::Short => self.entry_price.checked_sub(price),
        };
        diff.and_then(|d| d.checked_mul(qty))
            .ok_or_else(|| self.overflow())
    }

    /// Cost basis of the open size.
    ///
    /// # Errors
    /// Returns `LedgerError::Overflow` when the result exceeds `Decimal`.
    pub fn entry_notional(&self) -> Result<Decimal, LedgerError> {
        self.entry_price
            .checked_mul(self.size)
            .ok_or_else(|| self.overflow())
    }

    /// Re-marks the position at `price`. On error the position is unchanged.
    ///
    /// # Errors
    /// Returns `LedgerError::Overflow` when PnL exceeds `Decimal`.
    pub fn mark(&mut self, price: Decimal, at: DateTime<Utc>) -> Result<(), LedgerError> {
        let pnl = self.pnl_at(price, self.size)?;
        let basis = self.entry_notional()?;
        let pnl_percentage = if basis.is_zero() {
            Decimal::ZERO
        } else {
            pnl.checked_div(basis)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .ok_or_else(|| self.overflow())?
        };

        self.current_price = price;
        self.pnl = pnl;
        self.pnl_percentage = pnl_percentage;
        self.updated_at = at;
        Ok(())
    }

    /// Moves the position into a terminal state, realizing the remaining PnL
    /// at `exit_price`. On error the position is unchanged.
    ///
    /// # Errors
    /// Returns `LedgerError::Overflow` when PnL exceeds `Decimal`.
    pub fn close(
        &mut self,
        status: PositionStatus,
        exit_price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let pnl = self.pnl_at(exit_price, self.size)?;
        let realized_pnl = self
            .realized_pnl
            .checked_add(pnl)
            .ok_or_else(|| self.overflow())?;

        self.mark(exit_price, at)?;
        self.realized_pnl = realized_pnl;
        self.status = status;
        self.exit_price = Some(exit_price);
        self.closed_at = Some(at);
        Ok(())
    }

    fn overflow(&self) -> LedgerError {
        LedgerError::Overflow {
            symbol: self.symbol.clone(),
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, PositionStatus::Open)
    }
}

/// State change produced by a fill, a tick or a manual close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PositionEvent {
    Opened { position: Position },
    Increased { position: Position, added: Decimal },
    Reduced {
        position: Position,
        reduced: Decimal,
        realized: Decimal,
    },
    Closed { position: Position },
}

impl PositionEvent {
    #[must_use]
    pub const fn position(&self) -> &Position {
        match self {
            Self::Opened { position }
            | Self::Increased { position, .. }
            | Self::Reduced { position, .. }
            | Self::Closed { position } => position,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("fill quantity {qty} for {symbol} is not a multiple of step {qty_step}")]
    OffGridQuantity {
        symbol: String,
        qty: Decimal,
        qty_step: Decimal,
    },

    #[error("fill quantity must be positive: {qty}")]
    NonPositiveQuantity { qty: Decimal },

    #[error("price must be positive: {price}")]
    NonPositivePrice { price: Decimal },

    #[error("no open {side} position for {symbol}")]
    PositionNotFound { symbol: String, side: PositionSide },

    #[error("arithmetic overflow accounting {symbol}")]
    Overflow { symbol: String },

    #[error(transparent)]
    Quantize(#[from] QuantizeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn long_pnl_and_percentage() {
        let mut pos = Position::open("BTCUSDT", PositionSide::Long, dec!(0.1), dec!(50000), Utc::now());
        pos.mark(dec!(51000), Utc::now()).unwrap();
        assert_eq!(pos.pnl, dec!(100));
        assert_eq!(pos.pnl_percentage, dec!(2));
    }

    #[test]
    fn short_pnl_is_inverted() {
        let mut pos = Position::open("ETHUSDT", PositionSide::Short, dec!(2), dec!(3000), Utc::now());
        pos.mark(dec!(2900), Utc::now()).unwrap();
        assert_eq!(pos.pnl, dec!(200));

        pos.mark(dec!(3100), Utc::now()).unwrap();
        assert_eq!(pos.pnl, dec!(-200));
    }

    #[test]
    fn close_realizes_remaining_pnl() {
        let mut pos = Position::open("BTCUSDT", PositionSide::Long, dec!(0.1), dec!(50000), Utc::now());
        pos.realized_pnl = dec!(10);
        pos.close(PositionStatus::ClosedTp, dec!(52000), Utc::now()).unwrap();

        assert_eq!(pos.realized_pnl, dec!(210));
        assert_eq!(pos.exit_price, Some(dec!(52000)));
        assert!(pos.status.is_closed());
        assert!(pos.closed_at.is_some());
    }

    #[test]
    fn overflowing_mark_leaves_position_unchanged() {
        let size = Decimal::from_i128_with_scale(10_i128.pow(20), 0);
        let far = Decimal::from(10_000_000_000_u64);
        let mut pos = Position::open("BTCUSDT", PositionSide::Long, size, dec!(1), Utc::now());
        let before = pos.clone();

        assert!(matches!(
            pos.mark(far, Utc::now()),
            Err(LedgerError::Overflow { .. })
        ));
        assert!(pos.close(PositionStatus::ClosedManual, far, Utc::now()).is_err());
        assert_eq!(pos, before);
    }

    #[test]
    fn original_symbol_defaults_to_key() {
        let pos = Position::open("BTCUSDT", PositionSide::Long, dec!(1), dec!(1), Utc::now());
        assert_eq!(pos.original_symbol, "BTCUSDT");
        assert_eq!(pos.with_original_symbol("BTCUSDT.P").original_symbol, "BTCUSDT.P");
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PositionStatus::ClosedSl).unwrap(),
            "\"closed_sl\""
        );
        assert_eq!(PositionStatus::ClosedManual.to_string(), "closed_manual");
    }
}
