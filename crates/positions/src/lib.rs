//! Position lifecycle tracking.
//!
//! The [`PositionLedger`] consumes quantized fills and price ticks, keeps
//! entry, size and PnL per (symbol, side), and closes positions whose
//! stop-loss or take-profit the market crosses. [`run_price_feed`] wires a
//! [`quantgate_core::PriceFeed`] to the ledger and turns triggered closes into
//! exit instructions.

pub mod ledger;
pub mod service;
pub mod triggers;
pub mod types;

pub use ledger::PositionLedger;
pub use service::{run_price_feed, ExitInstruction, FeedSummary};
pub use triggers::{check_triggers, quantize_protection, Trigger};
pub use types::{LedgerError, Position, PositionEvent, PositionStatus};
