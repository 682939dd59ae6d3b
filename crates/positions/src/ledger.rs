//! In-memory position ledger.
//!
//! Positions are keyed by (normalized symbol, side). Fills net against the
//! opposite side first, so at most one side of a symbol is open at a time.
//! Every mutation of a symbol runs under that symbol's lock, which covers both
//! sides; different symbols never contend.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use quantgate_core::{FillEvent, LedgerConfig, PositionSide, PriceTick};
use quantgate_instruments::ConstraintStore;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::triggers::{check_triggers, quantize_protection};
use crate::types::{LedgerError, Position, PositionEvent, PositionStatus};

#[derive(Debug, Default)]
struct SymbolBook {
    long: Option<Position>,
    short: Option<Position>,
    /// Realized PnL across every position this symbol has had.
    realized: Decimal,
}

impl SymbolBook {
    fn slot(&mut self, side: PositionSide) -> &mut Option<Position> {
        match side {
            PositionSide::Long => &mut self.long,
            PositionSide::Short => &mut self.short,
        }
    }

    fn get(&self, side: PositionSide) -> Option<&Position> {
        match side {
            PositionSide::Long => self.long.as_ref(),
            PositionSide::Short => self.short.as_ref(),
        }
    }

    fn open(&self) -> impl Iterator<Item = &Position> {
        self.long.iter().chain(self.short.iter())
    }
}

pub struct PositionLedger {
    store: Arc<ConstraintStore>,
    config: LedgerConfig,
    books: RwLock<HashMap<String, Arc<Mutex<SymbolBook>>>>,
    history: Mutex<VecDeque<Position>>,
}

impl PositionLedger {
    #[must_use]
    pub fn new(store: Arc<ConstraintStore>) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    #[must_use]
    pub fn with_config(store: Arc<ConstraintStore>, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            books: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Applies an execution report.
    ///
    /// A fill first reduces or closes an open position on the opposite side;
    /// whatever quantity remains opens or increases the fill's own side.
    /// Reduce-only fills never open or increase a position.
    ///
    /// # Errors
    /// Rejects non-positive quantities and prices, quantities off the
    /// instrument's quantity grid, negative protective levels, and fills whose
    /// accounting overflows `Decimal`. A rejected fill leaves the ledger
    /// unchanged.
    pub async fn apply_fill(&self, fill: &FillEvent) -> Result<Vec<PositionEvent>, LedgerError> {
        if fill.quantity <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveQuantity { qty: fill.quantity });
        }
        if fill.price <= Decimal::ZERO {
            return Err(LedgerError::NonPositivePrice { price: fill.price });
        }

        let constraint = self.store.get(&fill.symbol, false).await;
        if self.config.reject_off_grid_fills && !constraint.is_on_qty_grid(fill.quantity) {
            return Err(LedgerError::OffGridQuantity {
                symbol: fill.symbol.clone(),
                qty: fill.quantity,
                qty_step: constraint.qty_step,
            });
        }

        let side = fill.side.opens();
        let (stop_loss, take_profit) =
            quantize_protection(&constraint, side, fill.stop_loss, fill.take_profit)?;

        let key = constraint.symbol.as_str();
        let book = self.book(key);
        let mut book = book.lock();
        let mut events = Vec::new();
        let mut remaining = fill.quantity;
        let at = fill.timestamp;

        // Work on copies; the book is only written once every step succeeded.
        let mut realized_total = book.realized;
        let mut opposite = book.get(side.opposite()).cloned();
        let mut own = book.get(side).cloned();
        let mut closed = None;

        if let Some(mut pos) = opposite.take() {
            if remaining < pos.size {
                let realized = pos.pnl_at(fill.price, remaining)?;
                pos.realized_pnl = checked_add(key, pos.realized_pnl, realized)?;
                pos.size -= remaining;
                pos.mark(fill.price, at)?;
                realized_total = checked_add(key, realized_total, realized)?;
                info!(
                    symbol = key,
                    side = %pos.side,
                    reduced = %remaining,
                    size = %pos.size,
                    realized = %realized,
                    "Position reduced"
                );
                events.push(PositionEvent::Reduced {
                    position: pos.clone(),
                    reduced: remaining,
                    realized,
                });
                opposite = Some(pos);
                remaining = Decimal::ZERO;
            } else {
                remaining -= pos.size;
                pos.close(PositionStatus::ClosedManual, fill.price, at)?;
                realized_total = checked_add(key, realized_total, pos.pnl)?;
                events.push(PositionEvent::Closed {
                    position: pos.clone(),
                });
                closed = Some(pos);
            }
        }

        let has_remainder = !remaining.is_zero();
        if has_remainder && fill.reduce_only {
            debug!(
                symbol = key,
                order_id = fill.order_id,
                remainder = %remaining,
                "Reduce-only fill remainder ignored"
            );
        } else if has_remainder {
            match own.as_mut() {
                Some(pos) => {
                    let total = checked_add(key, pos.size, remaining)?;
                    let added_notional = fill
                        .price
                        .checked_mul(remaining)
                        .ok_or_else(|| overflow(key))?;
                    let basis = checked_add(key, pos.entry_notional()?, added_notional)?;
                    pos.entry_price = basis / total;
                    pos.size = total;
                    if stop_loss.is_some() {
                        pos.stop_loss = stop_loss;
                    }
                    if take_profit.is_some() {
                        pos.take_profit = take_profit;
                    }
                    pos.mark(fill.price, at)?;
                    info!(
                        symbol = key,
                        side = %side,
                        added = %remaining,
                        size = %pos.size,
                        entry = %pos.entry_price,
                        "Position increased"
                    );
                    events.push(PositionEvent::Increased {
                        position: pos.clone(),
                        added: remaining,
                    });
                }
                None => {
                    let mut pos = Position::open(key, side, remaining, fill.price, at)
                        .with_original_symbol(&fill.symbol);
                    pos.stop_loss = stop_loss;
                    pos.take_profit = take_profit;
                    info!(
                        symbol = key,
                        original_symbol = fill.symbol,
                        side = %side,
                        size = %pos.size,
                        entry = %pos.entry_price,
                        stop_loss = ?pos.stop_loss,
                        take_profit = ?pos.take_profit,
                        "Position opened"
                    );
                    events.push(PositionEvent::Opened {
                        position: pos.clone(),
                    });
                    own = Some(pos);
                }
            }
        }

        *book.slot(side.opposite()) = opposite;
        *book.slot(side) = own;
        book.realized = realized_total;
        if let Some(pos) = closed {
            log_closed(&pos);
            self.archive(pos);
        }

        Ok(events)
    }

    /// Re-marks open positions for the tick's symbol and closes any whose
    /// stop-loss or take-profit the price crossed. Returns one `Closed` event
    /// per triggered position.
    ///
    /// # Errors
    /// Returns `LedgerError::NonPositivePrice` for a non-positive tick price
    /// and `LedgerError::Overflow` when marking overflows `Decimal`.
    pub fn on_price_tick(&self, tick: &PriceTick) -> Result<Vec<PositionEvent>, LedgerError> {
        if tick.price <= Decimal::ZERO {
            return Err(LedgerError::NonPositivePrice { price: tick.price });
        }

        let key = self.store.normalizer().normalize(&tick.symbol);
        let Some(book) = self.books.read().get(&key).cloned() else {
            return Ok(Vec::new());
        };
        let mut book = book.lock();
        let mut events = Vec::new();

        for side in [PositionSide::Long, PositionSide::Short] {
            let Some(pos) = book.slot(side).as_mut() else {
                continue;
            };
            pos.mark(tick.price, tick.timestamp)?;
            let Some(trigger) = check_triggers(pos, tick.price) else {
                continue;
            };

            let mut closed = pos.clone();
            closed.close(trigger.status, trigger.exit_price, tick.timestamp)?;
            book.realized = checked_add(&key, book.realized, closed.pnl)?;
            *book.slot(side) = None;
            log_closed(&closed);
            self.archive(closed.clone());
            events.push(PositionEvent::Closed { position: closed });
        }

        Ok(events)
    }

    /// Replaces the protective levels of an open position. `None` clears a
    /// level.
    ///
    /// # Errors
    /// Returns `LedgerError::PositionNotFound` when no position is open on
    /// that side, or `LedgerError::Quantize` for a negative level.
    pub async fn set_protection(
        &self,
        symbol: &str,
        side: PositionSide,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<Position, LedgerError> {
        let constraint = self.store.get(symbol, false).await;
        let (stop_loss, take_profit) =
            quantize_protection(&constraint, side, stop_loss, take_profit)?;

        let not_found = || LedgerError::PositionNotFound {
            symbol: symbol.to_string(),
            side,
        };
        let book = self
            .books
            .read()
            .get(&constraint.symbol)
            .cloned()
            .ok_or_else(not_found)?;
        let mut book = book.lock();
        let pos = book.slot(side).as_mut().ok_or_else(not_found)?;

        pos.stop_loss = stop_loss;
        pos.take_profit = take_profit;
        info!(
            symbol = pos.symbol,
            side = %side,
            stop_loss = ?stop_loss,
            take_profit = ?take_profit,
            "Protection updated"
        );
        Ok(pos.clone())
    }

    /// Closes an open position at `price` outside of any fill.
    ///
    /// # Errors
    /// Returns `LedgerError::PositionNotFound` when no position is open on
    /// that side, or `LedgerError::NonPositivePrice`.
    pub fn close_position(
        &self,
        symbol: &str,
        side: PositionSide,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Position, LedgerError> {
        if price <= Decimal::ZERO {
            return Err(LedgerError::NonPositivePrice { price });
        }
        let not_found = || LedgerError::PositionNotFound {
            symbol: symbol.to_string(),
            side,
        };

        let key = self.store.normalizer().normalize(symbol);
        let book = self.books.read().get(&key).cloned().ok_or_else(not_found)?;
        let mut book = book.lock();
        let mut pos = book.get(side).cloned().ok_or_else(not_found)?;

        pos.close(PositionStatus::ClosedManual, price, at)?;
        book.realized = checked_add(&key, book.realized, pos.pnl)?;
        *book.slot(side) = None;
        log_closed(&pos);
        self.archive(pos.clone());
        Ok(pos)
    }

    #[must_use]
    pub fn position(&self, symbol: &str, side: PositionSide) -> Option<Position> {
        let key = self.store.normalizer().normalize(symbol);
        let book = self.books.read().get(&key).cloned()?;
        let position = book.lock().get(side).cloned();
        position
    }

    /// Open positions ordered by symbol, long before short.
    #[must_use]
    pub fn open_positions(&self) -> Vec<Position> {
        let mut books: Vec<_> = self
            .books
            .read()
            .iter()
            .map(|(key, book)| (key.clone(), Arc::clone(book)))
            .collect();
        books.sort_by(|a, b| a.0.cmp(&b.0));

        books
            .iter()
            .flat_map(|(_, book)| book.lock().open().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Closed positions, oldest first, up to the configured history limit.
    #[must_use]
    pub fn history(&self) -> Vec<Position> {
        self.history.lock().iter().cloned().collect()
    }

    /// Realized PnL for `symbol` across closed positions and partial
    /// reductions of the open one.
    #[must_use]
    pub fn realized_pnl(&self, symbol: &str) -> Decimal {
        let key = self.store.normalizer().normalize(symbol);
        self.books
            .read()
            .get(&key)
            .map_or(Decimal::ZERO, |book| book.lock().realized)
    }

    fn book(&self, key: &str) -> Arc<Mutex<SymbolBook>> {
        if let Some(book) = self.books.read().get(key) {
            return Arc::clone(book);
        }
        Arc::clone(self.books.write().entry(key.to_string()).or_default())
    }

    fn archive(&self, position: Position) {
        let mut history = self.history.lock();
        history.push_back(position);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }
}

fn overflow(key: &str) -> LedgerError {
    LedgerError::Overflow {
        symbol: key.to_string(),
    }
}

fn checked_add(key: &str, a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
    a.checked_add(b).ok_or_else(|| overflow(key))
}

fn log_closed(pos: &Position) {
    info!(
        symbol = pos.symbol,
        side = %pos.side,
        status = %pos.status,
        exit_price = ?pos.exit_price,
        realized = %pos.realized_pnl,
        "Position closed"
    );
}
