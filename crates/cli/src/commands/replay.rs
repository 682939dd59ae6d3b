//! Replay CLI command.
//!
//! Feeds a JSON-lines file of fills and price ticks through a fresh position
//! ledger, printing every exit instruction the triggers produce and a summary
//! of open positions and history at the end.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use clap::Args;
use quantgate_core::{FillEvent, PriceFeed, PriceTick};
use quantgate_positions::{run_price_feed, FeedSummary, Position, PositionLedger};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use super::{print_json, Context};

/// Arguments for the replay command.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// JSON-lines file; each line is `{"type": "fill", ...}` or `{"type": "tick", ...}`
    pub file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ReplayRecord {
    Fill(FillEvent),
    Tick(PriceTick),
}

/// Price feed over recorded events. Fills between ticks are applied to the
/// ledger as they are reached.
struct ReplayFeed {
    records: VecDeque<ReplayRecord>,
    ledger: Arc<PositionLedger>,
}

#[async_trait]
impl PriceFeed for ReplayFeed {
    async fn next_tick(&mut self) -> Result<Option<PriceTick>> {
        while let Some(record) = self.records.pop_front() {
            match record {
                ReplayRecord::Fill(fill) => {
                    if let Err(e) = self.ledger.apply_fill(&fill).await {
                        warn!(order_id = fill.order_id, error = %e, "Fill rejected");
                    }
                }
                ReplayRecord::Tick(tick) => return Ok(Some(tick)),
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    ticks: u64,
    triggered: u64,
    orders_sent: u64,
    manual_exits: u64,
    open_positions: Vec<Position>,
    history: Vec<Position>,
}

/// Runs the recorded events through the ledger and prints the outcome.
///
/// # Errors
/// Returns an error if the file cannot be read or a line is not a record.
pub async fn run_replay(ctx: &Context, args: ReplayArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let report = replay(ctx, &text).await?;
    print_json(&report)
}

fn parse_records(text: &str) -> Result<VecDeque<ReplayRecord>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid record on line {}", i + 1))
        })
        .collect()
}

async fn replay(ctx: &Context, text: &str) -> Result<ReplayReport> {
    let ledger = Arc::new(PositionLedger::with_config(
        Arc::clone(&ctx.store),
        ctx.config.ledger,
    ));
    let feed = ReplayFeed {
        records: parse_records(text)?,
        ledger: Arc::clone(&ledger),
    };

    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(instruction) = rx.recv().await {
            match serde_json::to_string(&instruction) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "Failed to render exit instruction"),
            }
        }
    });

    let FeedSummary {
        ticks,
        triggered,
        orders_sent,
        orders_invalid,
        ..
    } = run_price_feed(feed, Arc::clone(&ledger), ctx.validator(), tx).await?;
    printer.await?;

    Ok(ReplayReport {
        ticks,
        triggered,
        orders_sent,
        manual_exits: orders_invalid,
        open_positions: ledger.open_positions(),
        history: ledger.history(),
    })
}
