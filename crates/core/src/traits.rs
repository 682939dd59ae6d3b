use crate::events::PriceTick;
use crate::metadata::{ProviderError, RawInstrumentFilters};
use anyhow::Result;
use async_trait::async_trait;

/// Source of per-instrument exchange filters.
///
/// Implementations own their transport and retry policy; callers apply their
/// own timeout and fallback.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_instrument_metadata(
        &self,
        symbol: &str,
    ) -> std::result::Result<RawInstrumentFilters, ProviderError>;
}

#[async_trait]
pub trait PriceFeed: Send {
    /// Next tick, or `None` once the feed is exhausted.
    async fn next_tick(&mut self) -> Result<Option<PriceTick>>;
}
