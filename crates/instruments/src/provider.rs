//! Metadata providers that need no network transport.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use quantgate_core::{MetadataProvider, ProviderError, RawInstrumentFilters, SymbolNormalizer};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum InstrumentsDocument {
    Envelope { result: InstrumentsList },
    Bare(Vec<RawInstrumentFilters>),
}

#[derive(Deserialize)]
struct InstrumentsList {
    list: Vec<RawInstrumentFilters>,
}

/// Serves metadata from an instruments-info JSON dump.
///
/// Accepts either the exchange envelope (`{"result": {"list": [...]}}`) or a
/// bare array of instrument objects. Entries without a `symbol` are skipped.
#[derive(Debug, Clone, Default)]
pub struct FileMetadataProvider {
    instruments: HashMap<String, RawInstrumentFilters>,
}

impl FileMetadataProvider {
    /// # Errors
    /// Returns `ProviderError::Io` if the file cannot be read and
    /// `ProviderError::Malformed` if it is not an instruments document.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let provider = Self::from_json_str(&text)?;
        debug!(
            path = %path.as_ref().display(),
            instruments = provider.len(),
            "Loaded instrument metadata file"
        );
        Ok(provider)
    }

    /// # Errors
    /// Returns `ProviderError::Malformed` if `json` is not an instruments document.
    pub fn from_json_str(json: &str) -> Result<Self, ProviderError> {
        let document: InstrumentsDocument =
            serde_json::from_str(json).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let list = match document {
            InstrumentsDocument::Envelope { result } => result.list,
            InstrumentsDocument::Bare(list) => list,
        };

        let normalizer = SymbolNormalizer::new();
        let mut instruments = HashMap::with_capacity(list.len());
        for raw in list {
            match raw.symbol.as_deref() {
                Some(symbol) => {
                    instruments.insert(normalizer.normalize(symbol), raw);
                }
                None => warn!("Skipping instrument entry without symbol"),
            }
        }
        Ok(Self { instruments })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

#[async_trait]
impl MetadataProvider for FileMetadataProvider {
    async fn fetch_instrument_metadata(
        &self,
        symbol: &str,
    ) -> Result<RawInstrumentFilters, ProviderError> {
        self.instruments
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::SymbolNotFound(symbol.to_string()))
    }
}

/// Provider for offline operation: every fetch fails, so lookups resolve from
/// the static table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineMetadataProvider;

#[async_trait]
impl MetadataProvider for OfflineMetadataProvider {
    async fn fetch_instrument_metadata(
        &self,
        _symbol: &str,
    ) -> Result<RawInstrumentFilters, ProviderError> {
        Err(ProviderError::Unavailable("offline mode".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const ENVELOPE: &str = r#"{
        "retCode": 0,
        "result": {
            "category": "linear",
            "list": [
                {
                    "symbol": "BTCUSDT",
                    "priceFilter": {"tickSize": "0.10"},
                    "lotSizeFilter": {"qtyStep": "0.001", "minOrderQty": "0.001"}
                },
                {
                    "priceFilter": {"tickSize": "1"}
                }
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_envelope_document() {
        let provider = FileMetadataProvider::from_json_str(ENVELOPE).unwrap();
        assert_eq!(provider.len(), 1);

        let raw = provider.fetch_instrument_metadata("BTCUSDT").await.unwrap();
        assert_eq!(raw.qty_step(), Some(dec!(0.001)));
    }

    #[tokio::test]
    async fn test_bare_list_and_missing_symbol() {
        let provider =
            FileMetadataProvider::from_json_str(r#"[{"symbol": "ethusdt", "priceFilter": {"tickSize": 0.01}}]"#)
                .unwrap();
        assert!(provider.fetch_instrument_metadata("ETHUSDT").await.is_ok());
        assert!(matches!(
            provider.fetch_instrument_metadata("SOLUSDT").await,
            Err(ProviderError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            FileMetadataProvider::from_json_str(r#"{"result": 5}"#),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ENVELOPE.as_bytes()).unwrap();

        let provider = FileMetadataProvider::from_path(file.path()).unwrap();
        assert!(!provider.is_empty());

        assert!(matches!(
            FileMetadataProvider::from_path("/nonexistent/instruments.json"),
            Err(ProviderError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_provider_always_fails() {
        let result = OfflineMetadataProvider
            .fetch_instrument_metadata("BTCUSDT")
            .await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
}
