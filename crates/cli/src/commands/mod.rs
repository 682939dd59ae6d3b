//! CLI commands.

pub mod constraints;
pub mod quantize;
pub mod replay;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use quantgate_core::{AppConfig, MetadataProvider};
use quantgate_instruments::{
    ConstraintStore, FileMetadataProvider, OfflineMetadataProvider, OrderValidator,
};
use serde::Serialize;

pub use constraints::{run_constraints, ConstraintsArgs};
pub use quantize::{run_quantize, QuantizeArgs};
pub use replay::{run_replay, ReplayArgs};
pub use validate::{run_validate, ValidateArgs};

/// Shared state built once from configuration.
pub struct Context {
    pub config: AppConfig,
    pub store: Arc<ConstraintStore>,
}

impl Context {
    /// # Errors
    /// Returns an error if the metadata file cannot be loaded.
    pub fn new(config: AppConfig, metadata: Option<&Path>) -> Result<Self> {
        let provider: Arc<dyn MetadataProvider> = match metadata {
            Some(path) => {
                let provider = FileMetadataProvider::from_path(path)
                    .with_context(|| format!("Failed to load metadata from {}", path.display()))?;
                tracing::info!(
                    path = %path.display(),
                    instruments = provider.len(),
                    "Using file metadata provider"
                );
                Arc::new(provider)
            }
            None => {
                tracing::debug!("No metadata file given, resolving from static table");
                Arc::new(OfflineMetadataProvider)
            }
        };

        let store = Arc::new(ConstraintStore::from_config(provider, &config.instruments));
        Ok(Self { config, store })
    }

    #[must_use]
    pub fn validator(&self) -> OrderValidator {
        OrderValidator::new(Arc::clone(&self.store)).with_config(self.config.validator)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_context() -> Context {
    // Offline context never fails to build
    Context::new(AppConfig::default(), None).unwrap()
}
