pub mod config;
pub mod config_loader;
pub mod events;
pub mod metadata;
pub mod symbol;
pub mod traits;

pub use config::{AppConfig, ConstraintOverride, InstrumentConfig, LedgerConfig, ValidatorConfig};
pub use config_loader::ConfigLoader;
pub use events::{FillEvent, OrderSide, OrderType, PositionSide, PriceTick};
pub use metadata::{
    LotSizeFilter, MetadataValue, NotionalFilter, PriceFilter, ProviderError, RawInstrumentFilters,
};
pub use symbol::SymbolNormalizer;
pub use traits::{MetadataProvider, PriceFeed};
