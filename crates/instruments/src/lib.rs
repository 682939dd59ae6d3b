//! Instrument constraints, quantization and order validation.
//!
//! A [`ConstraintStore`] is built once and shared as `Arc<ConstraintStore>`
//! by the [`Quantizer`] and [`OrderValidator`] that compose the order path.

pub mod constraint;
pub mod provider;
pub mod quantizer;
pub mod static_table;
pub mod store;
pub mod validator;

pub use constraint::{ConstraintSource, InstrumentConstraint};
pub use provider::{FileMetadataProvider, OfflineMetadataProvider};
pub use quantizer::{
    decimal_from_f64, format_to_step, is_multiple_of, snap_to_step, step_decimals,
    QuantizationResult, QuantizeError, Quantizer, Rounded, RoundingDirection,
};
pub use static_table::StaticConstraintTable;
pub use store::{ConstraintStore, StoreConfig};
pub use validator::{
    OrderRequest, OrderValidationResult, OrderValidator, SubmissionOrder, ValidationError,
    Violation,
};
