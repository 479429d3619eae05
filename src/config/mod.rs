//! Configuration management.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → MetricsConfig (validated, immutable)
//!     → main.rs wires logging, recording policy, extra views and exporters
//! ```
//!
//! # Design Decisions
//! - All fields have defaults, so an absent or empty file is a valid config
//! - Validation reports every problem at once

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ExportConfig, MetricsConfig, ObservabilityConfig, RecordingConfig, ViewAggregation,
    ViewConfig,
};
pub use validation::{validate_config, ValidationError};
