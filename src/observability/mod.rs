//! Observability of the metrics service itself.
//!
//! # Design Decisions
//! - Structured logging through `tracing`
//! - `RUST_LOG` overrides the configured level

pub mod logging;

pub use logging::init_logging;
