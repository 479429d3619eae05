//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntax)
//! - Value ranges (interval > 0, parseable addresses)
//! - View entries (names, bounds)
//!
//! Returns all errors, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{MetricsConfig, ViewAggregation};
use crate::stats::Bounds;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("export.interval_ms must be greater than 0")]
    ZeroInterval,

    #[error("export.prometheus_address {0:?} is not a socket address")]
    BadAddress(String),

    #[error("views[{index}]: {field} must not be empty")]
    EmptyField { index: usize, field: &'static str },

    #[error("views[{index}]: bounds are only allowed on distribution views")]
    UnexpectedBounds { index: usize },

    #[error("views[{index}]: {reason}")]
    BadBounds { index: usize, reason: String },

    #[error("views[{index}]: duplicate view name {name:?}")]
    DuplicateView { index: usize, name: String },
}

pub fn validate_config(config: &MetricsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.export.interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval);
    }

    if config.export.prometheus_enabled
        && config.export.prometheus_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadAddress(
            config.export.prometheus_address.clone(),
        ));
    }

    for (index, view) in config.views.iter().enumerate() {
        if view.name.is_empty() {
            errors.push(ValidationError::EmptyField { index, field: "name" });
        }
        if view.measure.is_empty() {
            errors.push(ValidationError::EmptyField { index, field: "measure" });
        }
        if config.views[..index].iter().any(|v| v.name == view.name) {
            errors.push(ValidationError::DuplicateView {
                index,
                name: view.name.clone(),
            });
        }
        match (&view.bounds, view.aggregation) {
            (Some(bounds), ViewAggregation::Distribution) => {
                if let Err(e) = Bounds::new(bounds) {
                    errors.push(ValidationError::BadBounds {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
            (Some(_), _) => errors.push(ValidationError::UnexpectedBounds { index }),
            (None, _) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
