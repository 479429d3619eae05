//! Startup-time error definitions for the stats core.

use thiserror::Error;

/// Errors raised while declaring keys, measures and views.
///
/// Every variant is a startup configuration problem. Recording never returns
/// one of these; see [`RecordPolicy`](super::RecordPolicy) for how
/// recording-time mistakes are handled.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Tag key name is invalid, or the key belongs to another context.
    #[error("invalid tag key name {name:?}: {reason}")]
    InvalidKeyName { name: String, reason: &'static str },

    /// Measure name is empty, too long or not printable ASCII.
    #[error("invalid measure name {name:?}: {reason}")]
    InvalidMeasureName { name: String, reason: &'static str },

    /// A measure with this name exists with a different description, unit or kind.
    #[error("measure {0:?} already declared with different semantics")]
    DuplicateMeasure(String),

    /// Distribution boundaries are not finite, non-negative and strictly ascending.
    #[error("invalid distribution bounds: {0}")]
    InvalidBounds(String),

    /// View name is empty, too long or not printable ASCII.
    #[error("invalid view name {name:?}: {reason}")]
    InvalidViewName { name: String, reason: &'static str },

    /// The view refers to a measure that this context never declared.
    #[error("view {view:?} refers to undeclared measure {measure:?}")]
    UnknownMeasure { view: String, measure: String },

    /// A different view is already registered under this name.
    #[error("view {0:?} already registered with a different measure, aggregation or tag keys")]
    ConflictingView(String),

    /// No view is registered under this name.
    #[error("view {0:?} is not registered")]
    UnknownView(String),

    /// Installing a default view failed.
    #[error("failed to install default view {view:?}: {source}")]
    Registration {
        view: &'static str,
        #[source]
        source: Box<StatsError>,
    },
}

/// Result type for stats registration.
pub type StatsResult<T> = Result<T, StatsError>;

const MAX_NAME_LEN: usize = 255;

/// Check a registry name: non-empty, at most 255 bytes, printable ASCII.
pub(crate) fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    check_printable(name)
}

/// Same as [`check_name`] but empty strings are accepted (tag values).
pub(crate) fn check_printable(value: &str) -> Result<(), &'static str> {
    if value.len() > MAX_NAME_LEN {
        return Err("longer than 255 bytes");
    }
    if !value.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err("contains non-printable or non-ASCII characters");
    }
    Ok(())
}
