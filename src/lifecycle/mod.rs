//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → init logging → Stats + defaults → exporters → reporter
//!
//! Shutdown (shutdown.rs):
//!     Signal received (signals.rs) → broadcast → reporter flushes → exit
//! ```
//!
//! # Design Decisions
//! - Startup errors propagate to `main`, which decides to exit
//! - Shutdown always ends with one final export

pub mod shutdown;
pub mod startup;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{bootstrap, Bootstrap};
