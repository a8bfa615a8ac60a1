//! Season Common - shared configuration, errors and logging for the season gauge.
//!
//! This crate provides:
//! - Configuration types, file loading and environment overrides
//! - The unified error type used by configuration plumbing
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    Adjustment, Config, NotificationConfig, ObservabilityConfig, SourcesConfig, WatchlistConfig,
};
pub use error::{Error, Result, ResultExt};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
