//! Configuration loading for packman
//!
//! This crate parses and validates `packman.toml` files and layers them with
//! the global configuration, environment variables and command line flags
//! into a single [`PackmanConfig`].

pub mod merge;
pub mod toml;

// Re-export main types
pub use merge::{ConfigLayering, ConfigLoader, ConfigSource};
pub use self::toml::{InstallSection, PackmanConfig, PackmanToml, ServerSection, TimeoutsSection};

use packman_core::error::PackmanError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, PackmanError>;
