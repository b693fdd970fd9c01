//! # packman-core
//!
//! Core types and utilities shared across all packman crates.
//!
//! This crate provides:
//! - `PackId`, the identity of a content package and its installation path
//! - Response values returned by package manager operations
//! - `PackmanError` for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (PackId, DetailedResponse, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Properties XML reader used by identity resolution

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{PackmanError, PackmanResult};
pub use types::{AcHandling, DetailedResponse, ListResponse, ListResult, PackId, SimpleResponse};
