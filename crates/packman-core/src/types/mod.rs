//! Core data types for package manager operations.
//!
//! This module provides the value types shared by the client and the CLI:
//! - Package identity resolved from archives and storage paths
//! - Simple, detailed and listing responses
//! - Access control handling modes

pub mod ac_handling;
pub mod pack_id;
pub mod response;

// Re-export all public types
pub use ac_handling::AcHandling;
pub use pack_id::PackId;
pub use response::{DetailedResponse, ListResponse, ListResult, SimpleResponse};
