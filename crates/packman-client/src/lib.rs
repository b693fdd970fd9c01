//! Package manager service client for Packman
//!
//! This crate talks to a remote content-package manager over HTTP: it uploads,
//! installs and builds packages, parses the streaming console transcript the
//! service writes while it works, and waits for the service to come back after
//! restarts.
//!
//! ## Modules
//!
//! - `client`: [`PackageManagerClient`], one method per service operation
//! - `parser`: line-oriented transcript parser and progress listeners
//! - `wait`: service availability polling with backoff
//! - `transport`: the [`Transport`] capability and its `reqwest` implementation
//! - `api`: JSON wire types

pub mod api;
pub mod client;
pub mod parser;
pub mod transport;
pub mod wait;

// Re-export main types
pub use client::{InstallOptions, PackageManagerClient};
pub use parser::{
    parse_line_stream, parse_lines, NoopListener, ProgressEvent, ProgressListener, ResponseParser, TracingListener,
};
pub use transport::{CommandRequest, Endpoint, ReqwestTransport, Transport, TransportConfig};
pub use wait::{wait_for_service, Availability, WaitConfig};
