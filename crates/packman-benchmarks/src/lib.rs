//! Packman benchmarking suite
//!
//! Benchmarks for transcript parsing, package identity resolution and
//! configuration parsing.

pub mod common;

pub use common::*;
