//! Utility functions and helpers.

pub mod properties;

pub use properties::parse_properties_xml;
