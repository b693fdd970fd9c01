//! Access control handling modes for package installation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PackmanError;

/// How access control entries inside a package are applied on install.
///
/// The value is passed through to the server as its lower-cased name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcHandling {
    Ignore,
    Overwrite,
    Merge,
    MergePreserve,
    Clear,
}

impl AcHandling {
    /// Parameter value understood by the package manager
    pub fn as_param(&self) -> &'static str {
        match self {
            AcHandling::Ignore => "ignore",
            AcHandling::Overwrite => "overwrite",
            AcHandling::Merge => "merge",
            AcHandling::MergePreserve => "merge_preserve",
            AcHandling::Clear => "clear",
        }
    }
}

impl fmt::Display for AcHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for AcHandling {
    type Err = PackmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "ignore" => Ok(AcHandling::Ignore),
            "overwrite" => Ok(AcHandling::Overwrite),
            "merge" => Ok(AcHandling::Merge),
            "merge_preserve" => Ok(AcHandling::MergePreserve),
            "clear" => Ok(AcHandling::Clear),
            other => Err(PackmanError::ConfigValidation {
                field: "ac-handling".to_string(),
                reason: format!("unknown access control handling '{}'", other),
            }),
        }
    }
}
