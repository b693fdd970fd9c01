//! Error types and result aliases for packman operations.
//!
//! Provides a unified error type covering transport, protocol, archive and
//! configuration failures. A package manager operation that the server
//! reports as failed is *not* an error: it is returned as a response value
//! with `success == false`.

use thiserror::Error;

/// Unified error type for all packman operations
#[derive(Error, Debug)]
pub enum PackmanError {
    // Precondition errors
    #[error("Required argument '{name}' was not provided")]
    MissingArgument { name: &'static str },

    // Protocol errors
    #[error("Command '{command}' is not supported by the service")]
    UnsupportedCommand { command: String },

    #[error("Service returned status {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("Failed to parse service response: {message}")]
    IncompleteResponse { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Service timeout exceeded: {message}")]
    ServiceTimeout { message: String },

    // Identity errors
    #[error("Package '{name}' could not be identified")]
    PackageNotFound { name: String },

    #[error("Archive error: {message}")]
    Archive {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to parse JSON response: {message}")]
    JsonParse { message: String },

    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Config errors
    #[error("Failed to parse packman.toml: {message} at line {line}, column {column}")]
    TomlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for packman operations
pub type PackmanResult<T> = Result<T, PackmanError>;

impl PackmanError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an archive error from any error type
    pub fn archive<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Archive {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Translate a non-2xx HTTP status into the matching error.
    ///
    /// 400 means the service rejected the command itself.
    pub fn from_status(status: u16, reason: &str, command: Option<&str>) -> Self {
        if status == 400 {
            Self::UnsupportedCommand {
                command: command.unwrap_or_default().to_string(),
            }
        } else {
            Self::HttpStatus {
                status,
                reason: reason.to_string(),
            }
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            PackmanError::Unauthorized { .. } => {
                Some("Check the configured username and password for the server")
            },
            PackmanError::ServiceTimeout { .. } => {
                Some("The server may still be restarting; retry with a longer --timeout-ms")
            },
            PackmanError::UnsupportedCommand { .. } => {
                Some("The server's package manager does not accept this command; check its version")
            },
            PackmanError::Network { .. } => Some("Check the server base URL and that the server is running"),
            PackmanError::PackageNotFound { .. } => {
                Some("Make sure the file is a content package with META-INF/vault/properties.xml")
            },
            PackmanError::MissingArgument { .. } => Some("Provide a package file or a package id"),
            _ => None,
        }
    }
}
