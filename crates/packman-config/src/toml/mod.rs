//! packman.toml configuration parsing and serialization

use std::time::Duration;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use url::Url;

use packman_core::error::PackmanError;
use packman_core::types::AcHandling;

use crate::ConfigResult;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4502";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";
pub const DEFAULT_REQUEST_SECS: u64 = 60;
pub const DEFAULT_CONNECT_SECS: u64 = 30;
pub const DEFAULT_SERVICE_WAIT_MS: i64 = 60_000;
pub const DEFAULT_AUTOSAVE: i64 = 1024;

/// One configuration layer as written in a file.
///
/// Every field is optional so that layers can be merged; unset fields fall
/// back to lower layers and finally to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackmanToml {
    pub server: ServerSection,
    pub timeouts: TimeoutsSection,
    pub install: InstallSection,
}

/// Server location and credentials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Request and service-wait timeouts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimeoutsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_secs: Option<u64>,
    /// Negative waits indefinitely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_wait_ms: Option<i64>,
}

/// Install defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InstallSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autosave: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ac_handling: Option<AcHandling>,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PackmanConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// `None` waits for the service indefinitely
    pub service_wait: Option<Duration>,
    pub recursive: bool,
    pub autosave: i64,
    pub ac_handling: Option<AcHandling>,
}

impl Default for PackmanConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_SECS),
            service_wait: Some(Duration::from_millis(DEFAULT_SERVICE_WAIT_MS as u64)),
            recursive: true,
            autosave: DEFAULT_AUTOSAVE,
            ac_handling: None,
        }
    }
}

impl PackmanToml {
    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(mut self, other: PackmanToml) -> PackmanToml {
        fn pick<T>(base: &mut Option<T>, top: Option<T>) {
            if top.is_some() {
                *base = top;
            }
        }

        pick(&mut self.server.base_url, other.server.base_url);
        pick(&mut self.server.username, other.server.username);
        pick(&mut self.server.password, other.server.password);
        pick(&mut self.timeouts.request_secs, other.timeouts.request_secs);
        pick(&mut self.timeouts.connect_secs, other.timeouts.connect_secs);
        pick(&mut self.timeouts.service_wait_ms, other.timeouts.service_wait_ms);
        pick(&mut self.install.recursive, other.install.recursive);
        pick(&mut self.install.autosave, other.install.autosave);
        pick(&mut self.install.ac_handling, other.install.ac_handling);
        self
    }

    /// Apply defaults and validate
    pub fn resolve(&self) -> ConfigResult<PackmanConfig> {
        validate_config(self)?;

        let base_url = self
            .server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let service_wait_ms = self.timeouts.service_wait_ms.unwrap_or(DEFAULT_SERVICE_WAIT_MS);

        Ok(PackmanConfig {
            base_url,
            username: self.server.username.clone().unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: self.server.password.clone().unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            request_timeout: Duration::from_secs(self.timeouts.request_secs.unwrap_or(DEFAULT_REQUEST_SECS)),
            connect_timeout: Duration::from_secs(self.timeouts.connect_secs.unwrap_or(DEFAULT_CONNECT_SECS)),
            service_wait: u64::try_from(service_wait_ms).ok().map(Duration::from_millis),
            recursive: self.install.recursive.unwrap_or(true),
            autosave: self.install.autosave.unwrap_or(DEFAULT_AUTOSAVE),
            ac_handling: self.install.ac_handling,
        })
    }
}

/// Parse TOML string to PackmanToml configuration
pub fn parse_packman_toml(content: &str) -> ConfigResult<PackmanToml> {
    // Syntax first, for error locations
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| toml_error(content, e.message(), e.span()))?;

    let config: PackmanToml =
        toml::from_str(content).map_err(|e| toml_error(content, e.message(), e.span()))?;

    validate_config(&config)?;

    Ok(config)
}

/// Serialize PackmanToml to TOML string
pub fn serialize_packman_toml(config: &PackmanToml) -> ConfigResult<String> {
    toml::to_string_pretty(config).map_err(|e| PackmanError::TomlParse {
        message: format!("TOML serialization error: {}", e),
        line: 0,
        column: 0,
    })
}

/// Validate the fields a layer sets
pub fn validate_config(config: &PackmanToml) -> ConfigResult<()> {
    if let Some(base_url) = &config.server.base_url {
        let url = Url::parse(base_url).map_err(|e| PackmanError::ConfigValidation {
            field: "server.base-url".to_string(),
            reason: format!("'{}' is not a valid URL: {}", base_url, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PackmanError::ConfigValidation {
                field: "server.base-url".to_string(),
                reason: format!("scheme must be http or https, found '{}'", url.scheme()),
            });
        }
    }

    if let Some(autosave) = config.install.autosave {
        if autosave <= 0 {
            return Err(PackmanError::ConfigValidation {
                field: "install.autosave".to_string(),
                reason: format!("must be positive, found {}", autosave),
            });
        }
    }

    if config.timeouts.request_secs == Some(0) {
        return Err(PackmanError::ConfigValidation {
            field: "timeouts.request-secs".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(())
}

/// Load and parse packman.toml from file path
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<PackmanToml> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PackmanError::io(format!("Failed to read {}", path), e))?;

    parse_packman_toml(&content).map_err(|e| match e {
        PackmanError::TomlParse { message, line, column } => PackmanError::TomlParse {
            message: format!("in {}: {}", path, message),
            line,
            column,
        },
        PackmanError::ConfigValidation { field, reason } => PackmanError::ConfigValidation {
            field,
            reason: format!("{} (in {})", reason, path),
        },
        other => other,
    })
}

fn toml_error(content: &str, message: &str, span: Option<std::ops::Range<usize>>) -> PackmanError {
    let (line, column) = span
        .map(|s| line_column(content, s.start))
        .unwrap_or((0, 0));
    PackmanError::TomlParse {
        message: message.trim().to_string(),
        line,
        column,
    }
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    (line, column)
}
