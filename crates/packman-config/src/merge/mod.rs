//! Configuration layering, fallback logic, and environment overrides

use std::collections::HashMap;

use camino::Utf8PathBuf;
use tracing::debug;

use packman_core::error::PackmanError;

use crate::toml::{PackmanConfig, PackmanToml};
use crate::ConfigResult;

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "packman.toml";

pub const ENV_BASE_URL: &str = "PACKMAN_BASE_URL";
pub const ENV_USERNAME: &str = "PACKMAN_USERNAME";
pub const ENV_PASSWORD: &str = "PACKMAN_PASSWORD";
pub const ENV_SERVICE_WAIT_MS: &str = "PACKMAN_SERVICE_WAIT_MS";

/// Main configuration loading interface
pub struct ConfigLoader {
    /// Current working directory
    cwd: Utf8PathBuf,
}

/// Configuration layering and merging
pub struct ConfigLayering;

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Global config file
    Global(Utf8PathBuf),
    /// Project packman.toml file
    Project(Utf8PathBuf),
    /// Environment variable
    Environment(String),
    /// CLI flag
    CommandLine,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self { cwd }
    }

    /// Loader rooted at the process working directory
    pub fn from_current_dir() -> ConfigResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| PackmanError::io("Failed to determine current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| PackmanError::ConfigValidation {
            field: "cwd".to_string(),
            reason: format!("Current directory is not valid UTF-8: {}", e),
        })?;
        Ok(Self::new(cwd))
    }

    /// Load every layer and resolve the final configuration
    pub async fn load(&self, cli_overrides: HashMap<String, String>) -> ConfigResult<PackmanConfig> {
        let global = self.load_global_config().await?;
        let project = self.load_project_config().await?.map(|(config, _)| config);

        ConfigLayering::merge_configs(global, project, ConfigLayering::collect_env_overrides(), cli_overrides)?
            .resolve()
    }

    /// Load the nearest packman.toml, if any
    pub async fn load_project_config(&self) -> ConfigResult<Option<(PackmanToml, ConfigSource)>> {
        let path = self.resolve_config_path(PROJECT_CONFIG_FILE)?;
        if !path.exists() {
            return Ok(None);
        }

        debug!("Loading project configuration from {}", path);
        let config = crate::toml::load_from_file(&path).await?;
        Ok(Some((config, ConfigSource::Project(path))))
    }

    /// Find configuration file in project (walks up directory tree)
    pub fn resolve_config_path(&self, filename: &str) -> ConfigResult<Utf8PathBuf> {
        let mut current = self.cwd.as_path();

        loop {
            let config_path = current.join(filename);
            if config_path.exists() {
                return Ok(config_path);
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // Return path in current directory even if it doesn't exist
        Ok(self.cwd.join(filename))
    }

    /// Load global configuration from `~/.packman/config.toml`
    pub async fn load_global_config(&self) -> ConfigResult<Option<PackmanToml>> {
        let Some(path) = global_config_path()? else {
            return Ok(None);
        };

        if path.exists() {
            debug!("Loading global configuration from {}", path);
            let config = crate::toml::load_from_file(&path).await?;
            Ok(Some(config))
        } else {
            Ok(None)
        }
    }
}

/// Location of the global configuration file, `None` without a home directory
pub fn global_config_path() -> ConfigResult<Option<Utf8PathBuf>> {
    let Some(home_dir) = dirs::home_dir() else {
        return Ok(None);
    };

    let home = Utf8PathBuf::try_from(home_dir).map_err(|e| PackmanError::ConfigValidation {
        field: "home_dir".to_string(),
        reason: format!("Invalid home directory path: {}", e),
    })?;
    Ok(Some(home.join(".packman").join("config.toml")))
}

impl ConfigLayering {
    /// Merge configuration layers, lowest priority first
    pub fn merge_configs(
        global_config: Option<PackmanToml>,
        project_config: Option<PackmanToml>,
        env_overrides: HashMap<String, String>,
        cli_overrides: HashMap<String, String>,
    ) -> ConfigResult<PackmanToml> {
        let mut merged = global_config.unwrap_or_default();

        if let Some(project) = project_config {
            merged = merged.merge(project);
        }

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut merged, &env_overrides)?;

        // Apply CLI flag overrides (highest priority)
        Self::apply_cli_overrides(&mut merged, &cli_overrides)?;

        crate::toml::validate_config(&merged)?;
        Ok(merged)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(config: &mut PackmanToml, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                ENV_BASE_URL => config.server.base_url = Some(value.clone()),
                ENV_USERNAME => config.server.username = Some(value.clone()),
                ENV_PASSWORD => config.server.password = Some(value.clone()),
                ENV_SERVICE_WAIT_MS => {
                    config.timeouts.service_wait_ms = Some(parse_millis(ENV_SERVICE_WAIT_MS, value)?);
                }
                _ => {
                    // Unknown environment variable, ignore
                }
            }
        }

        Ok(())
    }

    /// Apply CLI flag overrides
    fn apply_cli_overrides(config: &mut PackmanToml, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "base-url" => config.server.base_url = Some(value.clone()),
                "username" => config.server.username = Some(value.clone()),
                "password" => config.server.password = Some(value.clone()),
                "service-wait-ms" => {
                    config.timeouts.service_wait_ms = Some(parse_millis("--timeout-ms", value)?);
                }
                "ac-handling" => {
                    config.install.ac_handling = Some(value.parse()?);
                }
                _ => {
                    // Unknown CLI override, ignore
                }
            }
        }

        Ok(())
    }

    /// Collect environment variable overrides
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars().filter(|(key, _)| key.starts_with("PACKMAN_")).collect()
    }
}

fn parse_millis(field: &str, value: &str) -> ConfigResult<i64> {
    value.trim().parse().map_err(|e| PackmanError::ConfigValidation {
        field: field.to_string(),
        reason: format!("'{}' is not a number of milliseconds: {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toml::parse_packman_toml;
    use packman_core::types::AcHandling;
    use std::time::Duration;
    use tempfile::TempDir;

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    #[tokio::test]
    async fn test_config_loader_creation() {
        let cwd = Utf8PathBuf::from("/test");
        let loader = ConfigLoader::new(cwd.clone());
        assert_eq!(loader.cwd, cwd);
    }

    #[tokio::test]
    async fn test_resolve_config_path_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);
        let nested = root.join("content").join("apps");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(root.join(PROJECT_CONFIG_FILE), "[server]\nusername = \"deployer\"\n")
            .await
            .unwrap();

        let loader = ConfigLoader::new(nested);
        let resolved = loader.resolve_config_path(PROJECT_CONFIG_FILE).unwrap();

        assert_eq!(resolved, root.join(PROJECT_CONFIG_FILE));
    }

    #[tokio::test]
    async fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);
        tokio::fs::write(
            root.join(PROJECT_CONFIG_FILE),
            "[server]\nbase-url = \"http://localhost:4503\"\n",
        )
        .await
        .unwrap();

        let loader = ConfigLoader::new(root);
        let (config, source) = loader.load_project_config().await.unwrap().unwrap();

        assert_eq!(config.server.base_url.as_deref(), Some("http://localhost:4503"));
        assert!(matches!(source, ConfigSource::Project(_)));
    }

    #[tokio::test]
    async fn test_load_project_config_reports_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);
        tokio::fs::write(root.join(PROJECT_CONFIG_FILE), "[server\n").await.unwrap();

        let loader = ConfigLoader::new(root);
        let err = loader.load_project_config().await.unwrap_err();
        assert!(matches!(err, PackmanError::TomlParse { ref message, .. } if message.contains("packman.toml")));
    }

    #[test]
    fn test_merge_configs() {
        let global = parse_packman_toml(
            "[server]\nbase-url = \"http://global:4502\"\nusername = \"global\"\n[install]\nautosave = 2048\n",
        )
        .unwrap();
        let project = parse_packman_toml("[server]\nusername = \"project\"\npassword = \"p\"\n").unwrap();

        let env_overrides = HashMap::from([
            (ENV_PASSWORD.to_string(), "from-env".to_string()),
            (ENV_SERVICE_WAIT_MS.to_string(), "-1".to_string()),
        ]);
        let cli_overrides = HashMap::from([
            ("base-url".to_string(), "http://cli:4502".to_string()),
            ("ac-handling".to_string(), "clear".to_string()),
        ]);

        let merged = ConfigLayering::merge_configs(Some(global), Some(project), env_overrides, cli_overrides)
            .unwrap()
            .resolve()
            .unwrap();

        // Project config should take precedence over global
        assert_eq!(merged.username, "project");

        // Global values survive when nothing overrides them
        assert_eq!(merged.autosave, 2048);

        // Environment overrides files
        assert_eq!(merged.password, "from-env");
        assert_eq!(merged.service_wait, None);

        // CLI override should be applied (highest priority)
        assert_eq!(merged.base_url, "http://cli:4502");
        assert_eq!(merged.ac_handling, Some(AcHandling::Clear));
    }

    #[test]
    fn test_merge_without_files_uses_defaults() {
        let merged = ConfigLayering::merge_configs(None, None, HashMap::new(), HashMap::new())
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(merged, PackmanConfig::default());
        assert_eq!(merged.service_wait, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let env_overrides = HashMap::from([(ENV_SERVICE_WAIT_MS.to_string(), "soon".to_string())]);
        assert!(matches!(
            ConfigLayering::merge_configs(None, None, env_overrides, HashMap::new()),
            Err(PackmanError::ConfigValidation { .. })
        ));

        let cli_overrides = HashMap::from([("base-url".to_string(), "mailto:admin@example.com".to_string())]);
        assert!(ConfigLayering::merge_configs(None, None, HashMap::new(), cli_overrides).is_err());
    }

    #[test]
    fn test_collect_env_overrides() {
        std::env::set_var("PACKMAN_TEST_COLLECT", "value");
        std::env::set_var("NOT_PACKMAN_TEST_COLLECT", "ignored");

        let overrides = ConfigLayering::collect_env_overrides();

        assert!(overrides.contains_key("PACKMAN_TEST_COLLECT"));
        assert!(!overrides.contains_key("NOT_PACKMAN_TEST_COLLECT"));

        std::env::remove_var("PACKMAN_TEST_COLLECT");
        std::env::remove_var("NOT_PACKMAN_TEST_COLLECT");
    }
}
