use crate::{AppConfig, ConfigError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const ORG: &str = "io";
const AUTHOR: &str = "MailBridge";
const APP: &str = "MailBridge";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Uses `config.toml` in the platform config directory, seeding it with defaults.
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from(ORG, AUTHOR, APP).ok_or(ConfigError::MissingDirectories)?;
        Self::with_path(dirs.config_dir().join("config.toml"))
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let initial = AppConfig::default();
            let content = toml::to_string_pretty(&initial)?;
            fs::write(&config_path, content)?;
            tracing::info!(path = %config_path.display(), "wrote default config");
        }

        Ok(Self { config_path })
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = fs::read_to_string(&self.config_path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Loads the file, applies deployment overrides once, and validates the result.
    pub fn load_runtime<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.load()?;
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigManager;
    use crate::ConfigError;

    #[test]
    fn seeds_default_file_and_reads_partial_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let manager = ConfigManager::with_path(&path).expect("manager");
        assert!(path.exists());
        assert_eq!(manager.load().expect("defaults").correlation.ttl_secs, 60);

        std::fs::write(
            &path,
            "[oauth]\nclient_id = \"plugin\"\nclient_secret = \"secret\"\n",
        )
        .expect("write partial config");
        let config = manager.load().expect("partial config");
        assert_eq!(config.oauth.client_id, "plugin");
        assert_eq!(config.oauth.redirect_path, "/oauth2/callback");
    }

    #[test]
    fn runtime_load_applies_overrides_before_validating() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = ConfigManager::with_path(dir.path().join("config.toml")).expect("manager");

        let missing = manager.load_runtime(|_| None);
        assert!(matches!(missing, Err(ConfigError::Invalid(_))));

        let config = manager
            .load_runtime(|key| match key {
                "OAUTHID" => Some("plugin".to_string()),
                "OAUTHSECRET" => Some("secret".to_string()),
                "COOKIESTORE" => Some("c".repeat(48)),
                _ => None,
            })
            .expect("valid runtime config");
        assert_eq!(config.oauth.client_id, "plugin");
    }
}
