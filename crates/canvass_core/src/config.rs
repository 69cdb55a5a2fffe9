use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CanvassConfig {
    pub database: DatabaseConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "canvass.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON file of registry answers keyed by document number.
    pub fixtures: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl CanvassConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = CanvassConfig::from_toml("").unwrap();
        assert_eq!(config.database.path, "canvass.db");
        assert_eq!(config.logging.filter, "info");
        assert!(config.registry.fixtures.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = CanvassConfig::from_toml(
            r#"
            [database]
            path = "/var/lib/canvass/voters.db"

            [registry]
            fixtures = "registry.json"

            [logging]
            filter = "canvass_core=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, "/var/lib/canvass/voters.db");
        assert_eq!(config.registry.fixtures, Some(PathBuf::from("registry.json")));
        assert_eq!(config.logging.filter, "canvass_core=debug");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CanvassConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.database.path, "canvass.db");
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(CanvassConfig::from_toml("[database]\npath = 3").is_err());
    }
}
