//! Configuration file support for normas.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `NORMAS_`, e.g., `NORMAS_SYNC_DIRECTORY`)
//! 3. Config file (~/.config/normas/config.toml or ./normas.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [saij]
//! base_url = "https://www.saij.gob.ar"  # optional, this is the default
//!
//! [sync]
//! directory = "normas"   # target directory for the mirror
//! page_size = 100
//! concurrency = 0        # 0 = one worker per core
//! max_attempts = 5
//! ```

use std::env;
use std::path::PathBuf;

use config::builder::DefaultState;
use config::{Config as ConfigBuilder, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Environment variables and the config keys they bind to. The keys
/// contain underscores themselves, so a prefix-and-separator source
/// cannot recover them; the mapping is spelled out instead.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("NORMAS_SAIJ_BASE_URL", "saij.base_url"),
    ("NORMAS_SYNC_DIRECTORY", "sync.directory"),
    ("NORMAS_SYNC_PAGE_SIZE", "sync.page_size"),
    ("NORMAS_SYNC_CONCURRENCY", "sync.concurrency"),
    ("NORMAS_SYNC_MAX_ATTEMPTS", "sync.max_attempts"),
];

fn apply_env_overrides<F>(
    mut builder: config::builder::ConfigBuilder<DefaultState>,
    var: F,
) -> Result<config::builder::ConfigBuilder<DefaultState>, config::ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for (name, key) in ENV_OVERRIDES {
        builder = builder.set_override_option(*key, var(name))?;
    }
    Ok(builder)
}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SAIJ service configuration.
    pub saij: SaijConfig,
    /// Default sync options.
    pub sync: SyncConfig,
}

/// SAIJ service configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SaijConfig {
    /// Service origin.
    /// Can also be set via NORMAS_SAIJ_BASE_URL environment variable.
    pub base_url: Option<String>,
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Target directory for mirrored documents.
    pub directory: Option<String>,
    /// Hits requested per search page.
    pub page_size: u64,
    /// Worker count; zero means one per available core.
    pub concurrency: usize,
    /// Attempts per document before it is poisoned.
    pub max_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            directory: None,
            page_size: 100,
            concurrency: 0,
            max_attempts: 5,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/normas/config.toml)
    /// 3. Local config file (./normas.toml)
    /// 4. Environment variables with NORMAS_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "normas") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("normas.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./normas.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let builder = match apply_env_overrides(builder, |name| env::var(name).ok()) {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!("Failed to apply environment overrides: {}", e);
                return Config::default();
            }
        };

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// The SAIJ service origin.
    pub fn base_url(&self) -> String {
        self.saij
            .base_url
            .clone()
            .unwrap_or_else(|| normas::saij::DEFAULT_BASE_URL.to_string())
    }

    /// The target directory for mirrored documents.
    pub fn directory(&self) -> PathBuf {
        self.sync
            .directory
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("normas"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.base_url(), "https://www.saij.gob.ar");
        assert_eq!(config.directory(), PathBuf::from("normas"));
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.sync.concurrency, 0);
        assert_eq!(config.sync.max_attempts, 5);
    }

    #[test]
    fn test_config_builder_partial_override() {
        let toml_content = r#"
            [sync]
            directory = "corpus"
            concurrency = 4
        "#;

        let settings = ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap();
        let config: Config = settings.try_deserialize().unwrap();

        assert_eq!(config.directory(), PathBuf::from("corpus"));
        assert_eq!(config.sync.concurrency, 4);
        // Unspecified fields keep their defaults.
        assert_eq!(config.sync.page_size, 100);
        assert_eq!(config.base_url(), "https://www.saij.gob.ar");
    }

    #[test]
    fn test_env_overrides_bind_snake_case_fields() {
        let var = |name: &str| match name {
            "NORMAS_SAIJ_BASE_URL" => Some("https://saij.example".to_string()),
            "NORMAS_SYNC_PAGE_SIZE" => Some("25".to_string()),
            "NORMAS_SYNC_MAX_ATTEMPTS" => Some("7".to_string()),
            _ => None,
        };

        let settings = apply_env_overrides(ConfigBuilder::builder(), var)
            .unwrap()
            .build()
            .unwrap();
        let config: Config = settings.try_deserialize().unwrap();

        assert_eq!(config.base_url(), "https://saij.example");
        assert_eq!(config.sync.page_size, 25);
        assert_eq!(config.sync.max_attempts, 7);
        // Unset variables leave the defaults alone.
        assert_eq!(config.sync.concurrency, 0);
        assert_eq!(config.directory(), PathBuf::from("normas"));
    }
}
