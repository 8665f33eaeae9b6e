#![deny(unsafe_code)]

//! Configuration loading and validation for ledgerscope.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Provides the [`AppConfig`] type as the central configuration structure.
//! Every section has defaults, so an empty file (or no file at all) yields a
//! usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory discovery configuration.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Include directive resolution.
    #[serde(default)]
    pub includes: IncludeConfig,

    /// Batched file loading.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Directory discovery configuration.
///
/// ## TOML Example
///
/// ```toml
/// [discovery]
/// max_depth = 6
/// skip_hidden = true
/// exclude_dirs = [".git", "node_modules", "archive"]
/// extensions = ["journal", "hledger"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Maximum directory depth below the root that is scanned.
    #[serde(default = "default_discovery_max_depth")]
    pub max_depth: usize,

    /// Skip directories whose name starts with a dot (the root itself is
    /// always scanned).
    #[serde(default = "default_skip_hidden")]
    pub skip_hidden: bool,

    /// Directory names that are never descended into.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// File extensions (without the dot) recognised as ledger files.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_discovery_max_depth(),
            skip_hidden: default_skip_hidden(),
            exclude_dirs: default_exclude_dirs(),
            extensions: default_extensions(),
        }
    }
}

fn default_discovery_max_depth() -> usize {
    10
}

fn default_skip_hidden() -> bool {
    true
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        ".hg",
        ".svn",
        "node_modules",
        "target",
        "build",
        "dist",
        "vendor",
        "__pycache__",
        ".venv",
        ".cache",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_extensions() -> Vec<String> {
    ["journal", "hledger", "ledger"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Include directive resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeConfig {
    /// Maximum include nesting. Includes found in a file at this depth are
    /// skipped with a warning.
    #[serde(default = "default_include_max_depth")]
    pub max_depth: usize,
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_include_max_depth(),
        }
    }
}

fn default_include_max_depth() -> usize {
    10
}

/// Batched file loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Number of root files read and indexed concurrently.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Files at or above this size are read with async I/O; smaller files
    /// are read synchronously.
    #[serde(default = "default_async_read_threshold")]
    pub async_read_threshold_bytes: u64,

    /// Capacity of the per-load token cache (entries, one per file).
    #[serde(default = "default_token_cache_capacity")]
    pub token_cache_capacity: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            async_read_threshold_bytes: default_async_read_threshold(),
            token_cache_capacity: default_token_cache_capacity(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_async_read_threshold() -> u64 {
    1024 * 1024 // 1 MiB
}

fn default_token_cache_capacity() -> usize {
    256
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.includes.max_depth == 0 {
            return Err(ConfigError::Validation(
                "includes.max_depth must be at least 1".to_string(),
            ));
        }
        if self.loader.batch_size == 0 {
            return Err(ConfigError::Validation(
                "loader.batch_size must be at least 1".to_string(),
            ));
        }
        if self.loader.token_cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "loader.token_cache_capacity must be at least 1".to_string(),
            ));
        }

        if self.discovery.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "discovery.extensions must not be empty".to_string(),
            ));
        }
        for (i, ext) in self.discovery.extensions.iter().enumerate() {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(ConfigError::Validation(format!(
                    "discovery.extensions[{i}] must be a bare extension like \"journal\", got {ext:?}"
                )));
            }
        }
        for (i, dir) in self.discovery.exclude_dirs.iter().enumerate() {
            if dir.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "discovery.exclude_dirs[{i}] must not be empty"
                )));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.discovery.max_depth, 10);
        assert_eq!(config.includes.max_depth, 10);
        assert_eq!(config.loader.batch_size, 5);
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.discovery.extensions,
            vec!["journal", "hledger", "ledger"]
        );
        assert!(config.discovery.exclude_dirs.contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.loader.token_cache_capacity, 256);
        assert_eq!(config.loader.async_read_threshold_bytes, 1024 * 1024);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [discovery]
            max_depth = 3
            skip_hidden = false
            exclude_dirs = ["archive"]
            extensions = ["journal"]

            [includes]
            max_depth = 4

            [loader]
            batch_size = 2
            async_read_threshold_bytes = 4096
            token_cache_capacity = 8

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.discovery.max_depth, 3);
        assert!(!config.discovery.skip_hidden);
        assert_eq!(config.discovery.exclude_dirs, vec!["archive"]);
        assert_eq!(config.discovery.extensions, vec!["journal"]);
        assert_eq!(config.includes.max_depth, 4);
        assert_eq!(config.loader.batch_size, 2);
        assert_eq!(config.loader.async_read_threshold_bytes, 4096);
        assert_eq!(config.loader.token_cache_capacity, 8);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_zero_batch_size() {
        let toml = r#"
            [loader]
            batch_size = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_include_depth() {
        let toml = r#"
            [includes]
            max_depth = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_cache_capacity() {
        let toml = r#"
            [loader]
            token_cache_capacity = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_dotted_extension() {
        let toml = r#"
            [discovery]
            extensions = [".journal"]
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("discovery.extensions[0]"));
    }

    #[test]
    fn test_validation_rejects_empty_extensions() {
        let toml = r#"
            [discovery]
            extensions = []
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_log_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_zero_discovery_depth_is_allowed() {
        // Depth 0 scans only the root directory itself.
        let toml = r#"
            [discovery]
            max_depth = 0
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.discovery.max_depth, 0);
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ledgerscope.toml");
        tokio::fs::write(&path, b"[includes]\nmax_depth = 3\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.includes.max_depth, 3);
        assert_eq!(config.discovery.max_depth, 10);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[")
            .await
            .unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    // ── Error display ─────────────────────────────────────────────────

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = AppConfig::parse(&text).unwrap();
        assert_eq!(parsed.discovery.exclude_dirs, config.discovery.exclude_dirs);
        assert_eq!(parsed.loader.batch_size, config.loader.batch_size);
    }
}
