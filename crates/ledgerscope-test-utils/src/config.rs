//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use ledgerscope_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .include_depth(3)
///     .batch_size(2)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn discovery_depth(mut self, depth: usize) -> Self {
        self.config.discovery.max_depth = depth;
        self
    }

    pub fn skip_hidden(mut self, skip: bool) -> Self {
        self.config.discovery.skip_hidden = skip;
        self
    }

    pub fn exclude_dirs(mut self, dirs: &[&str]) -> Self {
        self.config.discovery.exclude_dirs = dirs.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn include_depth(mut self, depth: usize) -> Self {
        self.config.includes.max_depth = depth;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.loader.batch_size = size;
        self
    }

    pub fn async_read_threshold(mut self, bytes: u64) -> Self {
        self.config.loader.async_read_threshold_bytes = bytes;
        self
    }

    pub fn token_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.loader.token_cache_capacity = capacity;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
