use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::errors::{PmlError, Result};

/// Engine configuration with all tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // Layout
    /// Root of the source tree
    pub sources_dir: PathBuf,
    /// Cache snapshot location (defaults to `<sources_dir>/.pml/cache.json`)
    pub cache_file: Option<PathBuf>,
    /// Results area, resolved next to each document
    pub results_subdir: PathBuf,
    /// Extension of processable documents
    pub document_extension: String,

    // Execution
    /// Maximum external calls in flight across every document
    pub max_concurrent_calls: usize,
    /// Optional bound on a single external call, in milliseconds
    pub call_timeout_ms: Option<u64>,
    /// Ignore cached block results
    pub force: bool,

    // Cache
    /// Retention window for cached block results
    pub block_ttl_secs: u64,

    /// Verbose logging
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sources_dir: PathBuf::from("."),
            cache_file: None,
            results_subdir: PathBuf::from(".pml").join("results"),
            document_extension: "pml".to_string(),
            max_concurrent_calls: 10,
            call_timeout_ms: None,
            force: false,
            block_ttl_secs: 24 * 60 * 60,
            debug: false,
        }
    }
}

impl EngineConfig {
    /// Create a new builder for EngineConfig
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Parse a YAML document; absent fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| PmlError::io("read config", path, e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_calls == 0 {
            return Err(PmlError::configuration(
                "max_concurrent_calls must be greater than 0",
            ));
        }
        if self.block_ttl_secs == 0 {
            return Err(PmlError::configuration(
                "block_ttl_secs must be greater than 0",
            ));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(PmlError::configuration(
                "call_timeout_ms must be greater than 0 when set",
            ));
        }
        if self.document_extension.is_empty() || self.document_extension.contains('.') {
            return Err(PmlError::configuration(
                "document_extension must be a bare extension such as 'pml'",
            ));
        }
        if self.results_subdir.is_absolute() {
            return Err(PmlError::configuration(
                "results_subdir must be relative to the document directory",
            ));
        }
        Ok(())
    }

    /// The hidden engine directory at the root of the source tree
    pub fn state_dir(&self) -> PathBuf {
        self.sources_dir.join(".pml")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(|| self.state_dir().join("cache.json"))
    }

    /// Results area for a document
    pub fn results_dir_for(&self, document: &Path) -> PathBuf {
        let parent = document.parent().unwrap_or_else(|| Path::new("."));
        parent.join(&self.results_subdir)
    }

    pub fn block_ttl(&self) -> Duration {
        Duration::from_secs(self.block_ttl_secs)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Fluent builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.sources_dir = dir.into();
        self
    }

    pub fn cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_file = Some(path.into());
        self
    }

    pub fn results_subdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.results_subdir = dir.into();
        self
    }

    pub fn document_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.document_extension = ext.into();
        self
    }

    pub fn max_concurrent_calls(mut self, n: usize) -> Self {
        self.config.max_concurrent_calls = n;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn block_ttl(mut self, ttl: Duration) -> Self {
        self.config.block_ttl_secs = ttl.as_secs();
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.config.force = force;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
