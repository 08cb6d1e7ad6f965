//! Configuration types and parsing for sparkport.yml

use crate::dialect::SourceDialect;
use crate::error::{CoreError, CoreResult};
use crate::serde_helpers::default_true;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Names of the configuration file, in lookup order
pub const CONFIG_FILE_NAMES: [&str; 2] = ["sparkport.yml", "sparkport.yaml"];

/// Project configuration from sparkport.yml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory scanned for source units
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Directory receiving converted SQL and outcome records
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Dialect used for files whose extension is not in `extensions`
    #[serde(default)]
    pub default_dialect: SourceDialect,

    /// File extension (without dot) to dialect
    #[serde(default = "default_extensions")]
    pub extensions: BTreeMap<String, SourceDialect>,

    #[serde(default)]
    pub rewrite: RewriteConfig,

    #[serde(default)]
    pub escalation: EscalationConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// Maximum statements processed concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Rewrite engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewriteConfig {
    /// Pass ceiling before a statement is reported as non-converging
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
        }
    }
}

/// AI escalation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Model serving endpoint passed to `AI_QUERY`
    #[serde(default = "default_ai_model")]
    pub ai_model: String,

    /// Statement text beyond this many characters is truncated in the prompt
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ai_model: default_ai_model(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

/// Timeout and retry budget for every external call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Databricks SQL warehouse connection settings.
///
/// Credentials are never stored in the file; only the names of the
/// environment variables that hold them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarehouseConfig {
    #[serde(default = "default_host_env")]
    pub host_env: String,

    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// SQL warehouse id; falls back to `DATABRICKS_WAREHOUSE_ID`
    #[serde(default)]
    pub warehouse_id: Option<String>,

    /// Catalog used as execution context
    #[serde(default)]
    pub catalog: Option<String>,

    /// Schema used as execution context
    #[serde(default)]
    pub schema: Option<String>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host_env: default_host_env(),
            token_env: default_token_env(),
            warehouse_id: None,
            catalog: None,
            schema: None,
        }
    }
}

/// Environment variable consulted when `warehouse.warehouse_id` is unset
pub const WAREHOUSE_ID_ENV: &str = "DATABRICKS_WAREHOUSE_ID";

impl WarehouseConfig {
    /// Configured warehouse id, or the value of `DATABRICKS_WAREHOUSE_ID`
    pub fn resolve_warehouse_id(&self) -> Option<String> {
        self.warehouse_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| std::env::var(WAREHOUSE_ID_ENV).ok())
            .filter(|id| !id.trim().is_empty())
    }
}

fn default_source_dir() -> String {
    "sql".to_string()
}

fn default_output_dir() -> String {
    "converted".to_string()
}

fn default_extensions() -> BTreeMap<String, SourceDialect> {
    BTreeMap::from([
        ("hql".to_string(), SourceDialect::Hive),
        ("trino".to_string(), SourceDialect::Trino),
    ])
}

fn default_max_passes() -> usize {
    8
}

fn default_ai_model() -> String {
    "databricks-claude-sonnet-4-5".to_string()
}

fn default_max_prompt_chars() -> usize {
    3000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_host_env() -> String {
    "DATABRICKS_HOST".to_string()
}

fn default_token_env() -> String {
    "DATABRICKS_TOKEN".to_string()
}

fn default_workers() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            default_dialect: SourceDialect::default(),
            extensions: default_extensions(),
            rewrite: RewriteConfig::default(),
            escalation: EscalationConfig::default(),
            service: ServiceConfig::default(),
            warehouse: WarehouseConfig::default(),
            workers: default_workers(),
        }
    }
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> CoreResult<Self> {
        // An empty file is a valid "all defaults" config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParseError {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory.
    /// Looks for sparkport.yml or sparkport.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        match Self::find_in_dir(dir) {
            Some(path) => Self::load(&path),
            None => Err(CoreError::ConfigNotFound {
                path: dir.join(CONFIG_FILE_NAMES[0]).display().to_string(),
            }),
        }
    }

    /// Like [`load_from_dir`](Self::load_from_dir), but a missing file yields defaults
    pub fn load_or_default(dir: &Path) -> CoreResult<Self> {
        match Self::find_in_dir(dir) {
            Some(path) => Self::load(&path),
            None => {
                log::debug!("no config file in {}, using defaults", dir.display());
                Ok(Self::default())
            }
        }
    }

    fn find_in_dir(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists())
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.rewrite.max_passes == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "rewrite.max_passes must be at least 1".to_string(),
            });
        }

        if self.workers == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "workers must be at least 1".to_string(),
            });
        }

        if self.source_dir.trim().is_empty() || self.output_dir.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "source_dir and output_dir cannot be empty".to_string(),
            });
        }

        if self.escalation.enabled && self.escalation.ai_model.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "escalation.ai_model cannot be empty while escalation is enabled"
                    .to_string(),
            });
        }

        for ext in self.extensions.keys() {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "Invalid extension '{}' in extensions (use e.g. 'hql', without the dot)",
                        ext
                    ),
                });
            }
        }

        Ok(())
    }

    /// Dialect for a source file, from its extension or the configured default
    pub fn dialect_for(&self, path: &Path) -> SourceDialect {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.extensions.get(&ext.to_ascii_lowercase()).copied())
            .or_else(|| SourceDialect::from_extension(path))
            .unwrap_or(self.default_dialect)
    }

    /// Whether a file should be picked up as a source unit
    pub fn is_source_file(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = ext.to_ascii_lowercase();
                ext == "sql" || self.extensions.contains_key(&ext)
            }
            None => false,
        }
    }

    /// Absolute source directory relative to a project root
    pub fn source_dir_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.source_dir)
    }

    /// Absolute output directory relative to a project root
    pub fn output_dir_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
