/// `load_config` module: loads the YAML CLI configuration and applies environment overrides.
///
/// Every section and field is optional; an empty or absent file yields the
/// defaults (bucket `nshmp-hazout`, sentinel `map.csv`, fail-fast, no timeout).
///
/// # Environment
/// - `HAZOUT_BUCKET`: bucket to index
/// - `HAZOUT_ENDPOINT`: S3-compatible endpoint URL
/// - `HAZOUT_TIMEOUT_SECS`: wall-clock limit of one index invocation
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use hazout_core::index::{ClassifyPolicy, IndexConfig, DEFAULT_BUCKET, DEFAULT_SENTINEL};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_ENDPOINT: &str = "https://s3.us-west-2.amazonaws.com";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub store: StoreSection,
    pub index: IndexSection,
    pub curves: CurvesSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub endpoint: String,
    pub bucket: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    pub sentinel: String,
    pub skip_invalid: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_string(),
            skip_invalid: false,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CurvesSection {
    /// JSON table of precomputed hazard curves.
    pub table: Option<PathBuf>,
}

impl CliConfig {
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            bucket: self.store.bucket.clone(),
            sentinel: self.index.sentinel.clone(),
            policy: if self.index.skip_invalid {
                ClassifyPolicy::SkipInvalid
            } else {
                ClassifyPolicy::FailFast
            },
            timeout: self.index.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Loads a YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let mut config: CliConfig = if config_content.trim().is_empty() {
        CliConfig::default()
    } else {
        serde_yaml::from_str(&config_content).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            anyhow::anyhow!("Failed to parse config YAML: {e}")
        })?
    };
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Loads `path` if given, otherwise starts from the defaults; environment
/// overrides apply either way.
pub fn load_optional_config(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = CliConfig::default();
            apply_env_overrides(&mut config)?;
            Ok(config)
        }
    }
}

fn apply_env_overrides(config: &mut CliConfig) -> Result<()> {
    if let Ok(bucket) = std::env::var("HAZOUT_BUCKET") {
        info!(bucket = %bucket, "Bucket overridden from environment");
        config.store.bucket = bucket;
    }
    if let Ok(endpoint) = std::env::var("HAZOUT_ENDPOINT") {
        info!(endpoint = %endpoint, "Endpoint overridden from environment");
        config.store.endpoint = endpoint;
    }
    if let Ok(raw) = std::env::var("HAZOUT_TIMEOUT_SECS") {
        let secs = raw
            .parse::<u64>()
            .with_context(|| format!("HAZOUT_TIMEOUT_SECS must be whole seconds, got {raw:?}"))?;
        config.index.timeout_secs = Some(secs);
    }
    Ok(())
}
