use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::orbit::OrbitConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub mosaic: MosaicConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub orbit: OrbitConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    /// Directory backing the object store.
    pub root: PathBuf,
    #[serde(default = "default_max_name_attempts")]
    pub max_name_attempts: u32,
}

fn default_max_name_attempts() -> u32 {
    65536
}

#[derive(Debug, Clone, Deserialize)]
pub struct MosaicConfig {
    pub job_name: String,
    /// Shell command starting the job; BUCKET, DATASET and JOB_NAME are
    /// set in its environment.
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            command: None,
            sidecar_suffix: default_sidecar_suffix(),
        }
    }
}

fn default_sidecar_suffix() -> String {
    ".npz".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub ingest_workers: usize,
    pub extensions: Vec<String>,
    pub work_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            ingest_workers: 4,
            extensions: vec!["jxl".to_string()],
            work_dir: std::env::temp_dir().join("orbit-batcher"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dir: None,
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.storage.bucket.trim().is_empty() || self.storage.bucket.contains('/') {
            return invalid("storage.bucket must be a plain, non-empty name");
        }
        if self.storage.max_name_attempts == 0 {
            return invalid("storage.max_name_attempts must be at least 1");
        }
        if self.pipeline.queue_capacity == 0 || self.pipeline.ingest_workers == 0 {
            return invalid("pipeline.queue_capacity and pipeline.ingest_workers must be positive");
        }
        if self.pipeline.extensions.is_empty() {
            return invalid("pipeline.extensions must not be empty");
        }
        if !(-1.0..=1.0).contains(&self.orbit.heading_alignment) {
            return invalid("orbit.heading_alignment must lie in [-1, 1]");
        }
        if self.orbit.closure_radius_m <= 0.0 {
            return invalid("orbit.closure_radius_m must be positive");
        }
        if self.orbit.backfill_min_gap_s >= self.orbit.backfill_max_gap_s {
            return invalid("orbit.backfill_min_gap_s must be below orbit.backfill_max_gap_s");
        }
        Ok(())
    }
}
