use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of a batch that could not be dispatched, kept for manual replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedBatch {
    pub dataset: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub error: String,
    pub photos: Vec<PathBuf>,
}

impl FailedBatch {
    pub fn save(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "{}_{}.yaml",
            self.failed_at.format("%Y%m%dT%H%M%SZ"),
            uuid::Uuid::new_v4()
        ));
        fs::write(
            &path,
            serde_yaml::to_string(self)
                .map_err(|e| io::Error::other(format!("Failed to serialize batch: {}", e)))?,
        )?;
        Ok(path)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(io::Error::other)
    }
}
