mod archive;
mod recovery;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::executor::{ExecutorError, JobRunner};
use crate::photo::PhotoRecord;
use crate::storage::{naming::dataset_name, ObjectStore, StoreError};

pub use archive::{sidecar_path, write_archive};
pub use recovery::FailedBatch;

pub const CONSUMED_SUFFIX: &str = ".mosaiced";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("empty batch")]
    EmptyBatch,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload failed: {0}")]
    Upload(#[from] StoreError),
    #[error("job trigger failed: {0}")]
    Job(#[from] ExecutorError),
}

/// Bundles closed orbits into datasets, uploads them and starts the
/// mosaicking job.
pub struct DatasetDispatcher {
    store: Arc<dyn ObjectStore>,
    jobs: Arc<dyn JobRunner>,
    bucket: String,
    job_name: String,
    work_dir: PathBuf,
    sidecar_suffix: String,
}

impl DatasetDispatcher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        jobs: Arc<dyn JobRunner>,
        bucket: String,
        job_name: String,
        work_dir: PathBuf,
        sidecar_suffix: String,
    ) -> Self {
        Self {
            store,
            jobs,
            bucket,
            job_name,
            work_dir,
            sidecar_suffix,
        }
    }

    /// Returns the storage name of the uploaded dataset.
    pub fn dispatch(&self, batch: &[PhotoRecord]) -> Result<String, DatasetError> {
        let name = dataset_name(batch).ok_or(DatasetError::EmptyBatch)?;
        log::info!("Assembling dataset {} from {} photos", name, batch.len());

        for photo in batch {
            mark_consumed(photo);
        }

        fs::create_dir_all(&self.work_dir)?;
        let archive_path = self
            .work_dir
            .join(format!("dataset_{}.tar", uuid::Uuid::new_v4().simple()));

        let uploaded = write_archive(batch, &self.sidecar_suffix, &archive_path)
            .map_err(DatasetError::from)
            .and_then(|summary| {
                log::info!(
                    "Saved dataset to {} ({} images, {} feature files)",
                    archive_path.display(),
                    summary.images,
                    summary.features
                );
                self.store
                    .upload(&self.bucket, &archive_path, &name)
                    .map_err(DatasetError::from)
            });
        if let Err(e) = fs::remove_file(&archive_path) {
            log::warn!("Failed to remove {}: {}", archive_path.display(), e);
        }
        uploaded?;

        self.start_job(&name)?;
        Ok(name)
    }

    /// Dispatches the batch; on failure logs it and writes a recovery
    /// manifest. The photos are not returned to any window.
    pub fn dispatch_or_record(&self, batch: Vec<PhotoRecord>) -> bool {
        match self.dispatch(&batch) {
            Ok(name) => {
                log::info!("Dataset {} dispatched", name);
                true
            }
            Err(e) => {
                log::error!("Dropping batch of {} photos: {}", batch.len(), e);
                let failed = FailedBatch {
                    dataset: dataset_name(&batch),
                    failed_at: Utc::now(),
                    error: e.to_string(),
                    photos: batch.into_iter().map(|p| p.filename).collect(),
                };
                match failed.save(&self.work_dir.join("failed")) {
                    Ok(path) => log::warn!("Recovery manifest written to {}", path.display()),
                    Err(e) => log::error!("Failed to write recovery manifest: {}", e),
                }
                false
            }
        }
    }

    /// Dispatches a batch again. When its archive is already in storage,
    /// only the mosaicking job is started.
    pub fn redispatch(&self, batch: &[PhotoRecord]) -> Result<String, DatasetError> {
        let name = dataset_name(batch).ok_or(DatasetError::EmptyBatch)?;
        match self.store.download(&self.bucket, &name) {
            Ok(_) => {
                log::info!("Dataset {} already uploaded, starting job only", name);
                self.start_job(&name)?;
                Ok(name)
            }
            Err(StoreError::NotFound(_)) => self.dispatch(batch),
            Err(e) => Err(e.into()),
        }
    }

    fn start_job(&self, dataset: &str) -> Result<(), ExecutorError> {
        let vars = BTreeMap::from([
            ("BUCKET".to_string(), self.bucket.clone()),
            ("DATASET".to_string(), dataset.to_string()),
        ]);
        self.jobs.run_job(&self.job_name, &vars)
    }
}

fn mark_consumed(photo: &PhotoRecord) {
    let marker = sidecar_path(&photo.filename, CONSUMED_SUFFIX);
    if let Err(e) = fs::File::create(&marker) {
        log::warn!("Failed to mark {} as consumed: {}", photo.filename.display(), e);
    }
}
