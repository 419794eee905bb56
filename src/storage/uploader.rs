use std::sync::Arc;

use crate::photo::PhotoRecord;
use crate::storage::naming::photo_storage_name;
use crate::storage::{ObjectStore, StoreError, UploadError};

/// Uploads original photos under collision-free generated names.
pub struct PhotoUploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    max_attempts: u32,
}

impl PhotoUploader {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String, max_attempts: u32) -> Self {
        Self {
            store,
            bucket,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns the name the photo was stored under.
    pub fn upload(&self, record: &PhotoRecord) -> Result<String, UploadError> {
        for attempt in 0..self.max_attempts {
            let name = photo_storage_name(record, attempt);
            match self.store.upload(&self.bucket, &record.filename, &name) {
                Ok(()) => return Ok(name),
                Err(StoreError::AlreadyExists(_)) => {
                    log::warn!(
                        "Storage name {} taken, retrying upload of {}",
                        name,
                        record.filename.display()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(UploadError::Exhausted {
            path: record.filename.display().to_string(),
            attempts: self.max_attempts,
        })
    }
}
