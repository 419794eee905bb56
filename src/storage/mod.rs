mod error;
mod local;
pub mod naming;
mod uploader;

use std::path::Path;

pub use error::{StoreError, UploadError};
pub use local::LocalStore;
pub use uploader::PhotoUploader;

/// Object storage seen through the two calls the pipeline needs.
pub trait ObjectStore: Send + Sync {
    /// Stores `local_path` as `name`, failing with
    /// [`StoreError::AlreadyExists`] if the name is taken. Existence check
    /// and write must be one atomic step in the backend.
    fn upload(&self, bucket: &str, local_path: &Path, name: &str) -> Result<(), StoreError>;

    fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError>;
}
