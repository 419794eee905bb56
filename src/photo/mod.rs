mod error;
mod jxl;
mod metadata;
mod types;

use std::path::Path;

pub use error::PhotoError;
pub use metadata::read_metadata;
pub use types::{epoch_to_datetime, GroundVelocity, PhotoMetadata, PhotoRecord};

/// Turns an image file into a [`PhotoRecord`].
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<PhotoRecord, PhotoError>;
}

/// Reads position, time and velocity from the embedded EXIF block.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

impl Extractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Result<PhotoRecord, PhotoError> {
        let metadata = read_metadata(path)?;
        PhotoRecord::from_metadata(path, &metadata)
    }
}
