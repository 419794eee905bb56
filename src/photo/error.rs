use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("incomplete metadata: missing {field}")]
    IncompleteMetadata { field: &'static str },
    #[error("invalid capture time '{0}'")]
    InvalidTimestamp(String),
    #[error("exif error: {0}")]
    Exif(#[from] exif::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PhotoError {
    pub fn missing(field: &'static str) -> Self {
        PhotoError::IncompleteMetadata { field }
    }
}
