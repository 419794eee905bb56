use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid object name: {0}")]
    InvalidName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no free storage name for {path} after {attempts} attempts")]
    Exhausted { path: String, attempts: u32 },
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
