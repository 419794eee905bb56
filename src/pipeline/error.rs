use thiserror::Error;

use crate::photo::PhotoError;
use crate::storage::UploadError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is shut down")]
    Closed,
}

/// Why a single photo never reached the window.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Photo(#[from] PhotoError),
    #[error("{0}")]
    Upload(#[from] UploadError),
}
