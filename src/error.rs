use thiserror::Error;

use crate::extractor::ExtractError;

/// Everything that can stop a download request. Each variant is user-facing.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Link is invalid")]
    InvalidUrl,
    #[error("\"{title}\" is longer than the {limit_minutes} minute limit")]
    TooLong { title: String, limit_minutes: u64 },
    #[error("Failed to download: {0}")]
    Extraction(String),
}

impl From<ExtractError> for DownloadError {
    fn from(err: ExtractError) -> Self {
        DownloadError::Extraction(err.to_string())
    }
}
