use thiserror::Error;

/// Failure taxonomy for the download pipeline. `Cancelled` is a clean stop,
/// not a fault; the cancelling actor already produced the user-facing notice.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The engine could not resolve the URL into a downloadable resource.
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// The transfer started and then failed.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The session was deactivated while the job was in flight.
    #[error("download cancelled")]
    Cancelled,

    /// Anything outside the expected failure modes. Logged in full,
    /// surfaced to the chat generically.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl DownloadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}
