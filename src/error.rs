use thiserror::Error;

/// Errors produced while probing, parsing, or extracting a remote archive.
///
/// Global errors abort the whole request; per-member errors only skip the
/// member they belong to (see `ArchiveError::is_member_scoped`).
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("upstream request failed with status {0}")]
    UpstreamStatus(u16),

    #[error("Content-Length not provided or zero")]
    MissingContentLength,

    #[error("EOCD signature not found in trailing {0} bytes")]
    EocdNotFound(u64),

    #[error("incomplete EOCD record")]
    EocdTruncated,

    #[error("central directory size mismatch (expected {expected}, got {actual})")]
    CdSizeMismatch { expected: u64, actual: u64 },

    #[error("central directory corrupt: {0}")]
    CdCorrupt(String),

    #[error("invalid local file header at offset {0}")]
    LocalHeaderCorrupt(u64),

    #[error("stored member size mismatch (expected {expected}, got {actual})")]
    PayloadSizeMismatch { expected: u64, actual: u64 },

    #[error("deflate output size mismatch (expected {expected}, got {actual})")]
    DecompressMismatch { expected: u64, actual: u64 },

    #[error("unsupported archive feature: {0}")]
    Unsupported(&'static str),

    #[error("range out of bounds: {offset}+{length} > {size}")]
    RangeOutOfBounds { offset: u64, length: u64, size: u64 },

    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Whether this error only affects a single member of an extraction job.
    /// Member-scoped failures are logged and skipped; everything else aborts
    /// the request.
    pub fn is_member_scoped(&self) -> bool {
        matches!(
            self,
            ArchiveError::LocalHeaderCorrupt(_)
                | ArchiveError::PayloadSizeMismatch { .. }
                | ArchiveError::DecompressMismatch { .. }
        )
    }
}
