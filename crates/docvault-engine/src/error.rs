use thiserror::Error;

/// Failure taxonomy for the document engine.
///
/// Every failure is permanent for the given inputs; the engine never
/// retries internally. Callers surrounding the engine own user-facing
/// messaging and any compensating cleanup of external resources.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The byte stream was not a well-formed PDF document (corrupt header,
    /// unsupported encryption, truncated stream).
    #[error("failed to load PDF: {0}")]
    Load(String),

    /// An operation was invoked before a successful load.
    #[error("no document loaded")]
    NotLoaded,

    /// A 1-based page number fell outside `[1, page_count]`.
    #[error("page {page} out of range (document has {page_count} pages)")]
    PageNotFound { page: u32, page_count: u32 },

    /// A source document in a merge failed to decode. The whole merge
    /// aborts; there is no partial output.
    #[error("merge failed: {0}")]
    Merge(String),

    /// Document surgery or serialization failed.
    #[error("PDF operation failed: {0}")]
    Operation(String),
}

pub(crate) fn op_err<E: std::fmt::Display>(e: E) -> EngineError {
    EngineError::Operation(e.to_string())
}
