use thiserror::Error;

/// Failure taxonomy for page rendering.
///
/// Render failures are localized to the requested page: one bad page
/// never poisons the renderer or the document handle.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The pdfium native library could not be located or bound.
    #[error("failed to initialize rendering backend: {0}")]
    Init(String),

    /// The byte stream could not be opened for rendering.
    #[error("failed to load PDF for rendering: {0}")]
    Load(String),

    /// A 1-based page number fell outside `[1, page_count]`.
    #[error("page {page} out of range (document has {page_count} pages)")]
    PageNotFound { page: u32, page_count: u32 },

    /// Rasterization of one page failed.
    #[error("failed to render page {page}: {message}")]
    Render { page: u32, message: String },

    /// The rendered bitmap could not be encoded to the requested format.
    #[error("failed to encode image: {0}")]
    Encode(String),
}
