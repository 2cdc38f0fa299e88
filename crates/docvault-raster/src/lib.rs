//! Page rasterization for the docvault PDF engine.
//!
//! Rendering goes through pdfium, which must be present as a native
//! library at runtime. This concern is kept out of `docvault-engine` so
//! document surgery works without the native dependency installed.

mod error;
mod renderer;

pub use error::RenderError;
pub use renderer::{encode_data_uri, ImageFormat, PageRenderer, RenderOptions};
