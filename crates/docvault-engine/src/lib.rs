//! Document engine: single-document PDF manipulation
//!
//! This crate is the document-model half of the docvault PDF engine. It
//! loads one PDF into memory per [`DocumentEngine`] instance and exposes
//! read operations (metadata, page geometry, per-page text) and write
//! operations (merge, split, extract-pages, absolute rotation, watermark
//! and annotation burn-in) on top of lopdf. Page rasterization lives in
//! the `docvault-raster` crate.
//!
//! Engine instances are independent; the intended unit of parallelism is
//! one engine per document. Operations on a single instance take `&mut
//! self` and therefore serialize naturally.

pub mod annotations;
mod content;
pub mod document;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod split;
pub mod text;
pub mod watermark;

pub use annotations::{AnnotationData, AnnotationKind, AnnotationStyle, Position};
pub use document::{create_blank, DocumentEngine, PageInfo, A4_PAGE_SIZE};
pub use error::EngineError;
pub use merge::merge_documents;
pub use metadata::DocumentInfo;
pub use watermark::WatermarkOptions;
