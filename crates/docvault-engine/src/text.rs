//! Text extraction.
//!
//! Extraction runs over the byte buffer captured at load time, so it
//! reflects the document as loaded, not burn-ins applied since. The
//! extractor separates pages with a form feed; the chunk list is
//! reconciled against the structural page count before indexing.

use std::cmp::Ordering;

use crate::document::{resolve_page, DocumentEngine};
use crate::error::EngineError;

impl DocumentEngine {
    /// Text of one page (1-based), trimmed.
    pub fn extract_text_from_page(&self, page_number: u32) -> Result<String, EngineError> {
        let loaded = self.loaded()?;
        resolve_page(&loaded.doc, page_number)?;

        let pages = extract_pages_text(&loaded.bytes, loaded.doc.get_pages().len())?;
        Ok(pages
            .into_iter()
            .nth(page_number as usize - 1)
            .unwrap_or_default())
    }

    /// Text of every page, in page order. Pages without extractable text
    /// yield empty strings.
    pub fn extract_all_text(&self) -> Result<Vec<String>, EngineError> {
        let loaded = self.loaded()?;
        extract_pages_text(&loaded.bytes, loaded.doc.get_pages().len())
    }
}

fn extract_pages_text(bytes: &[u8], page_count: usize) -> Result<Vec<String>, EngineError> {
    let raw = pdf_extract::extract_text_from_mem(bytes).map_err(classify_extract_error)?;
    Ok(split_pages(&raw, page_count))
}

/// Extraction failures on encrypted input are load problems from the
/// caller's point of view; everything else is an operation failure.
fn classify_extract_error(err: pdf_extract::OutputError) -> EngineError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("encrypt") || lowered.contains("password") {
        EngineError::Load(message)
    } else {
        EngineError::Operation(format!("text extraction failed: {message}"))
    }
}

/// Reconcile form-feed-separated chunks with the structural page count:
/// missing pages become empty strings, surplus chunks fold into the last
/// page.
fn split_pages(raw: &str, page_count: usize) -> Vec<String> {
    if page_count == 0 {
        return Vec::new();
    }
    let mut chunks: Vec<String> = raw
        .split('\u{0C}')
        .map(|chunk| chunk.trim().to_string())
        .collect();

    // A trailing form feed produces one empty chunk past the end.
    if chunks.len() == page_count + 1 && chunks.last().is_some_and(String::is_empty) {
        chunks.pop();
    }

    match chunks.len().cmp(&page_count) {
        Ordering::Less => chunks.resize(page_count, String::new()),
        Ordering::Greater => {
            let tail = chunks.split_off(page_count - 1);
            let folded = tail
                .into_iter()
                .filter(|chunk| !chunk.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            chunks.push(folded);
        }
        Ordering::Equal => {}
    }
    chunks
}
