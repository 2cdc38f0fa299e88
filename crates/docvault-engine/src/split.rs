//! Splitting a document apart and pulling page subsets out of it.
//!
//! Both operations read the loaded document without mutating it. A page
//! subset is built by whitelist: clone the document, delete everything
//! outside the whitelist, prune the orphans.

use lopdf::Document;

use crate::document::{resolve_page, DocumentEngine};
use crate::error::EngineError;
use crate::merge::merge_documents;

impl DocumentEngine {
    /// Break the loaded document into one single-page document per page,
    /// in page order.
    pub fn split(&self) -> Result<Vec<Vec<u8>>, EngineError> {
        let loaded = self.loaded()?;
        let page_count = loaded.doc.get_pages().len() as u32;
        tracing::debug!(page_count, "splitting document");
        (1..=page_count)
            .map(|page| single_page_document(&loaded.doc, page))
            .collect()
    }

    /// Build a new document from the listed pages (1-based), in exactly
    /// the order given. Repeating a page number duplicates that page.
    ///
    /// The loaded document is left untouched.
    pub fn extract_pages(&self, page_numbers: &[u32]) -> Result<Vec<u8>, EngineError> {
        if page_numbers.is_empty() {
            return Err(EngineError::Operation("no pages requested".into()));
        }

        let loaded = self.loaded()?;
        // Validate the whole request before building anything.
        for &page in page_numbers {
            resolve_page(&loaded.doc, page)?;
        }

        let parts: Vec<Vec<u8>> = page_numbers
            .iter()
            .map(|&page| single_page_document(&loaded.doc, page))
            .collect::<Result<_, _>>()?;
        merge_documents(&parts)
    }
}

/// Serialize a copy of `doc` reduced to a single page.
fn single_page_document(doc: &Document, page_number: u32) -> Result<Vec<u8>, EngineError> {
    resolve_page(doc, page_number)?;

    let mut copy = doc.clone();
    let page_count = doc.get_pages().len() as u32;

    // Delete in reverse so earlier page numbers stay valid.
    for page in (1..=page_count).rev() {
        if page != page_number {
            copy.delete_pages(&[page]);
        }
    }

    copy.prune_objects();
    copy.compress();

    let mut buffer = Vec::new();
    copy.save_to(&mut buffer)
        .map_err(|e| EngineError::Operation(format!("failed to save page {page_number}: {e}")))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{create_blank, A4_PAGE_SIZE};
    use pretty_assertions::assert_eq;

    fn loaded(pages: u32) -> DocumentEngine {
        let mut engine = DocumentEngine::new();
        engine.load(create_blank(pages, A4_PAGE_SIZE).unwrap()).unwrap();
        engine
    }

    fn page_count_of(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn split_produces_one_document_per_page() {
        let engine = loaded(4);
        let parts = engine.split().unwrap();
        assert_eq!(parts.len(), 4);
        for part in &parts {
            assert_eq!(page_count_of(part), 1);
        }
    }

    #[test]
    fn split_leaves_the_loaded_document_intact() {
        let engine = loaded(3);
        engine.split().unwrap();
        assert_eq!(engine.page_count().unwrap(), 3);
    }

    #[test]
    fn split_of_single_page_document() {
        let engine = loaded(1);
        let parts = engine.split().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(page_count_of(&parts[0]), 1);
    }

    #[test]
    fn extract_honors_caller_order_and_duplicates() {
        let engine = loaded(5);
        let bytes = engine.extract_pages(&[3, 1, 3]).unwrap();
        assert_eq!(page_count_of(&bytes), 3);
    }

    #[test]
    fn extract_rejects_out_of_range_pages() {
        let engine = loaded(2);
        assert!(matches!(
            engine.extract_pages(&[1, 3]),
            Err(EngineError::PageNotFound { page: 3, page_count: 2 })
        ));
    }

    #[test]
    fn extract_rejects_page_zero() {
        let engine = loaded(2);
        assert!(matches!(
            engine.extract_pages(&[0]),
            Err(EngineError::PageNotFound { page: 0, .. })
        ));
    }

    #[test]
    fn extract_rejects_empty_request() {
        let engine = loaded(2);
        assert!(matches!(
            engine.extract_pages(&[]),
            Err(EngineError::Operation(_))
        ));
    }

    #[test]
    fn extract_single_page_matches_split_part() {
        let engine = loaded(3);
        let extracted = engine.extract_pages(&[2]).unwrap();
        assert_eq!(page_count_of(&extracted), 1);
    }

    #[test]
    fn operations_fail_before_load() {
        let engine = DocumentEngine::new();
        assert!(matches!(engine.split(), Err(EngineError::NotLoaded)));
        assert!(matches!(
            engine.extract_pages(&[1]),
            Err(EngineError::NotLoaded)
        ));
    }
}
