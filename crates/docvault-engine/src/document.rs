//! The engine itself: one loaded document per instance.

use lopdf::{dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::{op_err, EngineError};
use crate::metadata::{read_document_info, DocumentInfo};

/// Default page size for blank documents: A4 in PDF points.
pub const A4_PAGE_SIZE: (f32, f32) = (595.28, 841.89);

/// Geometry of a single page. Recomputed on demand from the loaded
/// document, never cached across mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number.
    pub page_number: u32,
    /// Width in PDF points.
    pub width: f32,
    /// Height in PDF points.
    pub height: f32,
    /// Absolute page rotation in degrees.
    pub rotation: i32,
}

pub(crate) struct LoadedDocument {
    pub(crate) doc: Document,
    /// Raw buffer captured at load time; text extraction reads this.
    pub(crate) bytes: Vec<u8>,
}

/// Narrow façade over one in-memory PDF document.
///
/// The engine is a single-document resource holder (unloaded → loaded →
/// disposed), not a pool. `&mut self` on every mutating operation
/// serializes calls on one instance at compile time; separate instances
/// are fully independent and may run concurrently.
///
/// Dropping the engine releases the document and buffer, so scoped use
/// cleans up on every code path; [`dispose`](DocumentEngine::dispose)
/// releases them early.
///
/// The engine never retries and enforces no quotas. Callers own
/// user-facing messaging and compensating cleanup of external resources
/// (for example, removing an uploaded blob when metadata persistence
/// fails afterwards).
#[derive(Default)]
pub struct DocumentEngine {
    inner: Option<LoadedDocument>,
}

impl DocumentEngine {
    pub fn new() -> Self {
        Self { inner: None }
    }

    /// Load a PDF from raw bytes and return its metadata summary.
    ///
    /// A document already held by this instance is disposed first, then
    /// the new one is loaded; reloading never silently drops the prior
    /// buffer.
    pub fn load(&mut self, bytes: impl Into<Vec<u8>>) -> Result<DocumentInfo, EngineError> {
        if self.inner.is_some() {
            tracing::debug!("disposing previously loaded document before reload");
            self.dispose();
        }

        let bytes = bytes.into();
        let doc = Document::load_mem(&bytes).map_err(|e| EngineError::Load(e.to_string()))?;
        let info = read_document_info(&doc, bytes.len());
        self.inner = Some(LoadedDocument { doc, bytes });
        Ok(info)
    }

    /// Whether a document is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.inner.is_some()
    }

    pub(crate) fn loaded(&self) -> Result<&LoadedDocument, EngineError> {
        self.inner.as_ref().ok_or(EngineError::NotLoaded)
    }

    pub(crate) fn loaded_mut(&mut self) -> Result<&mut LoadedDocument, EngineError> {
        self.inner.as_mut().ok_or(EngineError::NotLoaded)
    }

    /// Number of pages in the loaded document.
    pub fn page_count(&self) -> Result<u32, EngineError> {
        Ok(self.loaded()?.doc.get_pages().len() as u32)
    }

    /// The byte buffer captured at load time.
    ///
    /// This is what `docvault-raster` renders from. It does not reflect
    /// mutations made since the load; call [`save`](DocumentEngine::save)
    /// for the current state.
    pub fn bytes(&self) -> Result<&[u8], EngineError> {
        Ok(&self.loaded()?.bytes)
    }

    /// Geometry and rotation of one page (1-based).
    pub fn page_info(&self, page_number: u32) -> Result<PageInfo, EngineError> {
        let loaded = self.loaded()?;
        let page_id = resolve_page(&loaded.doc, page_number)?;
        let (width, height) = page_size(&loaded.doc, page_id).ok_or_else(|| {
            EngineError::Operation(format!("page {page_number} has no MediaBox"))
        })?;
        Ok(PageInfo {
            page_number,
            width,
            height,
            rotation: page_rotation(&loaded.doc, page_id),
        })
    }

    /// Set the absolute rotation of each listed page (1-based).
    ///
    /// Rotation is absolute, not additive: rotating a page to 90 twice
    /// leaves it at 90. `degrees` must be a multiple of 90 and is
    /// normalized into `[0, 360)`.
    ///
    /// Returns the serialized document, like [`save`](DocumentEngine::save).
    pub fn rotate_pages(
        &mut self,
        page_numbers: &[u32],
        degrees: i32,
    ) -> Result<Vec<u8>, EngineError> {
        if degrees % 90 != 0 {
            return Err(EngineError::Operation(format!(
                "rotation must be a multiple of 90, got {degrees}"
            )));
        }
        let normalized = degrees.rem_euclid(360);

        // Validate every page before mutating anything.
        let page_ids = {
            let loaded = self.loaded()?;
            page_numbers
                .iter()
                .map(|&n| resolve_page(&loaded.doc, n))
                .collect::<Result<Vec<_>, _>>()?
        };

        let loaded = self.loaded_mut()?;
        for page_id in page_ids {
            let dict = loaded
                .doc
                .get_object_mut(page_id)
                .map_err(op_err)?
                .as_dict_mut()
                .map_err(op_err)?;
            dict.set("Rotate", Object::Integer(normalized as i64));
        }
        self.save()
    }

    /// Serialize the current in-memory state, including all mutations made
    /// since the load.
    ///
    /// Idempotent: repeated calls without an intervening mutation produce
    /// equivalent bytes.
    pub fn save(&mut self) -> Result<Vec<u8>, EngineError> {
        let loaded = self.loaded_mut()?;
        let mut buffer = Vec::new();
        loaded
            .doc
            .save_to(&mut buffer)
            .map_err(|e| EngineError::Operation(format!("save failed: {e}")))?;
        Ok(buffer)
    }

    /// Release the loaded document and its byte buffer.
    ///
    /// Subsequent operations fail with [`EngineError::NotLoaded`] until
    /// the next load. Dropping the engine has the same effect.
    pub fn dispose(&mut self) {
        self.inner = None;
    }
}

/// Map a 1-based page number to its object id.
pub(crate) fn resolve_page(doc: &Document, page_number: u32) -> Result<ObjectId, EngineError> {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    pages
        .get(&page_number)
        .copied()
        .ok_or(EngineError::PageNotFound {
            page: page_number,
            page_count,
        })
}

/// Look up an inheritable page attribute (MediaBox, Rotate, Resources),
/// walking Parent links up the page tree. Resolves one level of
/// indirection on the found value.
pub(crate) fn inherited_attr<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_id;
    // Bounded walk; a cyclic Parent chain in a malformed file must not hang us.
    for _ in 0..64 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(obj) = dict.get(key) {
            return match obj {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

/// Width and height of a page from its (possibly inherited) MediaBox.
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let media_box = inherited_attr(doc, page_id, b"MediaBox")?.as_array().ok()?;
    let coords: Vec<f32> = media_box.iter().filter_map(number).collect();
    if coords.len() != 4 {
        return None;
    }
    Some(((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs()))
}

pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> i32 {
    inherited_attr(doc, page_id, b"Rotate")
        .and_then(|obj| match obj {
            Object::Integer(v) => Some(*v as i32),
            _ => None,
        })
        .unwrap_or(0)
}

/// Create a new document with `page_count` blank pages of `page_size`
/// (width, height in PDF points; [`A4_PAGE_SIZE`] is the usual default).
pub fn create_blank(page_count: u32, page_size: (f32, f32)) -> Result<Vec<u8>, EngineError> {
    let (width, height) = page_size;
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..page_count)
        .map(|_| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(width),
                    Object::Real(height),
                ],
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| EngineError::Operation(format!("save failed: {e}")))?;
    Ok(buffer)
}
