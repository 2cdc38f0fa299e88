//! Combining multiple documents into one.
//!
//! Merging is a whole-object import: every object of every source is
//! copied into the destination with its id shifted past the destination's
//! current maximum, then the destination page tree is rebuilt over the
//! combined page list. Because parent links are copied along with the
//! pages, inherited page attributes keep resolving after the import.

use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId};

use crate::error::EngineError;

/// Merge documents in input order into a single PDF.
///
/// Sources are deep-copied; the input buffers are never mutated. Any
/// source that fails to decode aborts the whole merge with
/// [`EngineError::Merge`] naming its position; there is no partial
/// output.
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>, EngineError> {
    if documents.is_empty() {
        return Err(EngineError::Merge("no documents to merge".into()));
    }

    // Decode every source up front so a bad document at any position
    // aborts before anything is combined.
    let mut sources = Vec::with_capacity(documents.len());
    for (index, bytes) in documents.iter().enumerate() {
        let doc = Document::load_mem(bytes)
            .map_err(|e| EngineError::Merge(format!("document {index} failed to load: {e}")))?;
        sources.push(doc);
    }
    tracing::debug!(count = sources.len(), "merging documents");

    if sources.len() == 1 {
        return Ok(documents[0].clone());
    }

    let mut dest = sources.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut page_refs: Vec<ObjectId> = dest.get_pages().values().copied().collect();

    for source in sources {
        let source_pages: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let id_offset = dest_max_id;

        let mut remapped = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            remapped.insert(
                (old_id.0 + id_offset, old_id.1),
                shift_references(object, id_offset),
            );
        }
        dest.objects.extend(remapped);

        for page_id in source_pages {
            page_refs.push((page_id.0 + id_offset, page_id.1));
        }
        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    rebuild_page_tree(&mut dest, page_refs)?;
    dest.max_id = dest_max_id;
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| EngineError::Merge(format!("failed to save merged PDF: {e}")))?;
    Ok(buffer)
}

/// Recursively shift every object reference by `offset`.
pub(crate) fn shift_references(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| shift_references(item, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = shift_references(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = shift_references(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the catalog's page tree at the combined page list.
fn rebuild_page_tree(doc: &mut Document, page_refs: Vec<ObjectId>) -> Result<(), EngineError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .map_err(|_| EngineError::Merge("no Root in trailer".into()))?
        .as_reference()
        .map_err(|_| EngineError::Merge("Root is not a reference".into()))?;

    let pages_id = doc
        .objects
        .get(&catalog_id)
        .ok_or_else(|| EngineError::Merge("catalog not found".into()))?
        .as_dict()
        .map_err(|_| EngineError::Merge("catalog is not a dictionary".into()))?
        .get(b"Pages")
        .map_err(|_| EngineError::Merge("no Pages in catalog".into()))?
        .as_reference()
        .map_err(|_| EngineError::Merge("Pages is not a reference".into()))?;

    let Some(Object::Dictionary(pages_dict)) = doc.objects.get_mut(&pages_id) else {
        return Err(EngineError::Merge("invalid pages dictionary".into()));
    };

    let count = page_refs.len() as i64;
    let kids: Vec<Object> = page_refs.into_iter().map(Object::Reference).collect();
    pages_dict.set("Kids", kids);
    pages_dict.set("Count", count);

    // Imported pages keep their original Parent links, so attributes
    // inherited through the source page tree still resolve.

    Ok(())
}
