//! Low-level page surgery shared by the watermark and annotation passes:
//! appending content streams and registering page resources.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::document::inherited_attr;
use crate::error::{op_err, EngineError};

/// Resource name under which the burned-in text font is registered.
pub(crate) const FONT_RESOURCE: &str = "DvHelv";

/// Append a new content stream after the page's existing content.
///
/// Operators in the appended stream therefore draw on top of the page.
pub(crate) fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    operators: Vec<u8>,
) -> Result<(), EngineError> {
    let stream_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, operators)));

    let existing = doc
        .get_object(page_id)
        .map_err(op_err)?
        .as_dict()
        .map_err(op_err)?
        .get(b"Contents")
        .ok()
        .cloned();

    let new_contents = match existing {
        None => Object::Reference(stream_id),
        Some(Object::Array(mut items)) => {
            items.push(Object::Reference(stream_id));
            Object::Array(items)
        }
        Some(Object::Reference(id)) => match doc.get_object(id).map_err(op_err)? {
            // Contents may reference an array of streams rather than a
            // single stream; extend the array instead of nesting it.
            Object::Array(items) => {
                let mut items = items.clone();
                items.push(Object::Reference(stream_id));
                Object::Array(items)
            }
            _ => Object::Array(vec![Object::Reference(id), Object::Reference(stream_id)]),
        },
        Some(other) => Object::Array(vec![other, Object::Reference(stream_id)]),
    };

    page_dict_mut(doc, page_id)?.set("Contents", new_contents);
    Ok(())
}

/// Register `value` under `/Resources/<category>/<name>` on one page.
///
/// Inherited resources are copied down onto the page first, so a shared
/// parent dictionary is never mutated. Both the Resources entry and the
/// category entry may be indirect references; both shapes are handled.
pub(crate) fn add_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    name: &str,
    value: Object,
) -> Result<(), EngineError> {
    let slot = resources_slot(doc, page_id)?;

    match resources_get(doc, page_id, slot, category)? {
        Some(Object::Reference(category_id)) => {
            doc.get_object_mut(category_id)
                .map_err(op_err)?
                .as_dict_mut()
                .map_err(op_err)?
                .set(name, value);
        }
        Some(Object::Dictionary(mut dict)) => {
            dict.set(name, value);
            resources_set(doc, page_id, slot, category, Object::Dictionary(dict))?;
        }
        _ => {
            let mut dict = Dictionary::new();
            dict.set(name, value);
            resources_set(doc, page_id, slot, category, Object::Dictionary(dict))?;
        }
    }
    Ok(())
}

/// Where a page's own Resources dictionary lives.
#[derive(Clone, Copy)]
enum Slot {
    /// Inline dictionary inside the page dictionary.
    Inline,
    /// Indirect object referenced from the page dictionary.
    Referenced(ObjectId),
}

/// Ensure the page has its own Resources entry and report its shape.
fn resources_slot(doc: &mut Document, page_id: ObjectId) -> Result<Slot, EngineError> {
    let own = doc
        .get_object(page_id)
        .map_err(op_err)?
        .as_dict()
        .map_err(op_err)?
        .get(b"Resources")
        .ok()
        .cloned();

    match own {
        Some(Object::Reference(id)) => Ok(Slot::Referenced(id)),
        Some(Object::Dictionary(_)) => Ok(Slot::Inline),
        _ => {
            let inherited = inherited_attr(doc, page_id, b"Resources")
                .and_then(|obj| obj.as_dict().ok())
                .cloned()
                .unwrap_or_default();
            page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(inherited));
            Ok(Slot::Inline)
        }
    }
}

fn resources_get(
    doc: &Document,
    page_id: ObjectId,
    slot: Slot,
    category: &[u8],
) -> Result<Option<Object>, EngineError> {
    let dict = match slot {
        Slot::Inline => doc
            .get_object(page_id)
            .map_err(op_err)?
            .as_dict()
            .map_err(op_err)?
            .get(b"Resources")
            .map_err(op_err)?
            .as_dict()
            .map_err(op_err)?,
        Slot::Referenced(id) => doc
            .get_object(id)
            .map_err(op_err)?
            .as_dict()
            .map_err(op_err)?,
    };
    Ok(dict.get(category).ok().cloned())
}

fn resources_set(
    doc: &mut Document,
    page_id: ObjectId,
    slot: Slot,
    category: &[u8],
    value: Object,
) -> Result<(), EngineError> {
    let dict = match slot {
        Slot::Inline => page_dict_mut(doc, page_id)?
            .get_mut(b"Resources")
            .map_err(op_err)?
            .as_dict_mut()
            .map_err(op_err)?,
        Slot::Referenced(id) => doc
            .get_object_mut(id)
            .map_err(op_err)?
            .as_dict_mut()
            .map_err(op_err)?,
    };
    dict.set(category, value);
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, EngineError> {
    doc.get_object_mut(page_id)
        .map_err(op_err)?
        .as_dict_mut()
        .map_err(op_err)
}

/// A standard-14 Helvetica font object, ready to register as a resource.
pub(crate) fn add_helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

/// An ExtGState carrying stroke and fill alpha.
pub(crate) fn add_ext_g_state(doc: &mut Document, alpha: f32) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(alpha),
        "CA" => Object::Real(alpha),
    })
}

/// Escape text for inclusion in a literal PDF string.
pub(crate) fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}
