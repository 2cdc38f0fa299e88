//! Annotation burn-in: notes, stamps and highlights drawn directly into
//! page content.

use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::content::{
    add_ext_g_state, add_helvetica, add_page_resource, append_page_content, escape_literal,
    FONT_RESOURCE,
};
use crate::document::{resolve_page, DocumentEngine};
use crate::error::EngineError;

/// Default alpha for highlight rectangles.
const HIGHLIGHT_OPACITY: f32 = 0.3;

/// Point on a page, in PDF points from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// What an annotation looks like when burned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Small black text.
    Note,
    /// Larger red text.
    Stamp,
    /// Translucent colored rectangle.
    Highlight,
    /// Accepted on the wire but not burned in; logged and skipped.
    Drawing,
    /// Accepted on the wire but not burned in; logged and skipped.
    Signature,
}

/// Optional per-annotation overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    /// Fill color; kind-specific default when absent.
    pub color: Option<[f32; 3]>,
    /// Fill alpha; 1.0 for text kinds, 0.3 for highlights when absent.
    pub opacity: Option<f32>,
    /// Text size in points; 12 for notes, 16 for stamps when absent.
    pub font_size: Option<f32>,
    /// Counter-clockwise rotation in degrees around the position anchor.
    pub rotation: Option<f32>,
    /// Highlight rectangle width in points.
    pub width: Option<f32>,
    /// Highlight rectangle height in points.
    pub height: Option<f32>,
}

/// One annotation to burn into a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationData {
    /// 1-based page number.
    pub page: u32,
    pub kind: AnnotationKind,
    pub position: Position,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub style: AnnotationStyle,
}

impl DocumentEngine {
    /// Burn a batch of annotations into the document and return the saved
    /// bytes.
    ///
    /// Every page number in the batch is validated before anything is
    /// drawn; an out-of-range page aborts the whole batch. Kinds without
    /// a burn-in representation are skipped with a warning, so a batch of
    /// only skipped kinds leaves the document unchanged.
    pub fn add_annotations(
        &mut self,
        annotations: &[AnnotationData],
    ) -> Result<Vec<u8>, EngineError> {
        let page_ids: Vec<ObjectId> = {
            let loaded = self.loaded()?;
            annotations
                .iter()
                .map(|ann| resolve_page(&loaded.doc, ann.page))
                .collect::<Result<_, _>>()?
        };

        let doc = &mut self.loaded_mut()?.doc;
        // Shared resources are created on first use so that a batch with
        // nothing to draw adds no objects.
        let mut font_id: Option<ObjectId> = None;
        let mut gs_states: Vec<(u32, ObjectId, String)> = Vec::new();

        for (ann, &page_id) in annotations.iter().zip(&page_ids) {
            let Position { x, y } = ann.position;
            match ann.kind {
                AnnotationKind::Note | AnnotationKind::Stamp => {
                    let (default_size, default_color) = match ann.kind {
                        AnnotationKind::Note => (12.0, [0.0, 0.0, 0.0]),
                        _ => (16.0, [1.0, 0.0, 0.0]),
                    };
                    let [r, g, b] = ann.style.color.unwrap_or(default_color);
                    let size = ann.style.font_size.unwrap_or(default_size);
                    let opacity = ann.style.opacity.unwrap_or(1.0);
                    let text = escape_literal(ann.text.as_deref().unwrap_or(""));
                    let font = *font_id.get_or_insert_with(|| add_helvetica(doc));

                    let gs_op = if opacity < 1.0 {
                        let (gs_id, gs_name) = ext_g_state_for(doc, &mut gs_states, opacity);
                        add_page_resource(
                            doc,
                            page_id,
                            b"ExtGState",
                            &gs_name,
                            Object::Reference(gs_id),
                        )?;
                        format!("/{gs_name} gs\n")
                    } else {
                        String::new()
                    };

                    let place = match ann.style.rotation {
                        Some(degrees) if degrees != 0.0 => {
                            let (sin, cos) = degrees.to_radians().sin_cos();
                            format!("{cos} {sin} {neg_sin} {cos} {x} {y} Tm", neg_sin = -sin)
                        }
                        _ => format!("{x} {y} Td"),
                    };

                    let operators = format!(
                        "q\n{gs_op}{r} {g} {b} rg\nBT\n/{FONT_RESOURCE} {size} Tf\n\
                         {place}\n({text}) Tj\nET\nQ\n"
                    );
                    add_page_resource(doc, page_id, b"Font", FONT_RESOURCE, Object::Reference(font))?;
                    append_page_content(doc, page_id, operators.into_bytes())?;
                }
                AnnotationKind::Highlight => {
                    let [r, g, b] = ann.style.color.unwrap_or([1.0, 1.0, 0.0]);
                    let width = ann.style.width.unwrap_or(100.0);
                    let height = ann.style.height.unwrap_or(20.0);
                    let opacity = ann.style.opacity.unwrap_or(HIGHLIGHT_OPACITY);
                    let (gs_id, gs_name) = ext_g_state_for(doc, &mut gs_states, opacity);

                    let rect = match ann.style.rotation {
                        Some(degrees) if degrees != 0.0 => {
                            let (sin, cos) = degrees.to_radians().sin_cos();
                            format!(
                                "{cos} {sin} {neg_sin} {cos} {x} {y} cm\n0 0 {width} {height} re",
                                neg_sin = -sin
                            )
                        }
                        _ => format!("{x} {y} {width} {height} re"),
                    };

                    let operators =
                        format!("q\n/{gs_name} gs\n{r} {g} {b} rg\n{rect}\nf\nQ\n");
                    add_page_resource(
                        doc,
                        page_id,
                        b"ExtGState",
                        &gs_name,
                        Object::Reference(gs_id),
                    )?;
                    append_page_content(doc, page_id, operators.into_bytes())?;
                }
                AnnotationKind::Drawing | AnnotationKind::Signature => {
                    tracing::warn!(kind = ?ann.kind, page = ann.page, "skipping unsupported annotation kind");
                }
            }
        }

        self.save()
    }
}

/// One ExtGState per distinct alpha used in the batch.
fn ext_g_state_for(
    doc: &mut Document,
    cache: &mut Vec<(u32, ObjectId, String)>,
    alpha: f32,
) -> (ObjectId, String) {
    let key = alpha.to_bits();
    if let Some((_, id, name)) = cache.iter().find(|(existing, _, _)| *existing == key) {
        return (*id, name.clone());
    }
    let id = add_ext_g_state(doc, alpha);
    let name = format!("DvGs{}", id.0);
    cache.push((key, id, name.clone()));
    (id, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{create_blank, A4_PAGE_SIZE};
    use lopdf::Document;
    use pretty_assertions::assert_eq;

    fn loaded(pages: u32) -> DocumentEngine {
        let mut engine = DocumentEngine::new();
        engine.load(create_blank(pages, A4_PAGE_SIZE).unwrap()).unwrap();
        engine
    }

    fn annotation(page: u32, kind: AnnotationKind, text: Option<&str>) -> AnnotationData {
        AnnotationData {
            page,
            kind,
            position: Position { x: 100.0, y: 500.0 },
            text: text.map(str::to_string),
            style: AnnotationStyle::default(),
        }
    }

    fn page_content(bytes: &[u8], page: u32) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    /// Alpha of the first ExtGState registered on a page.
    fn first_gs_alpha(bytes: &[u8], page: u32) -> f32 {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        let states = doc
            .get_object(page_id)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"ExtGState")
            .unwrap()
            .as_dict()
            .unwrap();
        let (_, gs_ref) = states.iter().next().unwrap();
        doc.get_object(gs_ref.as_reference().unwrap())
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"ca")
            .unwrap()
            .as_float()
            .unwrap()
    }

    #[test]
    fn note_draws_black_text() {
        let mut engine = loaded(1);
        let bytes = engine
            .add_annotations(&[annotation(1, AnnotationKind::Note, Some("check this"))])
            .unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains("0 0 0 rg"));
        assert!(content.contains("12 Tf"));
        assert!(content.contains("(check this) Tj"));
    }

    #[test]
    fn stamp_draws_red_text() {
        let mut engine = loaded(1);
        let bytes = engine
            .add_annotations(&[annotation(1, AnnotationKind::Stamp, Some("APPROVED"))])
            .unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains("1 0 0 rg"));
        assert!(content.contains("16 Tf"));
        assert!(content.contains("(APPROVED) Tj"));
    }

    #[test]
    fn highlight_draws_yellow_rectangle() {
        let mut engine = loaded(1);
        let bytes = engine
            .add_annotations(&[annotation(1, AnnotationKind::Highlight, None)])
            .unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains("1 1 0 rg"));
        assert!(content.contains("re"));
        assert!(content.contains('f'));
    }

    #[test]
    fn highlight_defaults_to_translucent() {
        let mut engine = loaded(1);
        let bytes = engine
            .add_annotations(&[annotation(1, AnnotationKind::Highlight, None)])
            .unwrap();
        assert_eq!(first_gs_alpha(&bytes, 1), 0.3);
    }

    #[test]
    fn highlight_honors_style_overrides() {
        let mut engine = loaded(1);
        let mut ann = annotation(1, AnnotationKind::Highlight, None);
        ann.style = AnnotationStyle {
            color: Some([0.0, 1.0, 0.0]),
            width: Some(200.0),
            height: Some(40.0),
            ..AnnotationStyle::default()
        };
        let bytes = engine.add_annotations(&[ann]).unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains("0 1 0 rg"));
        assert!(content.contains("200 40 re"));
    }

    #[test]
    fn opacity_override_reaches_the_graphics_state() {
        let mut engine = loaded(1);
        let mut ann = annotation(1, AnnotationKind::Highlight, None);
        ann.style.opacity = Some(0.5);
        let bytes = engine.add_annotations(&[ann]).unwrap();
        assert_eq!(first_gs_alpha(&bytes, 1), 0.5);
    }

    #[test]
    fn translucent_note_gets_a_graphics_state() {
        let mut engine = loaded(1);
        let mut ann = annotation(1, AnnotationKind::Note, Some("faded"));
        ann.style.opacity = Some(0.4);
        let bytes = engine.add_annotations(&[ann]).unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains(" gs"), "got: {content}");
        assert_eq!(first_gs_alpha(&bytes, 1), 0.4);
    }

    #[test]
    fn opaque_note_needs_no_graphics_state() {
        let mut engine = loaded(1);
        let bytes = engine
            .add_annotations(&[annotation(1, AnnotationKind::Note, Some("plain"))])
            .unwrap();

        let content = page_content(&bytes, 1);
        assert!(!content.contains(" gs"), "got: {content}");
    }

    #[test]
    fn font_size_override_changes_text_size() {
        let mut engine = loaded(1);
        let mut ann = annotation(1, AnnotationKind::Note, Some("big note"));
        ann.style.font_size = Some(30.0);
        let bytes = engine.add_annotations(&[ann]).unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains("30 Tf"), "got: {content}");
        assert!(!content.contains("12 Tf"));
    }

    #[test]
    fn rotated_stamp_uses_a_text_matrix() {
        let mut engine = loaded(1);
        let mut ann = annotation(1, AnnotationKind::Stamp, Some("SIDEWAYS"));
        ann.style.rotation = Some(90.0);
        let bytes = engine.add_annotations(&[ann]).unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains("Tm"), "got: {content}");
        assert!(!content.contains("Td"));
    }

    #[test]
    fn rotated_highlight_transforms_the_rectangle() {
        let mut engine = loaded(1);
        let mut ann = annotation(1, AnnotationKind::Highlight, None);
        ann.style.rotation = Some(45.0);
        let bytes = engine.add_annotations(&[ann]).unwrap();

        let content = page_content(&bytes, 1);
        assert!(content.contains("cm"), "got: {content}");
        assert!(content.contains("0 0 100 20 re"));
    }

    #[test]
    fn equal_opacities_share_one_graphics_state() {
        let mut engine = loaded(1);
        let bytes = engine
            .add_annotations(&[
                annotation(1, AnnotationKind::Highlight, None),
                annotation(1, AnnotationKind::Highlight, None),
            ])
            .unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = doc.get_pages()[&1];
        let states = doc
            .get_object(page_id)
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"ExtGState")
            .unwrap()
            .as_dict()
            .unwrap();
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn unsupported_kinds_are_skipped_not_failed() {
        let mut engine = loaded(1);
        let plain = engine.save().unwrap();

        let bytes = engine
            .add_annotations(&[
                annotation(1, AnnotationKind::Drawing, None),
                annotation(1, AnnotationKind::Signature, None),
            ])
            .unwrap();
        // Nothing drawn, nothing registered.
        assert_eq!(bytes, plain);
    }

    #[test]
    fn mixed_batch_draws_supported_and_skips_the_rest() {
        let mut engine = loaded(2);
        let bytes = engine
            .add_annotations(&[
                annotation(1, AnnotationKind::Note, Some("page one")),
                annotation(2, AnnotationKind::Drawing, None),
                annotation(2, AnnotationKind::Stamp, Some("OK")),
            ])
            .unwrap();

        assert!(page_content(&bytes, 1).contains("(page one) Tj"));
        assert!(page_content(&bytes, 2).contains("(OK) Tj"));
    }

    #[test]
    fn out_of_range_page_aborts_the_whole_batch() {
        let mut engine = loaded(1);
        let before = engine.save().unwrap();

        let result = engine.add_annotations(&[
            annotation(1, AnnotationKind::Note, Some("fine")),
            annotation(9, AnnotationKind::Note, Some("bad page")),
        ]);
        assert!(matches!(
            result,
            Err(EngineError::PageNotFound { page: 9, page_count: 1 })
        ));
        // The valid annotation was not applied either.
        assert_eq!(engine.save().unwrap(), before);
    }

    #[test]
    fn annotations_before_load_fail() {
        let mut engine = DocumentEngine::new();
        assert!(matches!(
            engine.add_annotations(&[]),
            Err(EngineError::NotLoaded)
        ));
    }

    #[test]
    fn annotation_kind_serializes_snake_case() {
        let json = serde_json::to_string(&AnnotationKind::Highlight).unwrap();
        assert_eq!(json, "\"highlight\"");
        let parsed: AnnotationKind = serde_json::from_str("\"note\"").unwrap();
        assert_eq!(parsed, AnnotationKind::Note);
    }
}
