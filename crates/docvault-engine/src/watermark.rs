//! Watermark burn-in.
//!
//! The watermark is drawn as ordinary page content (not an annotation),
//! so it survives viewers that ignore annotations and flattening tools.

use lopdf::Object;
use serde::{Deserialize, Serialize};

use crate::content::{
    add_ext_g_state, add_helvetica, add_page_resource, append_page_content, escape_literal,
    FONT_RESOURCE,
};
use crate::document::{page_size, DocumentEngine};
use crate::error::EngineError;

/// Appearance of a burned-in watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkOptions {
    /// Fill alpha of the watermark text.
    pub opacity: f32,
    /// Font size in points.
    pub font_size: f32,
    /// RGB fill color, each component in `[0, 1]`.
    pub color: [f32; 3],
    /// Counter-clockwise rotation in degrees.
    pub rotation: f32,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            opacity: 0.3,
            font_size: 50.0,
            color: [0.7, 0.7, 0.7],
            rotation: 45.0,
        }
    }
}

impl DocumentEngine {
    /// Draw `text` diagonally across every page and return the saved
    /// document.
    ///
    /// Each call appends its own drawing pass; watermarking twice stacks
    /// two layers of text.
    pub fn add_watermark(
        &mut self,
        text: &str,
        options: &WatermarkOptions,
    ) -> Result<Vec<u8>, EngineError> {
        let page_ids: Vec<_> = {
            let loaded = self.loaded()?;
            loaded.doc.get_pages().into_values().collect()
        };
        tracing::debug!(pages = page_ids.len(), text, "applying watermark");

        let doc = &mut self.loaded_mut()?.doc;
        let font_id = add_helvetica(doc);
        let gs_id = add_ext_g_state(doc, options.opacity);
        let gs_name = format!("DvGs{}", gs_id.0);

        let theta = options.rotation.to_radians();
        let (sin, cos) = theta.sin_cos();
        let [r, g, b] = options.color;
        let escaped = escape_literal(text);

        for page_id in page_ids {
            let (width, height) = page_size(doc, page_id)
                .ok_or_else(|| EngineError::Operation("page has no MediaBox".into()))?;

            // Rough horizontal centering from character count; Helvetica
            // averages about half an em per glyph at text sizes.
            let x = width / 2.0 - (text.chars().count() as f32 * options.font_size) / 4.0;
            let y = height / 2.0;

            let operators = format!(
                "q\n/{gs_name} gs\n{r} {g} {b} rg\nBT\n/{FONT_RESOURCE} {size} Tf\n\
                 {cos} {sin} {neg_sin} {cos} {x} {y} Tm\n({escaped}) Tj\nET\nQ\n",
                size = options.font_size,
                neg_sin = -sin,
            );

            add_page_resource(
                doc,
                page_id,
                b"Font",
                FONT_RESOURCE,
                Object::Reference(font_id),
            )?;
            add_page_resource(doc, page_id, b"ExtGState", &gs_name, Object::Reference(gs_id))?;
            append_page_content(doc, page_id, operators.into_bytes())?;
        }

        self.save()
    }
}
