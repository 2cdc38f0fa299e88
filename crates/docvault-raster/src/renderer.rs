//! Rendering pages to base64 image data URIs via pdfium.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Output encoding for a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// How to rasterize a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Multiplier over the page's natural size in points.
    pub scale: f32,
    pub format: ImageFormat,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 1.5,
            format: ImageFormat::Png,
        }
    }
}

/// Stateless page rasterizer over a pdfium binding.
///
/// Construction binds the native library once; each render call opens
/// the document bytes fresh, so one renderer serves many documents.
pub struct PageRenderer {
    pdfium: Pdfium,
}

impl PageRenderer {
    /// Bind pdfium from the current directory or the system library path.
    pub fn new() -> Result<Self, RenderError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| RenderError::Init(e.to_string()))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Bind pdfium from an explicit directory.
    pub fn with_library_path(path: &str) -> Result<Self, RenderError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            .map_err(|e| RenderError::Init(e.to_string()))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Rasterize one page (1-based) of a PDF to a base64 data URI.
    pub fn render_page(
        &self,
        bytes: &[u8],
        page_number: u32,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| RenderError::Load(e.to_string()))?;

        let page_count = document.pages().len() as u32;
        if page_number == 0 || page_number > page_count {
            return Err(RenderError::PageNotFound {
                page: page_number,
                page_count,
            });
        }

        let render_failed = |e: PdfiumError| RenderError::Render {
            page: page_number,
            message: e.to_string(),
        };

        let page = document
            .pages()
            .get((page_number - 1) as u16)
            .map_err(render_failed)?;

        let target_width = (page.width().value * options.scale).round().max(1.0) as i32;
        let config = PdfRenderConfig::new().set_target_width(target_width);
        tracing::debug!(page = page_number, target_width, "rendering page");

        let image = page
            .render_with_config(&config)
            .map_err(render_failed)?
            .as_image();

        encode_data_uri(&image, options.format)
    }
}

/// Encode an image as a `data:<mime>;base64,...` URI.
pub fn encode_data_uri(image: &DynamicImage, format: ImageFormat) -> Result<String, RenderError> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    match format {
        ImageFormat::Png => image
            .write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| RenderError::Encode(e.to_string()))?,
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel; flatten before encoding.
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_to(&mut cursor, image::ImageFormat::Jpeg)
                .map_err(|e| RenderError::Encode(e.to_string()))?
        }
    }

    Ok(format!(
        "data:{};base64,{}",
        format.mime_type(),
        STANDARD.encode(&buffer)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvault_engine::{create_blank, A4_PAGE_SIZE};
    use pretty_assertions::assert_eq;

    /// Renders exercise the native pdfium library; when it is not
    /// installed the test becomes a no-op instead of failing.
    fn renderer() -> Option<PageRenderer> {
        match PageRenderer::new() {
            Ok(renderer) => Some(renderer),
            Err(err) => {
                eprintln!("pdfium unavailable, skipping: {err}");
                None
            }
        }
    }

    #[test]
    fn default_options_are_png_at_one_and_a_half() {
        let options = RenderOptions::default();
        assert_eq!(options.scale, 1.5);
        assert_eq!(options.format, ImageFormat::Png);
    }

    #[test]
    fn data_uri_encoding_carries_the_mime_type() {
        let image = DynamicImage::new_rgba8(4, 4);
        let png = encode_data_uri(&image, ImageFormat::Png).unwrap();
        assert!(png.starts_with("data:image/png;base64,"));

        let jpeg = encode_data_uri(&image, ImageFormat::Jpeg).unwrap();
        assert!(jpeg.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn data_uri_payload_is_valid_base64() {
        let image = DynamicImage::new_rgba8(2, 2);
        let uri = encode_data_uri(&image, ImageFormat::Png).unwrap();
        let payload = uri.split_once(',').unwrap().1;
        let decoded = STANDARD.decode(payload).unwrap();
        // PNG magic bytes survive the round trip.
        assert_eq!(&decoded[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn renders_a_blank_page_to_png() {
        let Some(renderer) = renderer() else { return };
        let bytes = create_blank(1, A4_PAGE_SIZE).unwrap();

        let uri = renderer
            .render_page(&bytes, 1, &RenderOptions::default())
            .unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn renders_to_jpeg_on_request() {
        let Some(renderer) = renderer() else { return };
        let bytes = create_blank(1, A4_PAGE_SIZE).unwrap();

        let options = RenderOptions {
            format: ImageFormat::Jpeg,
            ..RenderOptions::default()
        };
        let uri = renderer.render_page(&bytes, 1, &options).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn out_of_range_page_is_rejected() {
        let Some(renderer) = renderer() else { return };
        let bytes = create_blank(2, A4_PAGE_SIZE).unwrap();

        let result = renderer.render_page(&bytes, 3, &RenderOptions::default());
        assert!(matches!(
            result,
            Err(RenderError::PageNotFound { page: 3, page_count: 2 })
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_load() {
        let Some(renderer) = renderer() else { return };
        let result = renderer.render_page(b"not a pdf", 1, &RenderOptions::default());
        assert!(matches!(result, Err(RenderError::Load(_))));
    }

    #[test]
    fn one_bad_render_does_not_poison_the_renderer() {
        let Some(renderer) = renderer() else { return };
        let bytes = create_blank(1, A4_PAGE_SIZE).unwrap();

        assert!(renderer
            .render_page(&bytes, 9, &RenderOptions::default())
            .is_err());
        assert!(renderer
            .render_page(&bytes, 1, &RenderOptions::default())
            .is_ok());
    }
}
