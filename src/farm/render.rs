//! Page rendering - the work a single worker unit performs per page

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::document::{Document, PageIndex};

pub const PNG_MIME: &str = "image/png";

/// Errors raised while rendering one page
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[error("image encoding: {0}")]
    Image(#[from] image::ImageError),

    #[error("page {page} bitmap has {actual} bytes, expected {expected}")]
    MalformedBitmap {
        page: PageIndex,
        expected: usize,
        actual: usize,
    },

    #[error("page {page} is not part of the document")]
    MissingPage { page: PageIndex },

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// One encoded raster image, positionally tied to the page it came from
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub page: PageIndex,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes (not raw pixels)
    pub bytes: Vec<u8>,
}

impl RenderedImage {
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

impl std::fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedImage")
            .field("page", &self.page)
            .field("mime", &self.mime)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

/// Turns one page of a document into one image.
///
/// Implementations are shared by every worker unit of a pool and called
/// concurrently, so they must not hold mutable state behind `&self`.
pub trait PageRenderer: Send + Sync {
    fn render(&self, document: &Document, page: PageIndex) -> Result<RenderedImage, RenderFault>;
}

/// Options for [`RasterRenderer`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Invert grayscale values (light strokes on dark background)
    #[serde(default)]
    pub invert: bool,

    /// Downscale so the longer side fits, preserving aspect ratio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dimension: Option<u32>,
}

/// Rasterizes decoded grayscale page bitmaps to PNG
#[derive(Debug, Clone, Default)]
pub struct RasterRenderer {
    options: RenderOptions,
}

impl RasterRenderer {
    #[must_use]
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }
}

impl PageRenderer for RasterRenderer {
    fn render(&self, document: &Document, page: PageIndex) -> Result<RenderedImage, RenderFault> {
        let source = document
            .page(page)
            .ok_or(RenderFault::MissingPage { page })?;

        let expected = document.bitmap_len();
        if source.bitmap.len() != expected {
            return Err(RenderFault::MalformedBitmap {
                page,
                expected,
                actual: source.bitmap.len(),
            });
        }

        let gray = GrayImage::from_raw(document.width, document.height, source.bitmap.clone())
            .ok_or_else(|| RenderFault::generic(format!("page {page}: bitmap does not fit")))?;
        let mut img = DynamicImage::ImageLuma8(gray);

        if self.options.invert {
            img.invert();
        }

        if let Some(max) = self.options.max_dimension.filter(|m| *m > 0) {
            if img.width().max(img.height()) > max {
                img = img.resize(max, max, FilterType::Triangle);
            }
        }

        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

        Ok(RenderedImage {
            page,
            mime: PNG_MIME.to_string(),
            width: img.width(),
            height: img.height(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;

    fn doc_4x2() -> Document {
        Document::new(
            4,
            2,
            vec![
                Page::new(1, vec![0, 32, 64, 96, 128, 160, 192, 255]),
                Page::new(2, vec![1, 2, 3]),
            ],
        )
    }

    fn decode(img: &RenderedImage) -> image::GrayImage {
        image::load_from_memory_with_format(&img.bytes, ImageFormat::Png)
            .expect("png decodes")
            .to_luma8()
    }

    #[test]
    fn renders_png_with_document_geometry() {
        let img = RasterRenderer::default()
            .render(&doc_4x2(), 1)
            .expect("page renders");

        assert_eq!(img.page, 1);
        assert_eq!(img.mime, PNG_MIME);
        assert_eq!((img.width, img.height), (4, 2));
        assert_eq!(decode(&img).get_pixel(3, 1).0, [255]);
    }

    #[test]
    fn invert_flips_luma() {
        let renderer = RasterRenderer::new(RenderOptions {
            invert: true,
            max_dimension: None,
        });
        let img = renderer.render(&doc_4x2(), 1).expect("page renders");
        let px = decode(&img);
        assert_eq!(px.get_pixel(0, 0).0, [255]);
        assert_eq!(px.get_pixel(3, 1).0, [0]);
    }

    #[test]
    fn max_dimension_preserves_aspect() {
        let renderer = RasterRenderer::new(RenderOptions {
            invert: false,
            max_dimension: Some(2),
        });
        let img = renderer.render(&doc_4x2(), 1).expect("page renders");
        assert_eq!((img.width, img.height), (2, 1));
    }

    #[test]
    fn short_bitmap_is_malformed() {
        let err = RasterRenderer::default()
            .render(&doc_4x2(), 2)
            .expect_err("bitmap too short");
        assert!(matches!(
            err,
            RenderFault::MalformedBitmap {
                page: 2,
                expected: 8,
                actual: 3
            }
        ));
    }

    #[test]
    fn unknown_page_is_missing() {
        let err = RasterRenderer::default()
            .render(&doc_4x2(), 9)
            .expect_err("no such page");
        assert!(matches!(err, RenderFault::MissingPage { page: 9 }));
    }

    #[test]
    fn data_url_has_mime_prefix() {
        let img = RenderedImage {
            page: 1,
            mime: PNG_MIME.to_string(),
            width: 1,
            height: 1,
            bytes: vec![0xFF, 0x00],
        };
        assert_eq!(img.to_data_url(), "data:image/png;base64,/wA=");
    }
}
