//! Native decode collaborator contract
//!
//! The native page-decoding engine is an external collaborator: given a page
//! index and a target DPI it produces an encoded raster stream for that
//! page. This module defines the contract the pipeline consumes, plus a
//! deterministic synthetic decoder used by tests and demos.

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use thiserror::Error;

/// Errors from the native decode engine
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Requested page index does not exist in the document
    #[error("page index {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u16, page_count: u16 },

    /// The engine failed to rasterize the page
    #[error("decode engine failure: {0}")]
    Engine(String),
}

/// Encoded raster stream for one decoded page
///
/// Owns the bytes produced by the decode engine. Render strategies read the
/// stream through a fresh cursor per attempt, so a strategy that consumes
/// its reader destructively can never poison the stream for the next
/// strategy in the chain.
#[derive(Debug, Clone)]
pub struct PageStream {
    bytes: Vec<u8>,
}

impl PageStream {
    /// Wrap encoded raster bytes produced by the decode engine
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// The encoded bytes of the stream
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the stream in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the stream is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A fresh positioned reader over the stream
    ///
    /// Each call returns a new cursor at position zero regardless of what
    /// previous readers did.
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.bytes)
    }
}

/// Contract for the native page-decode engine
///
/// Implementations must be safe to call concurrently up to the preview
/// scheduler's concurrency ceiling; the trait takes `&self` and requires
/// `Send + Sync` for that reason.
pub trait PageDecoder: Send + Sync {
    /// Rasterize one page at the given DPI into an encoded stream
    fn decode_page(&self, page_index: u16, dpi: f64) -> Result<PageStream, DecodeError>;

    /// Number of pages in the document
    fn page_count(&self) -> u16;
}

/// Deterministic synthetic page decoder
///
/// Rasterizes a blank page with a light border and a page-number band at
/// the requested DPI, encoded as PNG. Stands in for the native engine in
/// tests and demos; page dimensions follow the configured physical size in
/// inches, so DPI changes produce proportionally sized bitmaps.
pub struct RasterPageDecoder {
    page_count: u16,
    page_width_in: f64,
    page_height_in: f64,
}

impl RasterPageDecoder {
    /// Create a decoder for a document with US Letter pages
    pub fn new(page_count: u16) -> Self {
        Self {
            page_count,
            page_width_in: 8.5,
            page_height_in: 11.0,
        }
    }

    /// Override the physical page size in inches
    pub fn with_page_size(mut self, width_in: f64, height_in: f64) -> Self {
        self.page_width_in = width_in;
        self.page_height_in = height_in;
        self
    }
}

impl PageDecoder for RasterPageDecoder {
    fn decode_page(&self, page_index: u16, dpi: f64) -> Result<PageStream, DecodeError> {
        if page_index >= self.page_count {
            return Err(DecodeError::PageOutOfRange {
                page: page_index,
                page_count: self.page_count,
            });
        }
        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(DecodeError::Engine(format!("invalid dpi {dpi}")));
        }

        let width = (self.page_width_in * dpi).round().max(1.0) as u32;
        let height = (self.page_height_in * dpi).round().max(1.0) as u32;

        let mut page = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                page.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                page.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                page.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                page.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }

            // Page-number band: a gray stripe whose shade varies with the
            // page index, so different pages produce different pixels.
            let shade = 40 + ((page_index as u32 * 13) % 160) as u8;
            let band_top = height / 8;
            let band_bottom = (height / 8) + (height / 16).max(1);
            for y in band_top..band_bottom.min(height) {
                for x in 1..width - 1 {
                    page.put_pixel(x, y, Rgba([shade, shade, shade, 255]));
                }
            }
        }

        let mut encoded = Cursor::new(Vec::new());
        page.write_to(&mut encoded, ImageFormat::Png)
            .map_err(|e| DecodeError::Engine(format!("png encode failed: {e}")))?;

        Ok(PageStream::new(encoded.into_inner()))
    }

    fn page_count(&self) -> u16 {
        self.page_count
    }
}
