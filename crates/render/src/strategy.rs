//! Render strategies and the fallback chain
//!
//! A strategy turns a decoded page stream into a displayable image. The
//! chain tries strategies in ascending priority order until one succeeds,
//! treating `Ok(None)` as a recoverable limitation of that strategy and a
//! hard error as a fault of the whole call.

use crate::context::RenderContext;
use crate::decode::PageStream;
use image::RgbaImage;
use std::io::Write;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Upper bound on decoded pixels the in-memory path will hold at once.
///
/// A 576 DPI US Letter page is ~31M pixels; anything past 64M indicates a
/// degenerate stream and is pushed to the disk-staged fallback.
pub const MAX_IN_MEMORY_PIXELS: u64 = 64 * 1024 * 1024;

/// Hard failure from a render strategy
///
/// Soft failures (unsupported stream shape, memory pressure) are signalled
/// by `Ok(None)` from `try_render` instead; a `StrategyError` aborts the
/// whole chain call because it indicates a programming or environment
/// fault rather than a recoverable strategy limitation.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy {strategy} failed: {message}")]
    Internal {
        strategy: &'static str,
        message: String,
    },

    #[error("strategy I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Displayable page image produced by a strategy
///
/// Owns its pixel buffer and, for disk-staged renders, the backing temp
/// file. Dropping the image deletes the temp file; no other component may
/// hold the file past the image's lifetime.
#[derive(Debug)]
pub struct PageImage {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    produced_by: &'static str,
    staged_file: Option<NamedTempFile>,
}

impl PageImage {
    /// Build an image handle from decoded RGBA pixels
    pub fn from_rgba(image: RgbaImage, produced_by: &'static str) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: image.into_raw(),
            width,
            height,
            produced_by,
            staged_file: None,
        }
    }

    /// Attach ownership of the temp file backing this image
    pub fn with_staged_file(mut self, file: NamedTempFile) -> Self {
        self.staged_file = Some(file);
        self
    }

    /// Raw RGBA pixel data
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Name of the strategy that produced this image
    pub fn produced_by(&self) -> &'static str {
        self.produced_by
    }

    /// Path of the backing temp file, if this image was disk-staged
    pub fn staged_path(&self) -> Option<&std::path::Path> {
        self.staged_file.as_ref().map(|f| f.path())
    }

    /// Memory held by the pixel buffer in bytes
    pub fn memory_size(&self) -> usize {
        self.pixels.len()
    }
}

/// An interchangeable algorithm for presenting a decoded page stream
///
/// Strategies declare a priority; lower values are attempted first. A
/// strategy returns `Ok(None)` to pass on a stream it cannot handle so the
/// chain can fall back to the next one.
pub trait RenderStrategy: Send + Sync {
    /// Stable name used in logs and exhaustion reports
    fn name(&self) -> &'static str;

    /// Fallback priority; lower values are attempted first
    fn priority(&self) -> u32;

    /// Attempt to produce a displayable image from the stream
    fn try_render(
        &self,
        stream: &PageStream,
        context: &RenderContext,
    ) -> Result<Option<PageImage>, StrategyError>;
}

/// Fast in-memory decode path
///
/// Decodes the stream directly from memory. Malformed streams, unsupported
/// formats and oversized images are soft failures handed to the next
/// strategy.
pub struct InMemoryStrategy {
    max_pixels: u64,
}

impl InMemoryStrategy {
    pub fn new() -> Self {
        Self {
            max_pixels: MAX_IN_MEMORY_PIXELS,
        }
    }

    /// Override the pixel ceiling (mainly for tests)
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }
}

impl Default for InMemoryStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderStrategy for InMemoryStrategy {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn priority(&self) -> u32 {
        0
    }

    fn try_render(
        &self,
        stream: &PageStream,
        context: &RenderContext,
    ) -> Result<Option<PageImage>, StrategyError> {
        if stream.is_empty() {
            log::debug!(
                "[{}] in-memory: empty stream for page {}",
                context.operation_id,
                context.page_number
            );
            return Ok(None);
        }

        let decoded = match image::load_from_memory(stream.bytes()) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::debug!(
                    "[{}] in-memory: stream not decodable ({e})",
                    context.operation_id
                );
                return Ok(None);
            }
        };

        let pixel_count = decoded.width() as u64 * decoded.height() as u64;
        if pixel_count > self.max_pixels {
            log::debug!(
                "[{}] in-memory: image too large ({pixel_count} px), deferring to fallback",
                context.operation_id
            );
            return Ok(None);
        }

        Ok(Some(PageImage::from_rgba(decoded.into_rgba8(), self.name())))
    }
}

/// Disk-staged fallback path
///
/// Writes the stream to a managed temp file and loads the image back from
/// disk. The temp file's ownership moves into the returned image handle,
/// so it lives exactly as long as the image does. On any failure the file
/// is dropped, which deletes it, before the soft failure is reported.
pub struct DiskStagedStrategy;

impl DiskStagedStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DiskStagedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderStrategy for DiskStagedStrategy {
    fn name(&self) -> &'static str {
        "disk-staged"
    }

    fn priority(&self) -> u32 {
        10
    }

    fn try_render(
        &self,
        stream: &PageStream,
        context: &RenderContext,
    ) -> Result<Option<PageImage>, StrategyError> {
        if stream.is_empty() {
            return Ok(None);
        }

        let mut staged = match tempfile::Builder::new()
            .prefix("folioview-page-")
            .suffix(".raster")
            .tempfile()
        {
            Ok(file) => file,
            Err(e) => {
                log::warn!(
                    "[{}] disk-staged: temp file creation failed ({e})",
                    context.operation_id
                );
                return Ok(None);
            }
        };

        if let Err(e) = staged
            .write_all(stream.bytes())
            .and_then(|_| staged.flush())
        {
            log::warn!(
                "[{}] disk-staged: temp file write failed ({e})",
                context.operation_id
            );
            return Ok(None);
        }

        let decoded = match image::open(staged.path()) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::debug!(
                    "[{}] disk-staged: staged stream not decodable ({e})",
                    context.operation_id
                );
                return Ok(None);
            }
        };

        Ok(Some(
            PageImage::from_rgba(decoded.into_rgba8(), self.name()).with_staged_file(staged),
        ))
    }
}

/// Result of one chain invocation
///
/// Records every strategy attempted, in order, whether or not the call
/// produced an image. The coordinator uses the attempt list to build
/// exhaustion errors.
#[derive(Debug)]
pub struct ChainOutcome {
    /// Image from the first successful strategy, if any
    pub image: Option<PageImage>,

    /// Names of strategies attempted, in attempt order
    pub attempted: Vec<&'static str>,
}

/// Ordered fallback chain of render strategies
///
/// Construction sorts the strategies once by ascending priority (stable,
/// so ties keep registration order). Each attempt reads the stream through
/// a fresh cursor, so one strategy's consumption never affects the next.
pub struct StrategyChain {
    strategies: Vec<Box<dyn RenderStrategy>>,
}

impl StrategyChain {
    /// Build a chain from an unordered set of strategies
    pub fn new(mut strategies: Vec<Box<dyn RenderStrategy>>) -> Self {
        strategies.sort_by_key(|s| s.priority());
        Self { strategies }
    }

    /// Chain with the default strategy set: in-memory first, disk-staged
    /// fallback
    pub fn default_chain() -> Self {
        Self::new(vec![
            Box::new(InMemoryStrategy::new()),
            Box::new(DiskStagedStrategy::new()),
        ])
    }

    /// Strategies in attempt order
    pub fn strategies(&self) -> &[Box<dyn RenderStrategy>] {
        &self.strategies
    }

    /// Try each strategy in priority order until one produces an image
    ///
    /// Soft failures move on to the next strategy; a hard error aborts the
    /// call and propagates. Every attempt is logged with the strategy name
    /// and outcome.
    pub fn render_with_fallback(
        &self,
        stream: &PageStream,
        context: &RenderContext,
    ) -> Result<ChainOutcome, StrategyError> {
        let mut attempted = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            attempted.push(strategy.name());

            match strategy.try_render(stream, context)? {
                Some(image) => {
                    log::debug!(
                        "[{}] strategy {} rendered page {} ({}x{})",
                        context.operation_id,
                        strategy.name(),
                        context.page_number,
                        image.width(),
                        image.height()
                    );
                    return Ok(ChainOutcome {
                        image: Some(image),
                        attempted,
                    });
                }
                None => {
                    log::debug!(
                        "[{}] strategy {} declined page {}",
                        context.operation_id,
                        strategy.name(),
                        context.page_number
                    );
                }
            }
        }

        log::warn!(
            "[{}] all {} strategies declined page {}",
            context.operation_id,
            attempted.len(),
            context.page_number
        );
        Ok(ChainOutcome {
            image: None,
            attempted,
        })
    }
}
