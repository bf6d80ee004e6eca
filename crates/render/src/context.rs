//! Per-request render context
//!
//! Every render request carries an immutable context through the whole
//! pipeline so that log lines, warnings and failures from different layers
//! can be correlated back to the request that caused them.

use std::path::PathBuf;
use std::time::SystemTime;
use uuid::Uuid;

/// Tag identifying which caller issued a render request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestSource {
    /// Full-resolution page view
    FullPage,

    /// Sidebar thumbnail preview
    Thumbnail,

    /// Print preview pane
    PrintPreview,
}

impl RequestSource {
    /// Short label for log lines
    pub fn label(&self) -> &'static str {
        match self {
            RequestSource::FullPage => "full-page",
            RequestSource::Thumbnail => "thumbnail",
            RequestSource::PrintPreview => "print-preview",
        }
    }
}

/// Immutable context for one render request
///
/// Created once per request and passed by reference through quality
/// resolution, decoding, the strategy chain and resource monitoring.
/// The operation ID is unique per request and appears in every log line
/// the pipeline emits for it.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Path of the document being rendered
    pub document_path: PathBuf,

    /// Page number being rendered (1-based)
    pub page_number: u16,

    /// Total pages in the document
    pub total_pages: u16,

    /// Effective DPI requested for this render
    pub requested_dpi: f64,

    /// Which caller issued the request
    pub request_source: RequestSource,

    /// When the request was issued
    pub request_time: SystemTime,

    /// Unique identifier for this request
    pub operation_id: Uuid,
}

impl RenderContext {
    /// Create a context for one render request
    ///
    /// The caller is responsible for validating `page_number` against
    /// `total_pages` before building the context.
    pub fn new(
        document_path: PathBuf,
        page_number: u16,
        total_pages: u16,
        requested_dpi: f64,
        request_source: RequestSource,
    ) -> Self {
        Self {
            document_path,
            page_number,
            total_pages,
            requested_dpi,
            request_source,
            request_time: SystemTime::now(),
            operation_id: Uuid::new_v4(),
        }
    }

    /// Zero-based page index for the decode engine
    pub fn page_index(&self) -> u16 {
        self.page_number.saturating_sub(1)
    }
}
