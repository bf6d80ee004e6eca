//! Rendering coordinator
//!
//! Orchestrates one render request end to end: quality resolution picks
//! the effective DPI, the native decode collaborator produces the raw page
//! stream, the strategy chain converts it into a displayable image, and a
//! resource-monitor scope brackets the whole operation. Failures are typed
//! results; monitor findings are advisory warnings attached alongside the
//! primary result.

use folioview_monitor::{HandleLeakReport, MemoryDelta, ResourceMonitor};
use folioview_render::{
    quality, DecodeError, DisplayInfo, PageDecoder, PageImage, QualityError, QualityPreset,
    RenderContext, RequestSource, StrategyChain, StrategyError,
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Fixed DPI for sidebar thumbnail renders
///
/// Previews are not display-scale sensitive, so they bypass quality
/// resolution entirely: a quarter of base zoom at base DPI.
pub const THUMBNAIL_DPI: f64 = 36.0;

/// Typed failure of one render request
#[derive(Debug, Error)]
pub enum RenderError {
    /// A local precondition (zoom, scale, page number) was violated
    #[error("invalid render parameter: {0}")]
    InvalidParameter(String),

    /// The native decode engine failed; not retried by this core
    #[error("page decode failed: {0}")]
    DecodeFailed(#[from] DecodeError),

    /// Every strategy declined the stream
    #[error("all render strategies exhausted (attempted: {})", .attempted.join(", "))]
    AllStrategiesExhausted { attempted: Vec<String> },

    /// A strategy hit a hard fault, aborting the chain
    #[error(transparent)]
    StrategyFault(#[from] StrategyError),
}

/// Advisory finding attached to a render outcome
///
/// Warnings never fail a render; they exist for observability consumers.
#[derive(Debug, Clone)]
pub enum RenderWarning {
    /// Memory grew past the diagnostic threshold across this render
    AbnormalMemoryGrowth {
        working_set_delta: i64,
        managed_delta: i64,
    },

    /// Live handle count crossed the leak threshold
    HandleLeakDetected(HandleLeakReport),
}

/// Result of one coordinated render
#[derive(Debug)]
pub struct RenderOutcome {
    /// The rendered image, or a typed failure
    pub result: Result<PageImage, RenderError>,

    /// Memory delta across the render; absent only when a precondition
    /// failed before any work started
    pub memory: Option<MemoryDelta>,

    /// Advisory monitor findings
    pub warnings: Vec<RenderWarning>,
}

impl RenderOutcome {
    fn precondition_failure(message: String) -> Self {
        Self {
            result: Err(RenderError::InvalidParameter(message)),
            memory: None,
            warnings: Vec::new(),
        }
    }
}

/// Per-session observability context
///
/// Replaces global telemetry state: each document session owns one of
/// these, and every log line the pipeline emits carries its session ID.
#[derive(Debug, Clone)]
pub struct ObservabilityContext {
    pub session_id: Uuid,
    pub document_label: String,
}

impl ObservabilityContext {
    pub fn new(document_label: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            document_label: document_label.into(),
        }
    }
}

/// Coordinates quality resolution, decoding, strategy fallback and
/// resource monitoring for one open document
pub struct RenderingCoordinator {
    document_path: PathBuf,
    decoder: Arc<dyn PageDecoder>,
    chain: StrategyChain,
    monitor: ResourceMonitor,
    observability: Arc<ObservabilityContext>,
}

impl RenderingCoordinator {
    pub fn new(
        document_path: PathBuf,
        decoder: Arc<dyn PageDecoder>,
        chain: StrategyChain,
        monitor: ResourceMonitor,
        observability: Arc<ObservabilityContext>,
    ) -> Self {
        Self {
            document_path,
            decoder,
            chain,
            monitor,
            observability,
        }
    }

    /// Total pages reported by the decode collaborator
    pub fn total_pages(&self) -> u16 {
        self.decoder.page_count()
    }

    /// Render a page for the full-resolution view
    ///
    /// DPI comes from quality resolution over the display scale, user zoom
    /// and quality preset. Precondition failures return immediately with
    /// `InvalidParameter`; decode failures fail fast with `DecodeFailed`
    /// (fallback exists across presentation strategies, never across the
    /// decode).
    pub fn render_page(
        &self,
        page_number: u16,
        zoom: f64,
        display: &DisplayInfo,
        quality_preset: QualityPreset,
    ) -> RenderOutcome {
        if let Err(message) = self.validate_page(page_number) {
            return RenderOutcome::precondition_failure(message);
        }

        let dpi = match quality::resolve(display, zoom, quality_preset) {
            Ok(dpi) => dpi,
            Err(QualityError::InvalidParameter(message)) => {
                return RenderOutcome::precondition_failure(message);
            }
        };

        let context = RenderContext::new(
            self.document_path.clone(),
            page_number,
            self.total_pages(),
            dpi,
            RequestSource::FullPage,
        );
        self.render_with_context(context)
    }

    /// Render a low-resolution preview for the sidebar
    ///
    /// Uses the fixed thumbnail profile instead of quality resolution.
    pub fn thumbnail_render(&self, page_number: u16) -> RenderOutcome {
        if let Err(message) = self.validate_page(page_number) {
            return RenderOutcome::precondition_failure(message);
        }

        let context = RenderContext::new(
            self.document_path.clone(),
            page_number,
            self.total_pages(),
            THUMBNAIL_DPI,
            RequestSource::Thumbnail,
        );
        self.render_with_context(context)
    }

    fn validate_page(&self, page_number: u16) -> Result<(), String> {
        let total = self.total_pages();
        if page_number == 0 || page_number > total {
            return Err(format!(
                "page number {page_number} out of range 1..={total}"
            ));
        }
        Ok(())
    }

    fn render_with_context(&self, context: RenderContext) -> RenderOutcome {
        log::debug!(
            "[{}] session {} rendering page {}/{} ({}) at {:.0} dpi",
            context.operation_id,
            self.observability.session_id,
            context.page_number,
            context.total_pages,
            context.request_source.label(),
            context.requested_dpi
        );

        let scope = self.monitor.scope(format!(
            "render/{}/p{}",
            context.request_source.label(),
            context.page_number
        ));

        let result = self.decode_and_present(&context);

        // The scope closes on every exit path so failures are monitored
        // exactly like successes.
        let delta = scope.finish();

        let mut warnings = Vec::new();
        if delta.is_abnormal() {
            log::warn!(
                "[{}] abnormal memory growth during page {} render",
                context.operation_id,
                context.page_number
            );
            warnings.push(RenderWarning::AbnormalMemoryGrowth {
                working_set_delta: delta.working_set_delta(),
                managed_delta: delta.managed_delta(),
            });
        }
        warnings.extend(
            self.monitor
                .detect_handle_leaks()
                .into_iter()
                .map(RenderWarning::HandleLeakDetected),
        );

        if let Err(ref error) = result {
            log::warn!(
                "[{}] page {} render failed: {error}",
                context.operation_id,
                context.page_number
            );
        }

        RenderOutcome {
            result,
            memory: Some(delta),
            warnings,
        }
    }

    fn decode_and_present(&self, context: &RenderContext) -> Result<PageImage, RenderError> {
        let stream = self
            .decoder
            .decode_page(context.page_index(), context.requested_dpi)?;

        let outcome = self.chain.render_with_fallback(&stream, context)?;
        match outcome.image {
            Some(image) => Ok(image),
            None => Err(RenderError::AllStrategiesExhausted {
                attempted: outcome.attempted.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}
