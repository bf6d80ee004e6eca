//! Document session glue
//!
//! Ties one open document's decoder, coordinator, thumbnail cache and
//! observability context together with a single lifecycle: open primes the
//! cache, close synchronously releases everything.

use crate::coordinator::{ObservabilityContext, RenderingCoordinator, RenderOutcome};
use crate::events::PageMutation;
use crate::thumbnails::ThumbnailCache;
use folioview_monitor::ResourceMonitor;
use folioview_render::{DisplayInfo, PageDecoder, QualityPreset, StrategyChain};
use folioview_scheduler::PreviewPoolConfig;
use std::path::PathBuf;
use std::sync::Arc;

/// One open document and its rendering pipeline
pub struct DocumentSession {
    path: PathBuf,
    coordinator: Arc<RenderingCoordinator>,
    thumbnails: ThumbnailCache,
}

impl DocumentSession {
    /// Open a session over an already-loaded document
    ///
    /// Builds the default strategy chain and resource monitor, primes the
    /// thumbnail cache (one Pending entry per page, initial window
    /// scheduled) and starts the preview worker pool.
    pub fn open(path: PathBuf, decoder: Arc<dyn PageDecoder>) -> Self {
        Self::open_with_config(path, decoder, PreviewPoolConfig::default())
    }

    /// Open a session with a custom preview pool configuration
    pub fn open_with_config(
        path: PathBuf,
        decoder: Arc<dyn PageDecoder>,
        pool_config: PreviewPoolConfig,
    ) -> Self {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let observability = Arc::new(ObservabilityContext::new(label));

        log::info!(
            "session {} opened for {} ({} pages)",
            observability.session_id,
            path.display(),
            decoder.page_count()
        );

        let coordinator = Arc::new(RenderingCoordinator::new(
            path.clone(),
            decoder,
            StrategyChain::default_chain(),
            ResourceMonitor::new(),
            observability,
        ));

        let thumbnails = ThumbnailCache::new(coordinator.clone(), pool_config);
        thumbnails.load_all();

        Self {
            path,
            coordinator,
            thumbnails,
        }
    }

    /// Render a page for the full-resolution view
    pub fn render_page(
        &self,
        page_number: u16,
        zoom: f64,
        display: &DisplayInfo,
        quality: QualityPreset,
    ) -> RenderOutcome {
        self.coordinator
            .render_page(page_number, zoom, display, quality)
    }

    /// Forward a page-mutation notification to the thumbnail cache
    pub fn apply_mutation(&self, mutation: &PageMutation) {
        self.thumbnails.invalidate(mutation);
    }

    /// The session's thumbnail cache
    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// The session's rendering coordinator
    pub fn coordinator(&self) -> &Arc<RenderingCoordinator> {
        &self.coordinator
    }

    /// Path of the open document
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Total pages in the open document
    pub fn page_count(&self) -> u16 {
        self.coordinator.total_pages()
    }

    /// Close the session, releasing every owned resource synchronously
    ///
    /// In-flight preview loads are cancelled and drained before this
    /// returns; dropping the session without calling `close` does the
    /// same.
    pub fn close(mut self) {
        self.thumbnails.close();
        log::info!("session closed for {}", self.path.display());
    }
}
