//! Rendering coordination and thumbnail caching
//!
//! The orchestration layer of the page-rendering pipeline: the
//! coordinator runs quality resolution, decoding, strategy fallback and
//! resource monitoring for each request; the thumbnail cache fronts the
//! same pipeline for sidebar previews with bounded-concurrency scheduling
//! and mutation-driven invalidation.

pub mod coordinator;
pub mod events;
pub mod session;
pub mod thumbnails;

pub use coordinator::{
    ObservabilityContext, RenderError, RenderOutcome, RenderWarning, RenderingCoordinator,
    THUMBNAIL_DPI,
};
pub use events::{
    EntryStateChanged, MutationKind, PageMutation, ThumbnailSubscriber,
};
pub use session::DocumentSession;
pub use thumbnails::{
    ThumbnailCache, ThumbnailEntry, ThumbnailState, INITIAL_VISIBLE_WINDOW,
};

pub use folioview_monitor::{
    HandleLeakReport, MemoryDelta, MemorySnapshot, ResourceMonitor,
};
pub use folioview_render::{
    DecodeError, DisplayInfo, PageDecoder, PageImage, PageStream, QualityError, QualityPreset,
    RenderContext, RequestSource, StrategyChain,
};
pub use folioview_scheduler::PreviewPoolConfig;
