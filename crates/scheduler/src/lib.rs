//! Preview load scheduling
//!
//! The concurrency gate between the thumbnail cache and the decode path: a
//! FIFO work queue with viewport-driven promotion, a bounded worker pool
//! that enforces the concurrency ceiling, and cooperative cancellation for
//! document close.

pub mod cancel;
pub mod pool;
pub mod queue;

pub use cancel::CancellationToken;
pub use pool::{
    PreviewExecutor, PreviewPool, PreviewPoolConfig, DEFAULT_PREVIEW_WORKERS,
};
pub use queue::{PreviewJob, PreviewQueue};
