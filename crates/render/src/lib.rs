//! Page render resolution and strategy pipeline
//!
//! Turns a decoded page stream into a displayable bitmap: quality
//! resolution picks the effective DPI for a decode call, and an ordered
//! chain of interchangeable strategies converts the decoded stream into an
//! image, falling back on soft failure.

pub mod context;
pub mod decode;
pub mod display;
pub mod quality;
pub mod strategy;

pub use context::{RenderContext, RequestSource};
pub use decode::{DecodeError, PageDecoder, PageStream, RasterPageDecoder};
pub use display::{DisplayInfo, BASE_DPI};
pub use quality::{resolve, QualityError, QualityPreset, MAX_DPI, MIN_DPI};
pub use strategy::{
    ChainOutcome, DiskStagedStrategy, InMemoryStrategy, PageImage, RenderStrategy, StrategyChain,
    StrategyError,
};
