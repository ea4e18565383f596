//! Annotation Scene Library - Spatial Indexing and LOD for 2D Annotation Scenes
//!
//! This library keeps per-frame rendering work proportional to what is visible
//! and what changed, not to the total annotation count, for interactive scenes
//! with thousands of rectangle and polygon annotations over a pannable,
//! zoomable viewport.
//!
//! # Architecture
//!
//! - **[`SpatialIndex`]**: arena-backed quadtree answering viewport queries
//! - **[`DirtyTracker`]**: ids requiring re-render since the last render pass
//! - **[`LodTier`]** / [`LodConfig`]: zoom-dependent detail tier and draw policy
//! - **[`ViewportQueryCache`]**: memo of the last query for sub-threshold pans
//! - **[`AnnotationScene`]**: orchestrator diffing the authoritative
//!   collection, syncing index and dirty state, and emitting draw commands
//! - **[`QueryWorker`]**: optional query offload with deadline fallback
//!
//! # Performance Characteristics
//!
//! - **Insert/Remove**: O(log n) descent, O(1) reverse-lookup removal
//! - **Query**: O(log n + k) under uniform distribution, degrading toward
//!   O(n) when many large or quadrant-straddling shapes cluster at ancestor
//!   nodes (an accepted tradeoff of the no-duplication storage policy)
//! - **Update cycle**: O(n) hash-map diff of the annotation collection

mod annotation;
pub mod bounds;
mod cache;
mod dirty;
mod lod;
mod quadtree;
mod scene;
mod worker;

// Public API exports
pub use annotation::{Annotation, AnnotationId, Geometry};
pub use cache::{CacheEntry, ViewportQueryCache};
pub use dirty::DirtyTracker;
pub use lod::{
    DrawGeometry, DrawStyle, LodConfig, LodTier, resolve_geometry, select_tier, should_render,
    style_for,
};
pub use quadtree::{DEFAULT_MAX_DEPTH, DEFAULT_NODE_CAPACITY, SpatialIndex};
pub use scene::{AnnotationScene, DrawCommand, RenderPass, SceneConfig, SceneStats, Viewport};
pub use worker::{QueryOutcome, QueryWorker};

/// Error types for the scene engine
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// A query or update arrived before `init_world`; distinguishes "not
    /// ready" from "empty scene"
    #[error("scene not initialized: call init_world first")]
    NotInitialized,

    #[error("invalid world bounds: {width}x{height}")]
    InvalidWorldBounds { width: f64, height: f64 },

    #[error("query worker disconnected")]
    WorkerDisconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SceneError>;
