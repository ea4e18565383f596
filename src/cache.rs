//! Viewport query result cache
//!
//! Memoizes the most recent spatial query so sub-threshold camera motion
//! (tiny pans, slow zooms) reuses the previous visible set instead of
//! re-querying the index every frame. A reused result can be a stale
//! approximation of the true visible set when the camera has moved just
//! under the threshold; that is the deliberate tradeoff that keeps
//! continuous pan/zoom cheap, and the next miss replaces the entry, so
//! staleness is self-healing.

use crate::annotation::AnnotationId;
use crate::bounds;
use geo::Rect;
use std::collections::HashSet;
use std::sync::Arc;

/// The single retained query result
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// Viewport bounds the result was computed for
    pub bounds: Rect<f64>,
    /// Zoom the result was computed at
    pub zoom: f64,
    /// Ids visible at that viewport
    pub result_ids: Arc<HashSet<AnnotationId>>,
}

/// Single-entry memo of the last viewport query
#[derive(Clone, Debug)]
pub struct ViewportQueryCache {
    entry: Option<CacheEntry>,
    zoom_epsilon: f64,
    reuse_threshold: f64,
    hits: u64,
    misses: u64,
}

impl ViewportQueryCache {
    pub const DEFAULT_ZOOM_EPSILON: f64 = 0.1;
    pub const DEFAULT_REUSE_THRESHOLD: f64 = 0.9;

    /// Create a cache with explicit reuse thresholds
    pub fn new(zoom_epsilon: f64, reuse_threshold: f64) -> Self {
        Self {
            entry: None,
            zoom_epsilon,
            reuse_threshold,
            hits: 0,
            misses: 0,
        }
    }

    /// Try to reuse the cached result for a new viewport
    ///
    /// Reuses iff the zoom moved less than the epsilon AND the overlap ratio
    /// (`intersection_area / min(area_cached, area_new)`) meets the reuse
    /// threshold. Returns `None` on miss; the caller queries the index and
    /// [`store`](Self::store)s the fresh result.
    pub fn lookup(
        &mut self,
        viewport_bounds: &Rect<f64>,
        zoom: f64,
    ) -> Option<Arc<HashSet<AnnotationId>>> {
        let reused = self
            .entry
            .as_ref()
            .filter(|entry| {
                (zoom - entry.zoom).abs() < self.zoom_epsilon
                    && bounds::overlap_ratio(&entry.bounds, viewport_bounds)
                        >= self.reuse_threshold
            })
            .map(|entry| entry.result_ids.clone());

        match reused {
            Some(ids) => {
                self.hits += 1;
                Some(ids)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Replace the cached entry with a fresh query result
    pub fn store(
        &mut self,
        viewport_bounds: Rect<f64>,
        zoom: f64,
        result_ids: Arc<HashSet<AnnotationId>>,
    ) {
        self.entry = Some(CacheEntry {
            bounds: viewport_bounds,
            zoom,
            result_ids,
        });
    }

    /// Drop the cached entry; called when the annotation set mutates
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Number of lookups served from the cached entry
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of lookups that required a fresh query
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for ViewportQueryCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ZOOM_EPSILON, Self::DEFAULT_REUSE_THRESHOLD)
    }
}
