//! Scene orchestration: diffing, index/dirty sync, and render pass assembly
//!
//! [`AnnotationScene`] is the top-level manager tying the spatial index, the
//! dirty tracker, the LOD policy, and the viewport query cache together. The
//! host hands it the authoritative annotation collection each update cycle
//! and a viewport each draw cycle; the scene answers with the draw commands
//! for everything that is both visible and in need of re-render, plus the
//! ids whose backend-owned resources should be released. The scene never
//! owns GPU or canvas resources itself.
//!
//! The integration contract is explicit: the host calls
//! [`init_world`](AnnotationScene::init_world) when an image is loaded,
//! [`apply_update`](AnnotationScene::apply_update) whenever the collection
//! may have changed, [`render_pass`](AnnotationScene::render_pass) once per
//! draw cycle, and [`teardown`](AnnotationScene::teardown) when the scene
//! goes away. There are no hidden reactive triggers.

use crate::annotation::{Annotation, AnnotationId};
use crate::cache::ViewportQueryCache;
use crate::dirty::DirtyTracker;
use crate::lod::{self, DrawGeometry, DrawStyle, LodConfig, LodTier};
use crate::quadtree::{DEFAULT_MAX_DEPTH, DEFAULT_NODE_CAPACITY, SpatialIndex};
use crate::{Result, SceneError};

use geo::{Coord, Rect};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the scene engine
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SceneConfig {
    /// Quadtree node capacity before subdivision
    pub node_capacity: usize,
    /// Maximum quadtree depth
    pub max_depth: u32,
    /// Level-of-detail thresholds and draw policy
    pub lod: LodConfig,
    /// Viewport cache zoom reuse epsilon
    pub zoom_epsilon: f64,
    /// Viewport cache overlap reuse threshold
    pub reuse_threshold: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            node_capacity: DEFAULT_NODE_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            lod: LodConfig::default(),
            zoom_epsilon: ViewportQueryCache::DEFAULT_ZOOM_EPSILON,
            reuse_threshold: ViewportQueryCache::DEFAULT_REUSE_THRESHOLD,
        }
    }
}

/// Current viewport transform, handed in by the host each draw cycle
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    /// Visible region in world coordinates
    pub bounds: Rect<f64>,
    /// Zoom multiplier
    pub zoom: f64,
    /// World-to-screen scale factor at zoom 1.0
    pub world_to_screen_scale: f64,
}

/// One annotation the backend should (re)draw this cycle
#[derive(Clone, Debug)]
pub struct DrawCommand {
    pub id: AnnotationId,
    /// Label reference for fill color resolution by the backend
    pub label_id: String,
    pub tier: LodTier,
    /// Geometry resolved per the tier policy; shared with the scene's cache
    pub geometry: Arc<DrawGeometry>,
    pub style: DrawStyle,
}

/// Output of one draw cycle
#[derive(Clone, Debug, Default)]
pub struct RenderPass {
    /// Annotations that are visible and require re-render, in no particular
    /// order
    pub draw: Vec<DrawCommand>,
    /// Ids whose backend-owned renderable resources should be released
    pub release: Vec<AnnotationId>,
}

/// O(1) counters describing the scene
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneStats {
    pub annotation_count: usize,
    /// Size of the visible set resolved by the last render pass
    pub visible_count: usize,
    pub dirty_count: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Draw commands emitted by the last render pass
    pub last_draw_count: usize,
}

/// Top-level manager for the annotation scene
pub struct AnnotationScene {
    config: SceneConfig,
    index: Option<SpatialIndex>,
    dirty: DirtyTracker,
    cache: ViewportQueryCache,
    /// Previous authoritative collection, keyed by id
    snapshot: HashMap<AnnotationId, Annotation>,
    /// Lazily resolved draw geometry per (id, tier); evicted when the
    /// annotation changes or is removed
    geometry_cache: HashMap<(AnnotationId, LodTier), Arc<DrawGeometry>>,
    /// Ids removed since the last render pass, awaiting backend release
    pending_release: Vec<AnnotationId>,
    last_tier: Option<LodTier>,
    last_draw_count: usize,
    last_visible_count: usize,
    has_snapshot: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl AnnotationScene {
    /// Create a scene; no queries are answered until
    /// [`init_world`](Self::init_world) is called
    pub fn new(config: SceneConfig) -> Self {
        let cache = ViewportQueryCache::new(config.zoom_epsilon, config.reuse_threshold);
        Self {
            config,
            index: None,
            dirty: DirtyTracker::new(),
            cache,
            snapshot: HashMap::new(),
            geometry_cache: HashMap::new(),
            pending_release: Vec::new(),
            last_tier: None,
            last_draw_count: 0,
            last_visible_count: 0,
            has_snapshot: false,
        }
    }

    /// (Re)initialize the world bounds, e.g. when a new image is loaded
    ///
    /// The index is rebuilt from scratch and every previously known id is
    /// queued for backend release on the next render pass.
    pub fn init_world(&mut self, width: f64, height: f64) -> Result<()> {
        if !(width > 0.0 && height > 0.0) {
            return Err(SceneError::InvalidWorldBounds { width, height });
        }

        self.pending_release.extend(self.snapshot.keys().cloned());

        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: width, y: height });
        self.index = Some(SpatialIndex::with_limits(
            bounds,
            self.config.node_capacity,
            self.config.max_depth,
        ));
        self.snapshot.clear();
        self.geometry_cache.clear();
        self.cache.invalidate();
        self.dirty.clear();
        self.has_snapshot = false;
        self.last_tier = None;

        tracing::debug!(width, height, "initialized world bounds");
        Ok(())
    }

    /// Whether [`init_world`](Self::init_world) has been called
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.index.is_some()
    }

    /// Diff the authoritative collection against the previous snapshot and
    /// sync the index and dirty set
    ///
    /// O(n) in the collection size via hash lookups on both snapshots.
    /// Removed ids are queued for backend release; added and value-changed
    /// ids are (re)indexed and marked dirty. Any mutation invalidates the
    /// viewport cache. The very first cycle marks everything dirty.
    pub fn apply_update(&mut self, current: &[Annotation]) -> Result<()> {
        let bboxes: Vec<_> = current
            .iter()
            .map(|ann| ann.geometry.bounding_box())
            .collect();
        self.diff_and_sync(current, &bboxes)
    }

    /// [`apply_update`](Self::apply_update) with bounding boxes computed in
    /// parallel; worthwhile for bulk loads of many large polygons
    pub fn apply_update_parallel(&mut self, current: &[Annotation]) -> Result<()> {
        let bboxes: Vec<_> = current
            .par_iter()
            .map(|ann| ann.geometry.bounding_box())
            .collect();
        self.diff_and_sync(current, &bboxes)
    }

    fn diff_and_sync(&mut self, current: &[Annotation], bboxes: &[Option<Rect<f64>>]) -> Result<()> {
        let Some(index) = self.index.as_mut() else {
            return Err(SceneError::NotInitialized);
        };
        #[cfg(feature = "profiling")]
        profiling::scope!("scene::apply_update");

        if !self.has_snapshot {
            self.dirty.mark_all_dirty();
        }

        let current_ids: HashSet<&str> = current.iter().map(|ann| ann.id.as_str()).collect();
        let removed: Vec<AnnotationId> = self
            .snapshot
            .keys()
            .filter(|id| !current_ids.contains(id.as_str()))
            .cloned()
            .collect();

        let mut mutated = !removed.is_empty();
        for id in &removed {
            index.remove(id);
            self.dirty.mark_dirty(id);
            self.pending_release.push(id.clone());
            self.geometry_cache.retain(|(cached_id, _), _| cached_id != id);
        }

        for (ann, bbox) in current.iter().zip(bboxes) {
            match self.snapshot.get(&ann.id) {
                None => {
                    // Added. An annotation with no location (empty polygon)
                    // is tracked but cannot be indexed or visible.
                    if let Some(bbox) = bbox {
                        index.insert(ann.id.clone(), *bbox);
                    }
                    self.dirty.mark_dirty(&ann.id);
                    mutated = true;
                }
                Some(previous)
                    if previous.geometry != ann.geometry || previous.label_id != ann.label_id =>
                {
                    // Changed by value: geometry updates are remove+insert,
                    // never an in-place bbox mutation
                    match bbox {
                        Some(bbox) => index.update(ann.id.clone(), *bbox),
                        None => {
                            index.remove(&ann.id);
                        }
                    }
                    self.dirty.mark_dirty(&ann.id);
                    self.geometry_cache
                        .retain(|(cached_id, _), _| cached_id != &ann.id);
                    mutated = true;
                }
                Some(_) => {}
            }
        }

        if mutated {
            self.cache.invalidate();
        }

        self.snapshot = current
            .iter()
            .map(|ann| (ann.id.clone(), ann.clone()))
            .collect();
        self.has_snapshot = true;

        tracing::debug!(
            removed = removed.len(),
            total = current.len(),
            mutated,
            "applied annotation update"
        );
        Ok(())
    }

    /// Resolve one draw cycle for the given viewport
    ///
    /// The visible set comes from the viewport cache when the camera moved
    /// less than the reuse thresholds, otherwise from a fresh index query.
    /// The draw list is the visible set intersected with the dirty set,
    /// filtered by degeneracy and the tier's minimum on-screen size. A tier
    /// change since the previous pass forces a full re-render of the visible
    /// set. Completing the pass clears the dirty tracker and drains the
    /// release list.
    pub fn render_pass(&mut self, viewport: &Viewport) -> Result<RenderPass> {
        let Some(index) = self.index.as_ref() else {
            return Err(SceneError::NotInitialized);
        };
        #[cfg(feature = "profiling")]
        profiling::scope!("scene::render_pass");

        let tier = lod::select_tier(&self.config.lod, viewport.zoom);
        if self.last_tier != Some(tier) {
            self.dirty.mark_all_dirty();
        }

        let visible = match self.cache.lookup(&viewport.bounds, viewport.zoom) {
            Some(ids) => ids,
            None => {
                let ids = Arc::new(index.query(&viewport.bounds));
                self.cache
                    .store(viewport.bounds, viewport.zoom, Arc::clone(&ids));
                ids
            }
        };

        let mut draw = Vec::new();
        if tier != LodTier::Hidden && !self.dirty.is_clean() {
            for id in visible.iter() {
                if !self.dirty.is_dirty(id) {
                    continue;
                }
                let Some(annotation) = self.snapshot.get(id) else {
                    // Stale cache approximation: the id left the collection
                    // after the cached query
                    continue;
                };
                if annotation.geometry.is_degenerate() {
                    continue;
                }
                let Some(bbox) = annotation.geometry.bounding_box() else {
                    continue;
                };
                if !lod::should_render(&bbox, viewport.world_to_screen_scale, viewport.zoom, tier) {
                    continue;
                }

                let key = (id.clone(), tier);
                let geometry = match self.geometry_cache.get(&key) {
                    Some(cached) => Arc::clone(cached),
                    None => {
                        let Some(resolved) =
                            lod::resolve_geometry(&self.config.lod, tier, &annotation.geometry)
                        else {
                            continue;
                        };
                        let resolved = Arc::new(resolved);
                        self.geometry_cache.insert(key, Arc::clone(&resolved));
                        resolved
                    }
                };

                draw.push(DrawCommand {
                    id: id.clone(),
                    label_id: annotation.label_id.clone(),
                    tier,
                    geometry,
                    style: lod::style_for(&self.config.lod, tier),
                });
            }
        }

        let release = std::mem::take(&mut self.pending_release);
        self.dirty.clear();
        self.last_tier = Some(tier);
        self.last_draw_count = draw.len();
        self.last_visible_count = visible.len();

        tracing::debug!(
            visible = visible.len(),
            drawn = draw.len(),
            released = release.len(),
            ?tier,
            "render pass completed"
        );
        Ok(RenderPass { draw, release })
    }

    /// Ids whose geometry contains the given world point
    ///
    /// Bbox prefilter through the index, then the exact per-variant
    /// containment test. Sorted for deterministic ordering.
    pub fn hit_test(&self, point: Coord<f64>) -> Result<Vec<AnnotationId>> {
        let Some(index) = self.index.as_ref() else {
            return Err(SceneError::NotInitialized);
        };
        let probe = Rect::new(point, point);
        let mut hits: Vec<AnnotationId> = index
            .query(&probe)
            .into_iter()
            .filter(|id| {
                self.snapshot
                    .get(id)
                    .is_some_and(|ann| ann.geometry.contains_point(point))
            })
            .collect();
        hits.sort_unstable();
        Ok(hits)
    }

    /// Drop everything and report every known id for backend release
    pub fn teardown(&mut self) -> RenderPass {
        let mut release = std::mem::take(&mut self.pending_release);
        release.extend(self.snapshot.keys().cloned());

        self.index = None;
        self.snapshot.clear();
        self.geometry_cache.clear();
        self.cache.invalidate();
        self.dirty.clear();
        self.has_snapshot = false;
        self.last_tier = None;
        self.last_draw_count = 0;
        self.last_visible_count = 0;

        RenderPass {
            draw: Vec::new(),
            release,
        }
    }

    /// Current counters; all O(1)
    pub fn stats(&self) -> SceneStats {
        SceneStats {
            annotation_count: self.snapshot.len(),
            visible_count: self.last_visible_count,
            dirty_count: if self.dirty.is_all_dirty() {
                self.snapshot.len()
            } else {
                self.dirty.dirty_ids().len()
            },
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            last_draw_count: self.last_draw_count,
        }
    }

    /// The retained annotation for an id, if any
    #[inline]
    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.snapshot.get(id)
    }

    /// Number of annotations in the current snapshot
    #[inline]
    pub fn annotation_count(&self) -> usize {
        self.snapshot.len()
    }

    /// Every id the scene currently knows; the fallback visible set when an
    /// offloaded query misses its deadline
    pub fn known_ids(&self) -> impl Iterator<Item = &str> {
        self.snapshot.keys().map(String::as_str)
    }

    /// The dirty tracker, for hosts that inspect pending invalidation
    #[inline]
    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    /// The live spatial index, once initialized; used to snapshot for the
    /// query offload worker
    #[inline]
    pub fn index(&self) -> Option<&SpatialIndex> {
        self.index.as_ref()
    }

    /// Configuration the scene was built with
    #[inline]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }
}
