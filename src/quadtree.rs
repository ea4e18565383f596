//! Quadtree spatial index for viewport culling
//!
//! The index owns the mapping from annotation id to bounding box and answers
//! "which ids intersect this region" without touching annotations far outside
//! it. Nodes live in a flat arena (`Vec<Node>`) addressed by integer index,
//! with a reverse `id -> node` map so removal never re-descends the tree.
//!
//! Insertion recurses from the root: an undivided node with spare capacity
//! stores the item locally; otherwise, if depth allows, the node subdivides
//! into four equal quadrants and insertion descends into the single child
//! fully containing the bbox. A bbox that straddles multiple quadrants, or
//! that arrives at a node already at maximum depth, is retained at the
//! current node as an over-capacity fallback rather than split or
//! duplicated, so each id is reported at most once per query. Heavy
//! clustering of large or straddling shapes therefore degrades queries
//! toward O(n); that tradeoff is accepted and covered by a stress bench.

use crate::bounds;
use geo::{Coord, Rect};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Default maximum number of locally stored items before a node subdivides
pub const DEFAULT_NODE_CAPACITY: usize = 8;

/// Default maximum depth of the tree
pub const DEFAULT_MAX_DEPTH: u32 = 8;

/// Arena index of the root node
const ROOT: usize = 0;

/// A single node in the arena
#[derive(Clone, Debug)]
struct Node {
    /// Region covered by this node, in world coordinates
    bounds: Rect<f64>,
    /// Depth in the tree (0 = root)
    depth: u32,
    /// Items stored at this node; exceeds capacity only via the
    /// straddle/max-depth fallback
    items: SmallVec<[(String, Rect<f64>); DEFAULT_NODE_CAPACITY]>,
    /// Arena indices of the NW, NE, SW, SE children, if subdivided.
    /// Subdivision is irreversible for the node's lifetime.
    children: Option<[usize; 4]>,
}

impl Node {
    fn new(bounds: Rect<f64>, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            items: SmallVec::new(),
            children: None,
        }
    }
}

/// Quadtree index over annotation bounding boxes
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    /// Node arena; `nodes[0]` is always the root
    nodes: Vec<Node>,
    /// Reverse lookup from id to owning node, for O(1) removal
    entries: HashMap<String, usize>,
    capacity: usize,
    max_depth: u32,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SpatialIndex {
    /// Create an empty index covering the given world bounds
    pub fn new(world_bounds: Rect<f64>) -> Self {
        Self::with_limits(world_bounds, DEFAULT_NODE_CAPACITY, DEFAULT_MAX_DEPTH)
    }

    /// Create an empty index with explicit capacity and depth limits
    pub fn with_limits(world_bounds: Rect<f64>, capacity: usize, max_depth: u32) -> Self {
        Self {
            nodes: vec![Node::new(world_bounds, 0)],
            entries: HashMap::new(),
            capacity: capacity.max(1),
            max_depth,
        }
    }

    /// World bounds the index was constructed with
    #[inline]
    pub fn world_bounds(&self) -> Rect<f64> {
        self.nodes[ROOT].bounds
    }

    /// Number of indexed ids
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no ids
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the given id is indexed
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Bounding box the given id was indexed with
    pub fn bbox_of(&self, id: &str) -> Option<Rect<f64>> {
        let node = *self.entries.get(id)?;
        self.nodes[node]
            .items
            .iter()
            .find(|(item_id, _)| item_id == id)
            .map(|(_, bbox)| *bbox)
    }

    /// Insert an id with its bounding box
    ///
    /// Always succeeds. An id already present is overwritten: the existing
    /// entry is removed first, then the new bbox inserted, so an id can
    /// never occupy two nodes at once.
    pub fn insert(&mut self, id: String, bbox: Rect<f64>) {
        if self.entries.contains_key(&id) {
            self.remove(&id);
        }

        let mut node = ROOT;
        loop {
            if self.nodes[node].children.is_none() {
                if self.nodes[node].items.len() < self.capacity
                    || self.nodes[node].depth >= self.max_depth
                {
                    self.store(node, id, bbox);
                    return;
                }
                self.subdivide(node);
            }

            match self.child_containing(node, &bbox) {
                Some(child) => node = child,
                None => {
                    // Straddles the quadrant boundaries: keep at this node
                    self.store(node, id, bbox);
                    return;
                }
            }
        }
    }

    /// Remove an id from the index
    ///
    /// O(1) node lookup via the reverse map; returns `false` (no-op) when
    /// the id is absent.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(node) = self.entries.remove(id) else {
            return false;
        };
        let items = &mut self.nodes[node].items;
        if let Some(pos) = items.iter().position(|(item_id, _)| item_id == id) {
            items.swap_remove(pos);
        }
        true
    }

    /// Replace the bounding box of an id: remove then insert
    pub fn update(&mut self, id: String, bbox: Rect<f64>) {
        self.remove(&id);
        self.insert(id, bbox);
    }

    /// All ids whose bounding box intersects the region
    ///
    /// No duplicates by construction: every id lives in exactly one node.
    pub fn query(&self, region: &Rect<f64>) -> HashSet<String> {
        let mut out = HashSet::new();
        // Root items are always scanned so that ids indexed outside the
        // world bounds (stored at the root) are still reported.
        let mut stack = vec![ROOT];

        while let Some(node) = stack.pop() {
            let node = &self.nodes[node];
            for (id, bbox) in &node.items {
                if bounds::rects_intersect(bbox, region) {
                    out.insert(id.clone());
                }
            }
            if let Some(children) = node.children {
                for child in children {
                    if bounds::rects_intersect(&self.nodes[child].bounds, region) {
                        stack.push(child);
                    }
                }
            }
        }

        out
    }

    /// Reset to a single empty root, keeping the world bounds
    pub fn clear(&mut self) {
        let world_bounds = self.world_bounds();
        self.nodes.clear();
        self.nodes.push(Node::new(world_bounds, 0));
        self.entries.clear();
    }

    fn store(&mut self, node: usize, id: String, bbox: Rect<f64>) {
        self.entries.insert(id.clone(), node);
        self.nodes[node].items.push((id, bbox));
    }

    /// Split a node into four equal quadrants and migrate down every locally
    /// stored item that fits entirely inside one child
    fn subdivide(&mut self, node: usize) {
        let parent = self.nodes[node].bounds;
        let depth = self.nodes[node].depth + 1;
        let (min, max) = (parent.min(), parent.max());
        let mid_x = (min.x + max.x) / 2.0;
        let mid_y = (min.y + max.y) / 2.0;

        // NW, NE, SW, SE
        let quadrants = [
            Rect::new(Coord { x: min.x, y: mid_y }, Coord { x: mid_x, y: max.y }),
            Rect::new(Coord { x: mid_x, y: mid_y }, Coord { x: max.x, y: max.y }),
            Rect::new(Coord { x: min.x, y: min.y }, Coord { x: mid_x, y: mid_y }),
            Rect::new(Coord { x: mid_x, y: min.y }, Coord { x: max.x, y: mid_y }),
        ];

        let first = self.nodes.len();
        for quadrant in quadrants {
            self.nodes.push(Node::new(quadrant, depth));
        }
        self.nodes[node].children = Some([first, first + 1, first + 2, first + 3]);

        let items = std::mem::take(&mut self.nodes[node].items);
        for (id, bbox) in items {
            match self.child_containing(node, &bbox) {
                Some(child) => {
                    self.entries.insert(id.clone(), child);
                    self.nodes[child].items.push((id, bbox));
                }
                None => self.nodes[node].items.push((id, bbox)),
            }
        }

        tracing::trace!(node, depth, "subdivided index node");
    }

    /// The unique child whose bounds fully contain the bbox, if any
    fn child_containing(&self, node: usize, bbox: &Rect<f64>) -> Option<usize> {
        let children = self.nodes[node].children?;
        children
            .into_iter()
            .find(|&child| bounds::rect_contains(&self.nodes[child].bounds, bbox))
    }
}
