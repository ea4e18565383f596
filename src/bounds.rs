//! Axis-aligned bounding box helpers used throughout the index

use geo::{Coord, Rect};

/// Check whether two axis-aligned rectangles intersect
///
/// Two AABBs intersect iff neither is entirely to one side of the other
/// along either axis. Touching edges count as intersecting.
#[inline(always)]
pub fn rects_intersect(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    let (amin, amax) = (a.min(), a.max());
    let (bmin, bmax) = (b.min(), b.max());
    !(amax.x < bmin.x || amin.x > bmax.x || amax.y < bmin.y || amin.y > bmax.y)
}

/// Check whether `outer` fully contains `inner` (boundary inclusive)
#[inline(always)]
pub fn rect_contains(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    let (omin, omax) = (outer.min(), outer.max());
    let (imin, imax) = (inner.min(), inner.max());
    imin.x >= omin.x && imax.x <= omax.x && imin.y >= omin.y && imax.y <= omax.y
}

/// Check whether a rectangle contains a point (boundary inclusive)
#[inline(always)]
pub fn rect_contains_coord(rect: &Rect<f64>, coord: Coord<f64>) -> bool {
    let (min, max) = (rect.min(), rect.max());
    coord.x >= min.x && coord.x <= max.x && coord.y >= min.y && coord.y <= max.y
}

/// Area of the intersection of two rectangles, via per-axis clamped overlap
///
/// Returns 0.0 for disjoint rectangles.
#[inline]
pub fn intersection_area(a: &Rect<f64>, b: &Rect<f64>) -> f64 {
    let (amin, amax) = (a.min(), a.max());
    let (bmin, bmax) = (b.min(), b.max());
    let overlap_x = (amax.x.min(bmax.x) - amin.x.max(bmin.x)).max(0.0);
    let overlap_y = (amax.y.min(bmax.y) - amin.y.max(bmin.y)).max(0.0);
    overlap_x * overlap_y
}

/// Overlap ratio of two rectangles: `intersection_area / min(area_a, area_b)`
///
/// 1.0 when the smaller rectangle is fully covered by the larger, 0.0 when
/// disjoint or when either rectangle has zero area.
#[inline]
pub fn overlap_ratio(a: &Rect<f64>, b: &Rect<f64>) -> f64 {
    let min_area = (a.width() * a.height()).min(b.width() * b.height());
    if min_area <= 0.0 {
        return 0.0;
    }
    intersection_area(a, b) / min_area
}

/// Bounding box of a list of coordinates
///
/// Returns `None` for an empty list. A single coordinate yields a zero-area
/// box at that location.
pub fn bounds_of_coords(coords: &[Coord<f64>]) -> Option<Rect<f64>> {
    if coords.is_empty() {
        return None;
    }

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for coord in coords {
        min_x = min_x.min(coord.x);
        min_y = min_y.min(coord.y);
        max_x = max_x.max(coord.x);
        max_y = max_y.max(coord.y);
    }

    Some(Rect::new(
        Coord { x: min_x, y: min_y },
        Coord { x: max_x, y: max_y },
    ))
}
