//! Level-of-detail selection and per-tier render policy
//!
//! The tier is a pure function of the current zoom, selected by descending
//! thresholds. Each tier carries a visibility gate (minimum on-screen size)
//! and a draw policy describing what the render backend should paint:
//!
//! - `Full` — exact geometry, full stroke width, full fill alpha
//! - `Medium` — halved stroke width; polygons above a configurable point
//!   count degrade to their bounding rectangle
//! - `Low` — bounding-box fill only, no stroke
//! - `Minimal` — fixed-size marker at the bbox centroid, ignoring geometry
//! - `Hidden` — nothing
//!
//! The policy is monotone: for a fixed bbox and scale, increasing zoom never
//! decreases the selected tier's fidelity rank.

use crate::annotation::Geometry;
use geo::{Coord, Rect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Detail tier, ordered by fidelity rank (`Hidden` lowest, `Full` highest)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LodTier {
    Hidden,
    Minimal,
    Low,
    Medium,
    Full,
}

impl LodTier {
    /// Fidelity rank, higher is more detailed
    #[inline]
    pub fn fidelity_rank(self) -> u8 {
        self as u8
    }

    /// Minimum on-screen size in pixels below which this tier renders nothing
    #[inline]
    fn min_screen_px(self) -> f64 {
        match self {
            Self::Hidden => f64::INFINITY,
            Self::Minimal => 2.0,
            Self::Low => 4.0,
            Self::Medium => 8.0,
            Self::Full => 0.0,
        }
    }
}

/// Level-of-detail configuration
///
/// The zoom thresholds are descending cut-offs, not fixed law; hosts tune
/// them per deployment. Defaults match a scene where zoom 1.0 maps one world
/// unit to one screen pixel.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LodConfig {
    /// Zoom at or above which everything renders exactly
    pub full_zoom: f64,
    /// Zoom at or above which geometry renders with reduced stroke
    pub medium_zoom: f64,
    /// Zoom at or above which only bounding boxes render
    pub low_zoom: f64,
    /// Zoom at or above which only centroid markers render
    pub minimal_zoom: f64,
    /// Polygons with more points than this degrade to their bounding
    /// rectangle at the `Medium` tier
    pub polygon_point_threshold: usize,
    /// Stroke width at the `Full` tier, in pixels
    pub base_stroke_width: f64,
    /// Side length of the `Minimal` tier centroid marker, in pixels
    pub marker_size_px: f64,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            full_zoom: 0.5,
            medium_zoom: 0.3,
            low_zoom: 0.15,
            minimal_zoom: 0.08,
            polygon_point_threshold: 64,
            base_stroke_width: 2.0,
            marker_size_px: 3.0,
        }
    }
}

/// Geometry resolved for drawing at a specific tier
#[derive(Clone, Debug, PartialEq)]
pub enum DrawGeometry {
    /// Exact rectangle, or a bounding box standing in for richer geometry
    Rect(Rect<f64>),
    /// Exact polygon outline
    Polygon(Vec<Coord<f64>>),
    /// Fixed-size square marker at the bbox centroid
    Marker {
        center: Coord<f64>,
        size_px: f64,
    },
}

/// Minimal style parameters the backend needs to paint an annotation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawStyle {
    /// Stroke width in pixels; 0.0 means no stroke
    pub stroke_width: f64,
    /// Fill alpha multiplier applied to the label's base fill
    pub fill_alpha: f64,
}

/// Select the detail tier for the given zoom
///
/// Descending threshold walk; the first threshold met wins.
pub fn select_tier(config: &LodConfig, zoom: f64) -> LodTier {
    if zoom >= config.full_zoom {
        LodTier::Full
    } else if zoom >= config.medium_zoom {
        LodTier::Medium
    } else if zoom >= config.low_zoom {
        LodTier::Low
    } else if zoom >= config.minimal_zoom {
        LodTier::Minimal
    } else {
        LodTier::Hidden
    }
}

/// Whether a shape is large enough on screen to be worth drawing at a tier
///
/// The on-screen size is `max(width, height) * world_to_screen_scale * zoom`,
/// compared against the tier's minimum pixel threshold. `Full` always
/// renders, `Hidden` never does.
pub fn should_render(
    bbox: &Rect<f64>,
    world_to_screen_scale: f64,
    zoom: f64,
    tier: LodTier,
) -> bool {
    match tier {
        LodTier::Full => true,
        LodTier::Hidden => false,
        tier => {
            let screen_size = bbox.width().max(bbox.height()) * world_to_screen_scale * zoom;
            screen_size >= tier.min_screen_px()
        }
    }
}

/// Style parameters for a tier
pub fn style_for(config: &LodConfig, tier: LodTier) -> DrawStyle {
    match tier {
        LodTier::Full => DrawStyle {
            stroke_width: config.base_stroke_width,
            fill_alpha: 1.0,
        },
        LodTier::Medium => DrawStyle {
            stroke_width: config.base_stroke_width / 2.0,
            fill_alpha: 1.0,
        },
        LodTier::Low | LodTier::Minimal => DrawStyle {
            stroke_width: 0.0,
            fill_alpha: 1.0,
        },
        LodTier::Hidden => DrawStyle {
            stroke_width: 0.0,
            fill_alpha: 0.0,
        },
    }
}

/// Resolve the geometry to draw for an annotation at a tier
///
/// Returns `None` at the `Hidden` tier and for geometry with no location
/// (empty polygon).
pub fn resolve_geometry(
    config: &LodConfig,
    tier: LodTier,
    geometry: &Geometry,
) -> Option<DrawGeometry> {
    let bbox = geometry.bounding_box()?;
    match tier {
        LodTier::Hidden => None,
        LodTier::Minimal => Some(DrawGeometry::Marker {
            center: bbox.center(),
            size_px: config.marker_size_px,
        }),
        LodTier::Low => Some(DrawGeometry::Rect(bbox)),
        LodTier::Medium => Some(match geometry {
            Geometry::Rect(rect) => DrawGeometry::Rect(*rect),
            Geometry::Polygon(points) if points.len() > config.polygon_point_threshold => {
                DrawGeometry::Rect(bbox)
            }
            Geometry::Polygon(points) => DrawGeometry::Polygon(points.clone()),
        }),
        LodTier::Full => Some(match geometry {
            Geometry::Rect(rect) => DrawGeometry::Rect(*rect),
            Geometry::Polygon(points) => DrawGeometry::Polygon(points.clone()),
        }),
    }
}
