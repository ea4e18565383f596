//! Annotation data model
//!
//! An annotation is a labeled geometric region over an image: an axis-aligned
//! rectangle or an arbitrary polygon, identified by a stable unique id and
//! carrying a reference to its label. Geometry is a closed sum type matched
//! exhaustively at every consuming site (bounding box computation, rendering,
//! point containment).

use crate::bounds;
use geo::{Contains, Coord, LineString, Point, Polygon, Rect};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable unique identifier of an annotation
pub type AnnotationId = String;

/// Closed geometry sum type
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Geometry {
    /// Axis-aligned rectangle in world coordinates
    Rect(Rect<f64>),
    /// Ordered vertex list in world coordinates. Fewer than 3 points is
    /// degenerate: never rendered, never an error.
    Polygon(Vec<Coord<f64>>),
}

impl Geometry {
    /// Bounding box of the geometry in world coordinates
    ///
    /// Returns `None` only for a polygon with no points, which has no
    /// location at all and cannot be indexed.
    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        match self {
            Self::Rect(rect) => Some(*rect),
            Self::Polygon(points) => bounds::bounds_of_coords(points),
        }
    }

    /// Whether this geometry renders nothing
    ///
    /// Degenerate shapes (polygon with fewer than 3 points, zero-area
    /// rectangle) are skipped by the render pass rather than rejected.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Self::Rect(rect) => rect.width() <= 0.0 || rect.height() <= 0.0,
            Self::Polygon(points) => points.len() < 3,
        }
    }

    /// Exact point containment test in world coordinates
    ///
    /// Rectangles test boundary-inclusive; polygons use the interior test
    /// from the `geo` crate. Degenerate polygons contain nothing.
    pub fn contains_point(&self, coord: Coord<f64>) -> bool {
        match self {
            Self::Rect(rect) => bounds::rect_contains_coord(rect, coord),
            Self::Polygon(points) => {
                if points.len() < 3 {
                    return false;
                }
                let polygon = Polygon::new(LineString::from(points.clone()), Vec::new());
                polygon.contains(&Point::new(coord.x, coord.y))
            }
        }
    }
}

/// A labeled geometric region over an image
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Annotation {
    /// Stable unique id
    pub id: AnnotationId,
    /// Shape in world coordinates
    pub geometry: Geometry,
    /// Reference to the label this annotation carries
    pub label_id: String,
}

impl Annotation {
    /// Create a new annotation
    pub fn new(
        id: impl Into<AnnotationId>,
        geometry: Geometry,
        label_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            geometry,
            label_id: label_id.into(),
        }
    }

    /// Shorthand for a rectangle annotation
    pub fn rect(
        id: impl Into<AnnotationId>,
        label_id: impl Into<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Self::new(
            id,
            Geometry::Rect(Rect::new(
                Coord { x, y },
                Coord {
                    x: x + width,
                    y: y + height,
                },
            )),
            label_id,
        )
    }

    /// Shorthand for a polygon annotation
    pub fn polygon(
        id: impl Into<AnnotationId>,
        label_id: impl Into<String>,
        points: impl IntoIterator<Item = (f64, f64)>,
    ) -> Self {
        let points = points
            .into_iter()
            .map(|(x, y)| Coord { x, y })
            .collect::<Vec<_>>();
        Self::new(id, Geometry::Polygon(points), label_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_bounding_box() {
        let ann = Annotation::rect("a", "label-1", 10.0, 20.0, 30.0, 40.0);
        let bbox = ann.geometry.bounding_box().unwrap();
        assert_eq!(bbox.min(), Coord { x: 10.0, y: 20.0 });
        assert_eq!(bbox.max(), Coord { x: 40.0, y: 60.0 });
    }

    #[test]
    fn test_polygon_bounding_box() {
        let ann = Annotation::polygon("p", "label-1", [(0.0, 0.0), (10.0, 0.0), (5.0, 8.0)]);
        let bbox = ann.geometry.bounding_box().unwrap();
        assert_eq!(bbox.width(), 10.0);
        assert_eq!(bbox.height(), 8.0);
    }

    #[test]
    fn test_empty_polygon_has_no_bbox() {
        let geometry = Geometry::Polygon(Vec::new());
        assert!(geometry.bounding_box().is_none());
        assert!(geometry.is_degenerate());
    }

    #[test]
    fn test_degenerate_geometry() {
        // Polygon with fewer than 3 points
        let two_points = Annotation::polygon("p", "l", [(0.0, 0.0), (1.0, 1.0)]);
        assert!(two_points.geometry.is_degenerate());

        // Zero-area rectangle
        let flat = Annotation::rect("r", "l", 0.0, 0.0, 10.0, 0.0);
        assert!(flat.geometry.is_degenerate());

        // Valid shapes are not degenerate
        let triangle = Annotation::polygon("t", "l", [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert!(!triangle.geometry.is_degenerate());
        let square = Annotation::rect("s", "l", 0.0, 0.0, 1.0, 1.0);
        assert!(!square.geometry.is_degenerate());
    }

    #[test]
    fn test_rect_contains_point() {
        let ann = Annotation::rect("r", "l", 0.0, 0.0, 10.0, 10.0);
        assert!(ann.geometry.contains_point(Coord { x: 5.0, y: 5.0 }));
        assert!(ann.geometry.contains_point(Coord { x: 0.0, y: 0.0 }));
        assert!(!ann.geometry.contains_point(Coord { x: 11.0, y: 5.0 }));
    }

    #[test]
    fn test_polygon_contains_point() {
        // Concave L-shape: the notch at the top right is outside
        let ann = Annotation::polygon(
            "l-shape",
            "l",
            [
                (0.0, 0.0),
                (10.0, 0.0),
                (10.0, 5.0),
                (5.0, 5.0),
                (5.0, 10.0),
                (0.0, 10.0),
            ],
        );
        assert!(ann.geometry.contains_point(Coord { x: 2.0, y: 2.0 }));
        assert!(ann.geometry.contains_point(Coord { x: 8.0, y: 2.0 }));
        assert!(!ann.geometry.contains_point(Coord { x: 8.0, y: 8.0 }));

        // Degenerate polygon contains nothing
        let line = Annotation::polygon("line", "l", [(0.0, 0.0), (10.0, 10.0)]);
        assert!(!line.geometry.contains_point(Coord { x: 5.0, y: 5.0 }));
    }

    #[test]
    fn test_value_equality() {
        let a = Annotation::rect("x", "label-1", 0.0, 0.0, 5.0, 5.0);
        let b = Annotation::rect("x", "label-1", 0.0, 0.0, 5.0, 5.0);
        assert_eq!(a, b);

        // Geometry difference
        let moved = Annotation::rect("x", "label-1", 1.0, 0.0, 5.0, 5.0);
        assert_ne!(a, moved);

        // Label difference
        let relabeled = Annotation::rect("x", "label-2", 0.0, 0.0, 5.0, 5.0);
        assert_ne!(a, relabeled);
    }
}
