//! Renderable geometry derived from element fields.

use super::ElementKind;
use kurbo::{BezPath, Circle, Line, Point, Rect, Shape as KurboShape};

/// Flattening tolerance used when converting curves to paths.
const PATH_TOLERANCE: f64 = 0.1;

/// Renderable form of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Line(Line),
    Rect(Rect),
    Circle(Circle),
    Path(BezPath),
}

impl Geometry {
    /// Derive geometry from the defining fields of an element.
    pub(crate) fn compute(kind: ElementKind, anchor: Point, extent: Point, points: &[Point]) -> Self {
        match kind {
            ElementKind::Line => Geometry::Line(Line::new(anchor, extent)),
            ElementKind::Rectangle => Geometry::Rect(Rect::from_points(anchor, extent)),
            ElementKind::Circle => Geometry::Circle(Circle::new(anchor, anchor.distance(extent))),
            ElementKind::Freehand => Geometry::Path(polyline(points)),
        }
    }

    /// Path representation for rendering.
    pub fn to_path(&self) -> BezPath {
        match self {
            Geometry::Line(line) => {
                let mut path = BezPath::new();
                path.move_to(line.p0);
                path.line_to(line.p1);
                path
            }
            Geometry::Rect(rect) => rect.to_path(PATH_TOLERANCE),
            Geometry::Circle(circle) => circle.to_path(PATH_TOLERANCE),
            Geometry::Path(path) => path.clone(),
        }
    }
}

/// Move to the first point, then line to each subsequent one.
fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();

    let Some((first, rest)) = points.split_first() else {
        return path;
    };

    path.move_to(*first);
    for point in rest {
        path.line_to(*point);
    }

    path
}
