//! Element definitions for the shared board.
//!
//! An [`Element`] is replaced rather than mutated: every change produces a new
//! element whose geometry is rebuilt from its defining fields.

mod geometry;

pub use geometry::Geometry;

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of an element, stable for its lifetime.
pub type ElementId = u64;

/// Element model errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElementError {
    #[error("Invalid element type: {0}")]
    InvalidElementType(String),
}

/// The primitive an element draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Line,
    Rectangle,
    Circle,
    Freehand,
}

impl ElementKind {
    /// Wire name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Line => "line",
            ElementKind::Rectangle => "rectangle",
            ElementKind::Circle => "circle",
            ElementKind::Freehand => "freehand",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementKind {
    type Err = ElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "line" => Ok(ElementKind::Line),
            "rectangle" => Ok(ElementKind::Rectangle),
            "circle" => Ok(ElementKind::Circle),
            "freehand" => Ok(ElementKind::Freehand),
            other => Err(ElementError::InvalidElementType(other.to_string())),
        }
    }
}

/// One drawing primitive on the board.
///
/// `anchor` and `extent` define lines, rectangles and circles. Freehand
/// elements keep both at the origin and draw through `points` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ElementRecord", into = "ElementRecord")]
pub struct Element {
    id: ElementId,
    kind: ElementKind,
    anchor: Point,
    extent: Point,
    points: Vec<Point>,
    geometry: Geometry,
}

impl Element {
    /// Create a two-point element. A freehand kind yields an empty stroke.
    pub fn new(id: ElementId, kind: ElementKind, anchor: Point, extent: Point) -> Self {
        match kind {
            ElementKind::Freehand => Self::freehand(id, Vec::new()),
            _ => Self::build(id, kind, anchor, extent, Vec::new()),
        }
    }

    /// Create a freehand element from an ordered point sequence.
    pub fn freehand(id: ElementId, points: Vec<Point>) -> Self {
        Self::build(id, ElementKind::Freehand, Point::ZERO, Point::ZERO, points)
    }

    fn build(
        id: ElementId,
        kind: ElementKind,
        anchor: Point,
        extent: Point,
        points: Vec<Point>,
    ) -> Self {
        let geometry = Geometry::compute(kind, anchor, extent, &points);
        Self {
            id,
            kind,
            anchor,
            extent,
            points,
            geometry,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn extent(&self) -> Point {
        self.extent
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Derived renderable geometry.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Path representation for rendering.
    pub fn to_path(&self) -> kurbo::BezPath {
        self.geometry.to_path()
    }

    /// Replacement element with a new extent. Freehand elements are returned unchanged.
    pub fn with_extent(&self, extent: Point) -> Self {
        match self.kind {
            ElementKind::Freehand => self.clone(),
            kind => Self::build(self.id, kind, self.anchor, extent, Vec::new()),
        }
    }

    /// Replacement element moved by `delta`.
    pub fn translated(&self, delta: Vec2) -> Self {
        match self.kind {
            ElementKind::Freehand => {
                Self::freehand(self.id, self.points.iter().map(|p| *p + delta).collect())
            }
            kind => Self::build(
                self.id,
                kind,
                self.anchor + delta,
                self.extent + delta,
                Vec::new(),
            ),
        }
    }

    /// Axis-aligned bounding box used for hit testing.
    ///
    /// Two-point elements span min/max of anchor and extent (a circle's rim is
    /// deliberately not included). Freehand elements span their points and have
    /// no bounds while empty.
    pub fn bounds(&self) -> Option<Rect> {
        match self.kind {
            ElementKind::Freehand => {
                let first = self.points.first()?;
                let start = Rect::from_points(*first, *first);
                Some(
                    self.points
                        .iter()
                        .skip(1)
                        .fold(start, |rect, p| rect.union_pt(*p)),
                )
            }
            _ => Some(Rect::from_points(self.anchor, self.extent)),
        }
    }

    /// Check whether `point` lies inside the bounding box, edges included.
    pub fn contains_point(&self, point: Point) -> bool {
        self.bounds().is_some_and(|b| {
            point.x >= b.x0 && point.x <= b.x1 && point.y >= b.y0 && point.y <= b.y1
        })
    }
}

/// Build an element from an element type name.
///
/// Fails with [`ElementError::InvalidElementType`] for names outside
/// `line`, `rectangle`, `circle` and `freehand`.
pub fn make_element(
    anchor: Point,
    extent: Point,
    kind: &str,
    id: ElementId,
) -> Result<Element, ElementError> {
    let kind = kind.parse::<ElementKind>()?;
    Ok(Element::new(id, kind, anchor, extent))
}

/// Wire form of an element: `{id, type, x1, y1, x2, y2, points?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ElementRecord {
    id: ElementId,
    #[serde(rename = "type")]
    kind: String,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    points: Vec<Point>,
}

impl TryFrom<ElementRecord> for Element {
    type Error = ElementError;

    fn try_from(record: ElementRecord) -> Result<Self, Self::Error> {
        let kind = record.kind.parse::<ElementKind>()?;
        Ok(match kind {
            ElementKind::Freehand => Element::freehand(record.id, record.points),
            kind => Element::new(
                record.id,
                kind,
                Point::new(record.x1, record.y1),
                Point::new(record.x2, record.y2),
            ),
        })
    }
}

impl From<Element> for ElementRecord {
    fn from(element: Element) -> Self {
        Self {
            id: element.id,
            kind: element.kind.name().to_string(),
            x1: element.anchor.x,
            y1: element.anchor.y,
            x2: element.extent.x,
            y2: element.extent.y,
            points: element.points,
        }
    }
}
