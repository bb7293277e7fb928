//! Board state: every element on the shared canvas, keyed by id.

use crate::shapes::{Element, ElementId};
use kurbo::Point;
use std::collections::BTreeMap;

/// Outcome of writing an element into the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The id was new; the board grew by one.
    Inserted,
    /// An element with this id was replaced.
    Replaced,
    /// The identical element was already present.
    Unchanged,
}

/// The collection of all elements.
///
/// Elements are stored by id, decoupled from the allocator that hands out
/// new ids. Iteration is in ascending id order, which is creation order for
/// a single writer.
#[derive(Debug, Clone, Default)]
pub struct Board {
    /// All elements, keyed by id.
    elements: BTreeMap<ElementId, Element>,
    /// Next id the allocator will consider.
    next_id: ElementId,
    /// Local stroke in progress. Not part of the shared element set and
    /// never holds an allocated id.
    preview: Option<Element>,
    /// Bumped on every change; lets callers detect redraw needs.
    revision: u64,
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id not yet present on the board.
    pub fn allocate_id(&mut self) -> ElementId {
        while self.elements.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The id the allocator will try next.
    pub fn next_id(&self) -> ElementId {
        self.next_id
    }

    /// Insert or replace an element by id.
    pub fn upsert(&mut self, element: Element) -> Upsert {
        let id = element.id();
        self.next_id = self.next_id.max(id.saturating_add(1));

        match self.elements.get_mut(&id) {
            Some(existing) if *existing == element => Upsert::Unchanged,
            Some(existing) => {
                *existing = element;
                self.revision += 1;
                Upsert::Replaced
            }
            None => {
                self.elements.insert(id, element);
                self.revision += 1;
                Upsert::Inserted
            }
        }
    }

    /// Replace the local stroke preview.
    pub(crate) fn set_preview(&mut self, preview: Option<Element>) {
        if self.preview != preview {
            self.preview = preview;
            self.revision += 1;
        }
    }

    /// The local stroke in progress, if any.
    pub fn preview(&self) -> Option<&Element> {
        self.preview.as_ref()
    }

    /// Get an element by id.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Elements in board order (ascending id).
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// Elements to draw: the board in order, then the local preview on top.
    pub fn visible(&self) -> impl Iterator<Item = &Element> {
        self.elements.values().chain(self.preview.as_ref())
    }

    /// Find the most recently created element whose bounds contain `point`.
    pub fn element_at(&self, point: Point) -> Option<&Element> {
        self.elements.values().rev().find(|e| e.contains_point(point))
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Change counter, incremented by every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ElementKind;

    fn rect(id: ElementId, x0: f64, y0: f64, x1: f64, y1: f64) -> Element {
        Element::new(id, ElementKind::Rectangle, Point::new(x0, y0), Point::new(x1, y1))
    }

    #[test]
    fn test_board_creation() {
        let board = Board::new();
        assert!(board.is_empty());
        assert_eq!(board.next_id(), 0);
    }

    #[test]
    fn test_allocate_is_monotonic() {
        let mut board = Board::new();
        assert_eq!(board.allocate_id(), 0);
        assert_eq!(board.allocate_id(), 1);
        assert_eq!(board.allocate_id(), 2);
        assert!(board.is_empty());
    }

    #[test]
    fn test_upsert_insert_then_replace() {
        let mut board = Board::new();
        assert_eq!(board.upsert(rect(0, 0.0, 0.0, 10.0, 10.0)), Upsert::Inserted);
        assert_eq!(board.len(), 1);

        assert_eq!(board.upsert(rect(0, 0.0, 0.0, 20.0, 20.0)), Upsert::Replaced);
        assert_eq!(board.len(), 1);
        assert_eq!(board.get(0).unwrap().extent(), Point::new(20.0, 20.0));

        assert_eq!(board.upsert(rect(0, 0.0, 0.0, 20.0, 20.0)), Upsert::Unchanged);
    }

    #[test]
    fn test_remote_id_bumps_allocator() {
        let mut board = Board::new();
        board.upsert(rect(5, 0.0, 0.0, 1.0, 1.0));
        assert_eq!(board.allocate_id(), 6);
    }

    #[test]
    fn test_allocate_skips_present_ids() {
        let mut board = Board::new();
        let reserved = board.allocate_id();
        assert_eq!(reserved, 0);
        board.upsert(rect(1, 0.0, 0.0, 1.0, 1.0));
        assert_eq!(board.allocate_id(), 2);
    }

    #[test]
    fn test_element_at_prefers_most_recent() {
        let mut board = Board::new();
        board.upsert(rect(0, 0.0, 0.0, 100.0, 100.0));
        board.upsert(rect(1, 50.0, 50.0, 150.0, 150.0));

        assert_eq!(board.element_at(Point::new(75.0, 75.0)).unwrap().id(), 1);
        assert_eq!(board.element_at(Point::new(10.0, 10.0)).unwrap().id(), 0);
        assert!(board.element_at(Point::new(200.0, 200.0)).is_none());
    }

    #[test]
    fn test_revision_tracks_changes() {
        let mut board = Board::new();
        let r0 = board.revision();
        board.upsert(rect(0, 0.0, 0.0, 1.0, 1.0));
        let r1 = board.revision();
        assert!(r1 > r0);
        board.upsert(rect(0, 0.0, 0.0, 1.0, 1.0));
        assert_eq!(board.revision(), r1);
        let stroke = Element::freehand(1, vec![Point::ZERO, Point::new(1.0, 1.0)]);
        board.set_preview(Some(stroke.clone()));
        let r2 = board.revision();
        assert!(r2 > r1);
        board.set_preview(Some(stroke));
        assert_eq!(board.revision(), r2);
        board.set_preview(None);
        assert!(board.revision() > r2);
    }

    #[test]
    fn test_preview_stays_out_of_the_element_set() {
        let mut board = Board::new();
        board.upsert(rect(0, 0.0, 0.0, 1.0, 1.0));
        board.set_preview(Some(Element::freehand(
            board.next_id(),
            vec![Point::new(5.0, 5.0), Point::new(6.0, 6.0)],
        )));

        assert_eq!(board.len(), 1);
        assert!(!board.contains(1));
        assert!(board.element_at(Point::new(5.5, 5.5)).is_none());
        assert_eq!(board.visible().count(), 2);
        assert_eq!(board.allocate_id(), 1);
        assert_eq!(board, {
            let mut plain = Board::new();
            plain.upsert(rect(0, 0.0, 0.0, 1.0, 1.0));
            plain
        });
    }

    #[test]
    fn test_elements_in_id_order() {
        let mut board = Board::new();
        board.upsert(rect(2, 0.0, 0.0, 1.0, 1.0));
        board.upsert(rect(0, 0.0, 0.0, 1.0, 1.0));
        board.upsert(rect(1, 0.0, 0.0, 1.0, 1.0));
        let ids: Vec<_> = board.elements().map(|e| e.id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
