//! Tool system: turns pointer input into board mutations.
//!
//! [`MutationEngine`] is an explicit state machine over
//! [`InteractionState`]. Every handler takes the board by `&mut` and returns
//! the [`SyncMessage`] to publish, if any.
//!
//! Freehand strokes are buffered locally and published once on release,
//! while the other drawing tools and moves publish on every pointer move.
//! The two paths are intentionally kept as they are.

use crate::board::Board;
use crate::shapes::{Element, ElementError, ElementId, ElementKind};
use crate::sync::SyncMessage;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Selection,
    #[default]
    Line,
    Rectangle,
    Circle,
    Freehand,
}

impl ToolKind {
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Selection => "selection",
            ToolKind::Line => "line",
            ToolKind::Rectangle => "rectangle",
            ToolKind::Circle => "circle",
            ToolKind::Freehand => "freehand",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognized tool name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown tool: {0}")]
pub struct UnknownTool(pub String);

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "selection" | "select" => Ok(ToolKind::Selection),
            "line" => Ok(ToolKind::Line),
            "rectangle" | "rect" => Ok(ToolKind::Rectangle),
            "circle" => Ok(ToolKind::Circle),
            "freehand" | "pencil" => Ok(ToolKind::Freehand),
            other => Err(UnknownTool(other.to_string())),
        }
    }
}

impl TryFrom<ToolKind> for ElementKind {
    type Error = ElementError;

    fn try_from(tool: ToolKind) -> Result<Self, Self::Error> {
        match tool {
            ToolKind::Line => Ok(ElementKind::Line),
            ToolKind::Rectangle => Ok(ElementKind::Rectangle),
            ToolKind::Circle => Ok(ElementKind::Circle),
            ToolKind::Freehand => Ok(ElementKind::Freehand),
            ToolKind::Selection => Err(ElementError::InvalidElementType(tool.name().to_string())),
        }
    }
}

/// Local mutation errors. Each one aborts the current interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error(transparent)]
    Element(#[from] ElementError),
    #[error("Element {0} is not on the board")]
    UnknownElement(ElementId),
}

/// State of a pointer interaction. Never transmitted.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    /// Waiting for a press.
    #[default]
    Idle,
    /// Drawing a line, rectangle or circle.
    Drawing {
        tool: ToolKind,
        /// Id of the element being drawn.
        id: ElementId,
        /// Press position.
        anchor: Point,
    },
    /// Recording a freehand stroke. The id is allocated on release.
    Sketching { points: Vec<Point> },
    /// Dragging a selected element.
    Moving {
        id: ElementId,
        /// Pointer position of the previous step.
        drag_start: Point,
    },
}

/// Drives the interaction state machine.
#[derive(Debug, Clone, Default)]
pub struct MutationEngine {
    tool: ToolKind,
    state: InteractionState,
}

impl MutationEngine {
    /// Create a new engine with the default tool.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, InteractionState::Idle)
    }

    /// Id of the element being drawn or moved.
    pub fn active_element(&self) -> Option<ElementId> {
        match self.state {
            InteractionState::Idle | InteractionState::Sketching { .. } => None,
            InteractionState::Drawing { id, .. } | InteractionState::Moving { id, .. } => Some(id),
        }
    }

    /// Switch tools. An interaction in progress is finalized first.
    pub fn set_tool(
        &mut self,
        board: &mut Board,
        tool: ToolKind,
    ) -> Result<Option<SyncMessage>, MutationError> {
        let finalized = if self.is_idle() {
            None
        } else {
            self.pointer_up(board)?
        };
        self.tool = tool;
        Ok(finalized)
    }

    /// Handle a pointer press.
    pub fn pointer_down(
        &mut self,
        board: &mut Board,
        point: Point,
    ) -> Result<Option<SyncMessage>, MutationError> {
        if !self.is_idle() {
            log::warn!("Press during {:?}; abandoning previous interaction", self.state);
            self.abandon(board);
        }
        let result = self.press(board, point);
        self.settle(board, result)
    }

    /// Handle a pointer move.
    pub fn pointer_move(
        &mut self,
        board: &mut Board,
        point: Point,
    ) -> Result<Option<SyncMessage>, MutationError> {
        let result = self.drag(board, point);
        self.settle(board, result)
    }

    /// Handle a pointer release. Always returns to idle.
    pub fn pointer_up(&mut self, board: &mut Board) -> Result<Option<SyncMessage>, MutationError> {
        let state = std::mem::take(&mut self.state);
        match state {
            InteractionState::Sketching { points } => {
                board.set_preview(None);
                if points.len() > 1 {
                    let element = Element::freehand(board.allocate_id(), points);
                    board.upsert(element.clone());
                    Ok(Some(SyncMessage::create(element)))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn press(&mut self, board: &mut Board, point: Point) -> Result<Option<SyncMessage>, MutationError> {
        match self.tool {
            ToolKind::Selection => {
                if let Some(element) = board.element_at(point) {
                    self.state = InteractionState::Moving {
                        id: element.id(),
                        drag_start: point,
                    };
                }
                Ok(None)
            }
            ToolKind::Freehand => {
                self.state = InteractionState::Sketching { points: Vec::new() };
                Ok(None)
            }
            tool => {
                let kind = ElementKind::try_from(tool)?;
                let id = board.allocate_id();
                let element = Element::new(id, kind, point, point);
                board.upsert(element.clone());
                self.state = InteractionState::Drawing {
                    tool,
                    id,
                    anchor: point,
                };
                Ok(Some(SyncMessage::create(element)))
            }
        }
    }

    fn drag(&mut self, board: &mut Board, point: Point) -> Result<Option<SyncMessage>, MutationError> {
        match &mut self.state {
            InteractionState::Idle => Ok(None),
            InteractionState::Sketching { points } => {
                points.push(point);
                let preview_id = board.next_id();
                board.set_preview(Some(Element::freehand(preview_id, points.clone())));
                Ok(None)
            }
            InteractionState::Drawing { tool, id, anchor } => {
                if !board.contains(*id) {
                    return Err(MutationError::UnknownElement(*id));
                }
                // Rebuilt from the press, so a colliding remote write cannot
                // change what this drag draws.
                let updated = Element::new(*id, ElementKind::try_from(*tool)?, *anchor, point);
                board.upsert(updated.clone());
                Ok(Some(SyncMessage::update(updated)))
            }
            InteractionState::Moving { id, drag_start } => {
                let current = board.get(*id).ok_or(MutationError::UnknownElement(*id))?;
                let updated = current.translated(point - *drag_start);
                board.upsert(updated.clone());
                *drag_start = point;
                Ok(Some(SyncMessage::update(updated)))
            }
        }
    }

    /// Reset to idle on error, clearing any unpublished preview.
    fn settle<T>(
        &mut self,
        board: &mut Board,
        result: Result<T, MutationError>,
    ) -> Result<T, MutationError> {
        if let Err(ref e) = result {
            log::warn!("Interaction aborted: {}", e);
            self.abandon(board);
        }
        result
    }

    fn abandon(&mut self, board: &mut Board) {
        if let InteractionState::Sketching { .. } = std::mem::take(&mut self.state) {
            board.set_preview(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncKind;

    fn engine_with(tool: ToolKind) -> (MutationEngine, Board) {
        let mut engine = MutationEngine::new();
        let mut board = Board::new();
        engine.set_tool(&mut board, tool).unwrap();
        (engine, board)
    }

    #[test]
    fn test_tool_selection() {
        let (engine, _) = engine_with(ToolKind::Circle);
        assert_eq!(engine.tool(), ToolKind::Circle);
        assert!(engine.is_idle());
        assert_eq!(MutationEngine::new().tool(), ToolKind::Line);
    }

    #[test]
    fn test_tool_parse() {
        assert_eq!("rectangle".parse::<ToolKind>().unwrap(), ToolKind::Rectangle);
        assert_eq!("pencil".parse::<ToolKind>().unwrap(), ToolKind::Freehand);
        assert_eq!("lasso".parse::<ToolKind>(), Err(UnknownTool("lasso".to_string())));
    }

    #[test]
    fn test_selection_is_not_an_element_type() {
        assert_eq!(
            ElementKind::try_from(ToolKind::Selection),
            Err(ElementError::InvalidElementType("selection".to_string()))
        );
    }

    #[test]
    fn test_rectangle_drag_scenario() {
        let (mut engine, mut board) = engine_with(ToolKind::Rectangle);
        let mut emitted = Vec::new();

        emitted.extend(engine.pointer_down(&mut board, Point::new(10.0, 10.0)).unwrap());
        assert!(matches!(engine.state(), InteractionState::Drawing { .. }));

        let moves = [Point::new(20.0, 15.0), Point::new(35.0, 30.0), Point::new(50.0, 40.0)];
        for p in moves {
            emitted.extend(engine.pointer_move(&mut board, p).unwrap());
        }
        assert!(engine.pointer_up(&mut board).unwrap().is_none());
        assert!(engine.is_idle());

        assert_eq!(board.len(), 1);
        let element = board.get(0).unwrap();
        assert_eq!(element.kind(), ElementKind::Rectangle);
        assert_eq!(element.anchor(), Point::new(10.0, 10.0));
        assert_eq!(element.extent(), Point::new(50.0, 40.0));

        assert_eq!(emitted.len(), 1 + moves.len());
        assert_eq!(emitted[0].kind, SyncKind::Create);
        assert!(emitted[1..].iter().all(|m| m.kind == SyncKind::Update));
        for (msg, p) in emitted[1..].iter().zip(moves) {
            assert_eq!(msg.element.id(), 0);
            assert_eq!(msg.element.anchor(), Point::new(10.0, 10.0));
            assert_eq!(msg.element.extent(), p);
        }
        assert_eq!(emitted.last().unwrap().element, *element);
    }

    #[test]
    fn test_press_creates_degenerate_element() {
        let (mut engine, mut board) = engine_with(ToolKind::Line);
        let msg = engine.pointer_down(&mut board, Point::new(4.0, 4.0)).unwrap().unwrap();
        assert_eq!(msg.kind, SyncKind::Create);
        assert_eq!(msg.element.anchor(), msg.element.extent());
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_freehand_buffers_without_emitting() {
        let (mut engine, mut board) = engine_with(ToolKind::Freehand);
        assert!(engine.pointer_down(&mut board, Point::new(0.0, 0.0)).unwrap().is_none());

        let points = [Point::new(1.0, 1.0), Point::new(2.0, 3.0), Point::new(4.0, 4.0)];
        for p in points {
            assert!(engine.pointer_move(&mut board, p).unwrap().is_none());
        }
        // Local preview is visible while drawing but holds no id.
        assert!(board.is_empty());
        assert_eq!(board.preview().unwrap().points(), &points);
        assert_eq!(board.next_id(), 0);

        let msg = engine.pointer_up(&mut board).unwrap().expect("stroke published on release");
        assert_eq!(msg.kind, SyncKind::Create);
        assert_eq!(msg.element.id(), 0);
        assert_eq!(msg.element.points(), &points);
        assert_eq!(board.len(), 1);
        assert!(board.preview().is_none());
        assert_eq!(*board.get(msg.element.id()).unwrap(), msg.element);
    }

    #[test]
    fn test_freehand_single_point_is_discarded() {
        let (mut engine, mut board) = engine_with(ToolKind::Freehand);
        engine.pointer_down(&mut board, Point::new(0.0, 0.0)).unwrap();
        engine.pointer_move(&mut board, Point::new(1.0, 1.0)).unwrap();
        assert!(board.preview().is_some());
        assert!(engine.pointer_up(&mut board).unwrap().is_none());
        assert!(board.is_empty());
        assert!(board.preview().is_none());

        engine.pointer_down(&mut board, Point::new(0.0, 0.0)).unwrap();
        assert!(engine.pointer_up(&mut board).unwrap().is_none());
        assert!(board.is_empty());
        assert!(engine.is_idle());
    }

    #[test]
    fn test_move_translates_selected() {
        let mut board = Board::new();
        board.upsert(Element::new(0, ElementKind::Rectangle, Point::new(0.0, 0.0), Point::new(10.0, 10.0)));
        let mut engine = MutationEngine::new();
        engine.set_tool(&mut board, ToolKind::Selection).unwrap();

        assert!(engine.pointer_down(&mut board, Point::new(5.0, 5.0)).unwrap().is_none());
        assert_eq!(engine.active_element(), Some(0));

        let first = engine.pointer_move(&mut board, Point::new(7.0, 6.0)).unwrap().unwrap();
        assert_eq!(first.kind, SyncKind::Update);
        assert_eq!(first.element.anchor(), Point::new(2.0, 1.0));

        let second = engine.pointer_move(&mut board, Point::new(10.0, 10.0)).unwrap().unwrap();
        assert_eq!(second.element.anchor(), Point::new(5.0, 5.0));
        assert_eq!(second.element.extent(), Point::new(15.0, 15.0));
        assert_eq!(*board.get(0).unwrap(), second.element);

        engine.pointer_up(&mut board).unwrap();
        assert!(engine.is_idle());
    }

    #[test]
    fn test_selection_miss_stays_idle() {
        let mut board = Board::new();
        board.upsert(Element::new(0, ElementKind::Line, Point::new(0.0, 0.0), Point::new(10.0, 10.0)));
        let mut engine = MutationEngine::new();
        engine.set_tool(&mut board, ToolKind::Selection).unwrap();

        engine.pointer_down(&mut board, Point::new(50.0, 50.0)).unwrap();
        assert!(engine.is_idle());
        assert!(engine.pointer_move(&mut board, Point::new(60.0, 60.0)).unwrap().is_none());
    }

    #[test]
    fn test_selection_picks_most_recent_overlap() {
        let mut board = Board::new();
        board.upsert(Element::new(0, ElementKind::Rectangle, Point::new(0.0, 0.0), Point::new(100.0, 100.0)));
        board.upsert(Element::new(1, ElementKind::Circle, Point::new(20.0, 20.0), Point::new(80.0, 80.0)));
        let mut engine = MutationEngine::new();
        engine.set_tool(&mut board, ToolKind::Selection).unwrap();

        engine.pointer_down(&mut board, Point::new(50.0, 50.0)).unwrap();
        assert_eq!(engine.active_element(), Some(1));
    }

    #[test]
    fn test_tool_switch_finalizes_freehand() {
        let (mut engine, mut board) = engine_with(ToolKind::Freehand);
        engine.pointer_down(&mut board, Point::new(0.0, 0.0)).unwrap();
        engine.pointer_move(&mut board, Point::new(1.0, 0.0)).unwrap();
        engine.pointer_move(&mut board, Point::new(2.0, 0.0)).unwrap();

        let msg = engine.set_tool(&mut board, ToolKind::Line).unwrap();
        assert_eq!(msg.unwrap().kind, SyncKind::Create);
        assert!(engine.is_idle());
        assert_eq!(engine.tool(), ToolKind::Line);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_missing_element_aborts_to_idle() {
        let mut board = Board::new();
        let mut engine = MutationEngine::new();
        engine.pointer_down(&mut board, Point::new(0.0, 0.0)).unwrap();
        let id = engine.active_element().unwrap();

        let mut other = Board::new();
        let err = engine.pointer_move(&mut other, Point::new(5.0, 5.0)).unwrap_err();
        assert_eq!(err, MutationError::UnknownElement(id));
        assert!(engine.is_idle());
        assert!(other.is_empty());
    }

    #[test]
    fn test_remote_element_during_stroke_survives() {
        let (mut engine, mut board) = engine_with(ToolKind::Freehand);
        engine.pointer_down(&mut board, Point::new(0.0, 0.0)).unwrap();
        engine.pointer_move(&mut board, Point::new(1.0, 1.0)).unwrap();

        // A peer with the same empty board creates element 0 mid-stroke.
        let remote = Element::new(0, ElementKind::Rectangle, Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        board.upsert(remote.clone());

        engine.pointer_move(&mut board, Point::new(2.0, 2.0)).unwrap();
        let msg = engine.pointer_up(&mut board).unwrap().unwrap();

        assert_eq!(msg.element.id(), 1);
        assert_eq!(board.len(), 2);
        assert_eq!(*board.get(0).unwrap(), remote);
        assert_eq!(board.get(1).unwrap().kind(), ElementKind::Freehand);
    }

    #[test]
    fn test_drag_rebuilds_from_press_after_remote_write() {
        let (mut engine, mut board) = engine_with(ToolKind::Rectangle);
        engine.pointer_down(&mut board, Point::new(10.0, 10.0)).unwrap();

        // Colliding remote write at the in-progress id.
        board.upsert(Element::new(0, ElementKind::Circle, Point::new(90.0, 90.0), Point::new(95.0, 90.0)));

        let msg = engine.pointer_move(&mut board, Point::new(30.0, 40.0)).unwrap().unwrap();
        assert_eq!(msg.element.kind(), ElementKind::Rectangle);
        assert_eq!(msg.element.anchor(), Point::new(10.0, 10.0));
        assert_eq!(msg.element.extent(), Point::new(30.0, 40.0));
        assert_eq!(*board.get(0).unwrap(), msg.element);
    }

    #[test]
    fn test_new_ids_follow_remote_ids() {
        let mut board = Board::new();
        board.upsert(Element::new(7, ElementKind::Line, Point::ZERO, Point::new(1.0, 1.0)));
        let mut engine = MutationEngine::new();
        let msg = engine.pointer_down(&mut board, Point::new(3.0, 3.0)).unwrap().unwrap();
        assert_eq!(msg.element.id(), 8);
        assert_eq!(board.len(), 2);
    }
}
