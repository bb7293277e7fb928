//! Applies relayed mutations to the local board.
//!
//! The merge policy is last-write-wins by id with unconditional overwrite.
//! There are no version vectors or timestamps: concurrent writes to one id
//! converge in relay arrival order. Applying a message is idempotent, so a
//! relay echoing our own messages back is harmless.

use crate::board::{Board, Upsert};
use crate::sync::{SyncError, SyncMessage};

/// Result of reconciling one message.
pub type Reconciled = Upsert;

/// Apply an inbound Create or Update.
///
/// Both kinds are handled the same way: an unknown id is inserted, a known
/// id is overwritten.
pub fn reconcile(board: &mut Board, message: &SyncMessage) -> Reconciled {
    let id = message.element.id();
    let outcome = board.upsert(message.element.clone());
    log::trace!("Reconciled {:?} for element {}: {:?}", message.kind, id, outcome);
    outcome
}

/// Decode a raw mutation payload and apply it.
///
/// Malformed payloads leave the board untouched.
pub fn reconcile_json(board: &mut Board, payload: &str) -> Result<Reconciled, SyncError> {
    let message: SyncMessage = serde_json::from_str(payload)
        .map_err(|e| SyncError::MalformedMessage(e.to_string()))?;
    Ok(reconcile(board, &message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Element, ElementKind};
    use kurbo::Point;

    fn rect(id: u64, x1: f64, y1: f64) -> Element {
        Element::new(id, ElementKind::Rectangle, Point::new(0.0, 0.0), Point::new(x1, y1))
    }

    #[test]
    fn test_create_appends() {
        let mut board = Board::new();
        assert_eq!(reconcile(&mut board, &SyncMessage::create(rect(0, 5.0, 5.0))), Upsert::Inserted);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_create_with_known_id_replaces_in_place() {
        let mut board = Board::new();
        reconcile(&mut board, &SyncMessage::create(rect(0, 5.0, 5.0)));
        reconcile(&mut board, &SyncMessage::create(rect(1, 6.0, 6.0)));

        let outcome = reconcile(&mut board, &SyncMessage::create(rect(0, 9.0, 9.0)));
        assert_eq!(outcome, Upsert::Replaced);
        assert_eq!(board.len(), 2);
        assert_eq!(board.get(0).unwrap().extent(), Point::new(9.0, 9.0));
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut once = Board::new();
        let mut twice = Board::new();
        reconcile(&mut once, &SyncMessage::create(rect(0, 1.0, 1.0)));
        reconcile(&mut twice, &SyncMessage::create(rect(0, 1.0, 1.0)));

        let update = SyncMessage::update(rect(0, 30.0, 20.0));
        reconcile(&mut once, &update);
        reconcile(&mut twice, &update);
        assert_eq!(reconcile(&mut twice, &update), Upsert::Unchanged);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_update_before_create_appends() {
        let mut board = Board::new();
        let update = SyncMessage::update(rect(0, 50.0, 40.0));
        assert_eq!(reconcile(&mut board, &update), Upsert::Inserted);
        assert_eq!(board.len(), 1);
        assert_eq!(*board.get(0).unwrap(), update.element);
    }

    #[test]
    fn test_last_write_wins() {
        let mut board = Board::new();
        reconcile(&mut board, &SyncMessage::update(rect(3, 10.0, 10.0)));
        reconcile(&mut board, &SyncMessage::update(rect(3, 70.0, 70.0)));
        assert_eq!(board.get(3).unwrap().extent(), Point::new(70.0, 70.0));
    }

    #[test]
    fn test_reconcile_json_rejects_malformed() {
        let mut board = Board::new();
        let bad = [
            r#"{"kind":"create"}"#,
            r#"{"kind":"delete","element":{"id":0,"type":"line","x1":0,"y1":0,"x2":1,"y2":1}}"#,
            r#"{"kind":"create","element":{"id":0,"type":"hexagon","x1":0,"y1":0,"x2":1,"y2":1}}"#,
            r#"{"kind":"create","element":{"type":"line","x1":0,"y1":0,"x2":1,"y2":1}}"#,
        ];
        for payload in bad {
            assert!(matches!(
                reconcile_json(&mut board, payload),
                Err(SyncError::MalformedMessage(_))
            ));
        }
        assert!(board.is_empty());

        let good = r#"{"kind":"create","element":{"id":0,"type":"line","x1":0,"y1":0,"x2":1,"y2":1}}"#;
        assert_eq!(reconcile_json(&mut board, good).unwrap(), Upsert::Inserted);
    }
}
