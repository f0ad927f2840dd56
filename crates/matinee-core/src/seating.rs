//! Seating chart model with invariant-preserving occupancy mutations.
//!
//! A [`SeatingChart`] is a `rows × seats_per_row` grid plus a sparse list of
//! occupied positions. The mutation methods maintain two invariants:
//!
//! - at most one occupancy record per `(row, seat)` position
//! - at most one occupancy record per visitor
//!
//! Callers (the presence registry) serialize all mutations behind a lock;
//! the chart itself is a plain value type that is cheap to snapshot for
//! broadcast.

use serde::{Deserialize, Serialize};

use crate::ids::VisitorId;

/// A seat coordinate within a chart. Zero-based in both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatPosition {
    /// Row index, `0 ≤ row < rows`.
    pub row: u32,
    /// Seat index within the row, `0 ≤ seat < seats_per_row`.
    pub seat: u32,
}

impl SeatPosition {
    /// Create a position from raw coordinates.
    #[must_use]
    pub fn new(row: u32, seat: u32) -> Self {
        Self { row, seat }
    }
}

impl std::fmt::Display for SeatPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.seat)
    }
}

/// An occupancy record: a position plus the visitor holding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupiedSeat {
    /// Row index.
    pub row: u32,
    /// Seat index within the row.
    pub seat: u32,
    /// Holder of the seat.
    pub visitor_id: VisitorId,
}

impl OccupiedSeat {
    /// The position of this record.
    #[must_use]
    pub fn position(&self) -> SeatPosition {
        SeatPosition::new(self.row, self.seat)
    }
}

/// The seating layout and current occupancy of one screening.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatingChart {
    /// Number of rows.
    pub rows: u32,
    /// Seats per row.
    pub seats_per_row: u32,
    /// Sparse list of occupied positions.
    pub occupied: Vec<OccupiedSeat>,
}

impl SeatingChart {
    /// Create an empty chart with the given dimensions.
    #[must_use]
    pub fn new(rows: u32, seats_per_row: u32) -> Self {
        Self {
            rows,
            seats_per_row,
            occupied: Vec::new(),
        }
    }

    /// Whether `pos` lies within the chart bounds.
    #[must_use]
    pub fn contains(&self, pos: SeatPosition) -> bool {
        pos.row < self.rows && pos.seat < self.seats_per_row
    }

    /// The visitor currently holding `pos`, if any.
    #[must_use]
    pub fn occupant(&self, pos: SeatPosition) -> Option<&VisitorId> {
        self.occupied
            .iter()
            .find(|o| o.row == pos.row && o.seat == pos.seat)
            .map(|o| &o.visitor_id)
    }

    /// The seat currently held by `visitor`, if any.
    #[must_use]
    pub fn seat_of(&self, visitor: &VisitorId) -> Option<SeatPosition> {
        self.occupied
            .iter()
            .find(|o| &o.visitor_id == visitor)
            .map(OccupiedSeat::position)
    }

    /// Record `visitor` at `pos`, releasing any seat the visitor already
    /// holds in the same step so the one-seat-per-visitor invariant is never
    /// observable as violated.
    ///
    /// The caller must have checked bounds and occupancy; this method only
    /// performs the move.
    pub fn occupy(&mut self, pos: SeatPosition, visitor: &VisitorId) -> OccupiedSeat {
        self.occupied.retain(|o| &o.visitor_id != visitor);
        let record = OccupiedSeat {
            row: pos.row,
            seat: pos.seat,
            visitor_id: visitor.clone(),
        };
        self.occupied.push(record.clone());
        record
    }

    /// Remove `visitor`'s occupancy record, returning the freed position.
    /// Releasing a visitor with no seat is a no-op.
    pub fn release(&mut self, visitor: &VisitorId) -> Option<SeatPosition> {
        let freed = self.seat_of(visitor);
        if freed.is_some() {
            self.occupied.retain(|o| &o.visitor_id != visitor);
        }
        freed
    }

    /// Number of occupied seats.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn chart() -> SeatingChart {
        SeatingChart::new(5, 10)
    }

    #[test]
    fn empty_chart() {
        let c = chart();
        assert_eq!(c.rows, 5);
        assert_eq!(c.seats_per_row, 10);
        assert_eq!(c.occupied_count(), 0);
    }

    #[test]
    fn contains_bounds() {
        let c = chart();
        assert!(c.contains(SeatPosition::new(0, 0)));
        assert!(c.contains(SeatPosition::new(4, 9)));
        assert!(!c.contains(SeatPosition::new(5, 0)));
        assert!(!c.contains(SeatPosition::new(0, 10)));
    }

    #[test]
    fn occupy_and_lookup() {
        let mut c = chart();
        let v = VisitorId::from("v1");
        let rec = c.occupy(SeatPosition::new(2, 3), &v);
        assert_eq!(rec.row, 2);
        assert_eq!(rec.seat, 3);
        assert_eq!(c.occupant(SeatPosition::new(2, 3)), Some(&v));
        assert_eq!(c.seat_of(&v), Some(SeatPosition::new(2, 3)));
    }

    #[test]
    fn occupy_moves_existing_seat() {
        let mut c = chart();
        let v = VisitorId::from("v1");
        let _ = c.occupy(SeatPosition::new(0, 0), &v);
        let _ = c.occupy(SeatPosition::new(1, 1), &v);
        // Old seat freed, new seat held, exactly one record.
        assert_eq!(c.occupant(SeatPosition::new(0, 0)), None);
        assert_eq!(c.occupant(SeatPosition::new(1, 1)), Some(&v));
        assert_eq!(c.occupied_count(), 1);
    }

    #[test]
    fn occupy_same_seat_is_idempotent() {
        let mut c = chart();
        let v = VisitorId::from("v1");
        let _ = c.occupy(SeatPosition::new(2, 2), &v);
        let _ = c.occupy(SeatPosition::new(2, 2), &v);
        assert_eq!(c.occupied_count(), 1);
        assert_eq!(c.seat_of(&v), Some(SeatPosition::new(2, 2)));
    }

    #[test]
    fn release_frees_seat() {
        let mut c = chart();
        let v = VisitorId::from("v1");
        let _ = c.occupy(SeatPosition::new(3, 4), &v);
        let freed = c.release(&v);
        assert_eq!(freed, Some(SeatPosition::new(3, 4)));
        assert_eq!(c.occupied_count(), 0);
        assert_eq!(c.seat_of(&v), None);
    }

    #[test]
    fn release_without_seat_is_noop() {
        let mut c = chart();
        let freed = c.release(&VisitorId::from("ghost"));
        assert_eq!(freed, None);
        assert_eq!(c.occupied_count(), 0);
    }

    #[test]
    fn release_leaves_other_visitors() {
        let mut c = chart();
        let a = VisitorId::from("a");
        let b = VisitorId::from("b");
        let _ = c.occupy(SeatPosition::new(0, 0), &a);
        let _ = c.occupy(SeatPosition::new(0, 1), &b);
        let _ = c.release(&a);
        assert_eq!(c.occupant(SeatPosition::new(0, 1)), Some(&b));
        assert_eq!(c.occupied_count(), 1);
    }

    #[test]
    fn zero_position_is_valid() {
        let mut c = chart();
        let v = VisitorId::from("front-row");
        assert!(c.contains(SeatPosition::new(0, 0)));
        let _ = c.occupy(SeatPosition::new(0, 0), &v);
        assert_eq!(c.occupant(SeatPosition::new(0, 0)), Some(&v));
    }

    #[test]
    fn serialization_shape() {
        let mut c = chart();
        let _ = c.occupy(SeatPosition::new(1, 2), &VisitorId::from("v1"));
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["rows"], 5);
        assert_eq!(json["seats_per_row"], 10);
        assert_eq!(json["occupied"][0]["row"], 1);
        assert_eq!(json["occupied"][0]["seat"], 2);
        assert_eq!(json["occupied"][0]["visitor_id"], "v1");
    }

    #[test]
    fn empty_occupied_serializes_as_array() {
        let json = serde_json::to_value(chart()).unwrap();
        assert!(json["occupied"].as_array().unwrap().is_empty());
    }

    #[test]
    fn position_display() {
        assert_eq!(SeatPosition::new(2, 7).to_string(), "(2, 7)");
    }
}
