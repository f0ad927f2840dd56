//! The authoritative store for screenings, visitors, and seat occupancy.
//!
//! Every operation takes the registry lock once, commits its mutation, and
//! returns owned snapshots for the caller to broadcast. The lock is never
//! held across an await point or a network send.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tracing::{info, instrument};

use matinee_core::{
    DEFAULT_SCREENING_ID, OccupiedSeat, PresenceError, Screening, ScreeningId, SeatPosition,
    SeatingChart, Visitor, VisitorId,
};

/// Outcome of a committed seat reservation.
#[derive(Clone, Debug)]
pub struct SeatReservation {
    /// The occupancy record created for the visitor.
    pub seat: OccupiedSeat,
    /// Screening whose chart changed.
    pub screening_id: ScreeningId,
    /// Chart snapshot taken after the commit.
    pub chart: SeatingChart,
}

/// Outcome of a committed seat release.
#[derive(Clone, Debug)]
pub struct ReleasedSeat {
    /// The position that was freed.
    pub position: SeatPosition,
    /// Screening whose chart changed.
    pub screening_id: ScreeningId,
    /// Chart snapshot taken after the commit.
    pub chart: SeatingChart,
}

/// One visitor removed by an inactivity sweep.
#[derive(Clone, Debug)]
pub struct Eviction {
    /// The removed visitor.
    pub visitor_id: VisitorId,
    /// Screening the visitor belonged to.
    pub screening_id: ScreeningId,
    /// Post-release chart snapshot, if the visitor held a seat.
    pub freed_chart: Option<SeatingChart>,
}

struct RegistryState {
    screenings: HashMap<ScreeningId, Screening>,
    visitors: HashMap<VisitorId, Visitor>,
}

/// Lock-protected presence state.
///
/// Constructed once at startup and shared via `Arc`; there is no global
/// instance. Seat invariants (at most one record per position, at most one
/// seat per visitor, visitor/chart agreement) hold at every lock release.
pub struct PresenceRegistry {
    state: Mutex<RegistryState>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                screenings: HashMap::new(),
                visitors: HashMap::new(),
            }),
        }
    }

    /// Add or replace a screening.
    pub fn insert_screening(&self, screening: Screening) {
        let mut state = self.state.lock();
        info!(screening_id = %screening.id, title = %screening.title, "screening registered");
        let _ = state.screenings.insert(screening.id.clone(), screening);
    }

    /// Raw screening lookup without fallback or activity tracking.
    pub fn screening(&self, id: &ScreeningId) -> Option<Screening> {
        self.state.lock().screenings.get(id).cloned()
    }

    /// Map an unknown screening id to the default screening.
    pub fn resolve_screening_id(&self, id: &ScreeningId) -> ScreeningId {
        if self.state.lock().screenings.contains_key(id) {
            id.clone()
        } else {
            ScreeningId::from(DEFAULT_SCREENING_ID)
        }
    }

    /// Fetch a screening on behalf of a visitor, marking the visitor active.
    ///
    /// Unknown ids resolve to the default screening; the snapshot's own `id`
    /// field reflects the resolution.
    pub fn screening_for_visitor(
        &self,
        path_id: &ScreeningId,
        visitor_id: &VisitorId,
    ) -> Result<Screening, PresenceError> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let visitor =
            state
                .visitors
                .get_mut(visitor_id)
                .ok_or_else(|| PresenceError::UnknownVisitor {
                    visitor_id: visitor_id.clone(),
                })?;
        visitor.touch();

        let resolved = if state.screenings.contains_key(path_id) {
            path_id.clone()
        } else {
            ScreeningId::from(DEFAULT_SCREENING_ID)
        };
        state
            .screenings
            .get(&resolved)
            .cloned()
            .ok_or_else(|| PresenceError::bad_request(format!("screening {resolved} not found")))
    }

    /// Register a new visitor, resolving an unknown screening id to the
    /// default screening.
    #[instrument(skip(self))]
    pub fn register_visitor(
        &self,
        name: &str,
        requested: &ScreeningId,
    ) -> Result<Visitor, PresenceError> {
        if name.is_empty() {
            return Err(PresenceError::bad_request("visitor_name is required"));
        }
        if requested.as_str().is_empty() {
            return Err(PresenceError::bad_request("screening_id is required"));
        }

        let mut state = self.state.lock();
        let resolved = if state.screenings.contains_key(requested) {
            requested.clone()
        } else {
            ScreeningId::from(DEFAULT_SCREENING_ID)
        };
        let visitor = Visitor::new(name, resolved);
        let _ = state
            .visitors
            .insert(visitor.id.clone(), visitor.clone());
        gauge!("presence_visitors_active").set(state.visitors.len() as f64);
        info!(
            visitor_id = %visitor.id,
            screening_id = %visitor.screening_id,
            "visitor registered"
        );
        Ok(visitor)
    }

    /// Snapshot of a visitor record.
    pub fn visitor(&self, id: &VisitorId) -> Option<Visitor> {
        self.state.lock().visitors.get(id).cloned()
    }

    /// Whether a visitor record exists.
    pub fn visitor_exists(&self, id: &VisitorId) -> bool {
        self.state.lock().visitors.contains_key(id)
    }

    /// Mark a visitor active now, returning the updated record.
    pub fn touch(&self, visitor_id: &VisitorId) -> Result<Visitor, PresenceError> {
        let mut state = self.state.lock();
        let visitor =
            state
                .visitors
                .get_mut(visitor_id)
                .ok_or_else(|| PresenceError::UnknownVisitor {
                    visitor_id: visitor_id.clone(),
                })?;
        visitor.touch();
        Ok(visitor.clone())
    }

    /// Atomically seat a visitor in their screening.
    ///
    /// Any seat the visitor already holds is released in the same commit, so
    /// a visitor never occupies two positions. Re-reserving one's own seat
    /// succeeds; a seat held by a different visitor is rejected.
    #[instrument(skip(self))]
    pub fn reserve_seat(
        &self,
        visitor_id: &VisitorId,
        position: SeatPosition,
    ) -> Result<SeatReservation, PresenceError> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let visitor =
            state
                .visitors
                .get_mut(visitor_id)
                .ok_or_else(|| PresenceError::UnknownVisitor {
                    visitor_id: visitor_id.clone(),
                })?;
        let screening = state
            .screenings
            .get_mut(&visitor.screening_id)
            .ok_or_else(|| {
                PresenceError::bad_request(format!("screening {} not found", visitor.screening_id))
            })?;

        if !screening.seats.contains(position) {
            return Err(PresenceError::SeatOutOfRange {
                row: position.row,
                seat: position.seat,
            });
        }
        if let Some(holder) = screening.seats.occupant(position) {
            if holder != visitor_id {
                return Err(PresenceError::SeatOccupied {
                    row: position.row,
                    seat: position.seat,
                });
            }
        }

        let seat = screening.seats.occupy(position, visitor_id);
        visitor.seat = Some(position);
        visitor.touch();
        counter!("seat_reservations_total").increment(1);
        info!(visitor_id = %visitor_id, %position, "seat reserved");
        Ok(SeatReservation {
            seat,
            screening_id: screening.id.clone(),
            chart: screening.seats.clone(),
        })
    }

    /// Release whatever seat a visitor holds.
    ///
    /// Idempotent: a visitor without a seat yields `Ok(None)` and no state
    /// change. The visitor is marked active only when a seat was freed.
    #[instrument(skip(self))]
    pub fn release_seat(
        &self,
        visitor_id: &VisitorId,
    ) -> Result<Option<ReleasedSeat>, PresenceError> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let visitor =
            state
                .visitors
                .get_mut(visitor_id)
                .ok_or_else(|| PresenceError::UnknownVisitor {
                    visitor_id: visitor_id.clone(),
                })?;
        let Some(position) = visitor.seat.take() else {
            return Ok(None);
        };
        visitor.touch();
        let Some(screening) = state.screenings.get_mut(&visitor.screening_id) else {
            return Ok(None);
        };
        let _ = screening.seats.release(visitor_id);
        counter!("seat_releases_total").increment(1);
        info!(visitor_id = %visitor_id, %position, "seat released");
        Ok(Some(ReleasedSeat {
            position,
            screening_id: screening.id.clone(),
            chart: screening.seats.clone(),
        }))
    }

    /// Remove every visitor idle for strictly longer than `threshold`,
    /// freeing their seats.
    ///
    /// Mutations commit under a single lock acquisition; the returned
    /// records carry the snapshots the caller needs for fan-out.
    #[instrument(skip(self))]
    pub fn evict_stale(&self, threshold: Duration) -> Vec<Eviction> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let now = Utc::now();

        let stale: Vec<VisitorId> = state
            .visitors
            .values()
            .filter(|v| now - v.last_active > threshold)
            .map(|v| v.id.clone())
            .collect();

        let mut evictions = Vec::with_capacity(stale.len());
        for visitor_id in stale {
            let Some(visitor) = state.visitors.remove(&visitor_id) else {
                continue;
            };
            let freed_chart = visitor.seat.and_then(|_| {
                state
                    .screenings
                    .get_mut(&visitor.screening_id)
                    .map(|screening| {
                        let _ = screening.seats.release(&visitor_id);
                        screening.seats.clone()
                    })
            });
            info!(
                visitor_id = %visitor_id,
                screening_id = %visitor.screening_id,
                freed_seat = freed_chart.is_some(),
                "evicting inactive visitor"
            );
            evictions.push(Eviction {
                visitor_id,
                screening_id: visitor.screening_id,
                freed_chart,
            });
        }

        if !evictions.is_empty() {
            counter!("presence_visitors_reaped_total").increment(evictions.len() as u64);
            gauge!("presence_visitors_active").set(state.visitors.len() as f64);
        }
        evictions
    }

    /// Number of registered visitors.
    pub fn visitor_count(&self) -> usize {
        self.state.lock().visitors.len()
    }

    /// Number of registered screenings.
    pub fn screening_count(&self) -> usize {
        self.state.lock().screenings.len()
    }

    /// Age a visitor's activity timestamp for sweep tests.
    #[cfg(test)]
    fn backdate(&self, visitor_id: &VisitorId, age: Duration) {
        let mut state = self.state.lock();
        if let Some(visitor) = state.visitors.get_mut(visitor_id) {
            visitor.last_active = Utc::now() - age;
        }
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
