//! # matinee-presence
//!
//! Authoritative visitor and seating state for the matinee server.
//!
//! - [`PresenceRegistry`] — lock-protected store of screenings and visitors
//! - Seat reservation with atomic move semantics
//! - Idempotent seat release
//! - Inactivity eviction with post-commit snapshots for fan-out
//!
//! All mutation is serialized behind a single [`parking_lot::Mutex`];
//! operations return owned snapshots so no caller ever sends over the
//! network while the lock is held.
//!
//! ## Crate Position
//!
//! Sits between `matinee-core` (domain types) and `matinee-server`
//! (transport). Has no knowledge of sockets, HTTP, or credentials.

#![deny(unsafe_code)]

pub mod registry;

pub use registry::{Eviction, PresenceRegistry, ReleasedSeat, SeatReservation};
