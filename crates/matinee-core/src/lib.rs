//! # matinee-core
//!
//! Foundation types for the Matinee synchronized-screening presence server.
//!
//! This crate provides the shared vocabulary the other matinee crates depend on:
//!
//! - **Branded IDs**: [`ids::VisitorId`], [`ids::ScreeningId`], [`ids::ConnectionId`] as newtypes
//! - **Seating**: [`seating::SeatingChart`] with bounds-checked occupancy records
//! - **Screenings**: [`screening::Screening`] and [`screening::Visitor`] registry records
//! - **Protocol**: [`protocol::ClientEnvelope`] and [`protocol::ServerEvent`] socket messages
//! - **Errors**: [`errors::PresenceError`] taxonomy via `thiserror`
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other matinee crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod protocol;
pub mod screening;
pub mod seating;

pub use errors::PresenceError;
pub use ids::{ConnectionId, ScreeningId, VisitorId};
pub use protocol::{AuthenticatePayload, ClientEnvelope, ServerEvent, VisitorSummary};
pub use screening::{DEFAULT_SCREENING_ID, Screening, Visitor};
pub use seating::{OccupiedSeat, SeatPosition, SeatingChart};
