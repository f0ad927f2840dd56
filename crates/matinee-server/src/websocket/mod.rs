//! WebSocket connection management, message dispatch, and broadcasting.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Per-connection outbound queue and close signalling |
//! | `directory` | Authenticated connection registry, visitor lookup |
//! | `broadcast` | Screening fan-out and point-to-point signal relay |
//! | `session` | WebSocket upgrade, read/write loops, message dispatch |
//!
//! ## Data Flow
//!
//! `session` reads client frames and dispatches them; committed registry
//! mutations come back as events that `broadcast` fans out through the
//! `directory` to each `connection` queue.

pub mod broadcast;
pub mod connection;
pub mod directory;
pub mod session;
