//! # matinee-server
//!
//! Axum HTTP + WebSocket server for synchronized screenings: visitor
//! registration and credentials, seat reservation with live occupancy
//! fan-out, WebRTC signal relay between viewers, and background eviction
//! of inactive visitors.
//!
//! ## Crate Position
//!
//! Sits on top of `matinee-core` (domain types and wire protocol),
//! `matinee-presence` (the registry), and `matinee-settings`. The
//! `matinee` binary crate configures and runs it.

#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use matinee_core::{DEFAULT_SCREENING_ID, Screening, ScreeningId, SeatingChart};
use matinee_presence::PresenceRegistry;
use matinee_settings::{MatineeSettings, ScreeningSettings};

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod reaper;
pub mod websocket;

pub use auth::{AuthVisitor, Claims, CredentialError, CredentialService};
pub use errors::ApiError;

use crate::websocket::broadcast::BroadcastRouter;
use crate::websocket::directory::ConnectionDirectory;

/// Shared handles threaded through every handler and background task.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative presence state.
    pub registry: Arc<PresenceRegistry>,
    /// Authenticated socket connections.
    pub directory: Arc<ConnectionDirectory>,
    /// Event fan-out over the directory.
    pub broadcast: BroadcastRouter,
    /// Token issuance and verification.
    pub credentials: Arc<CredentialService>,
    /// Loaded configuration.
    pub settings: Arc<MatineeSettings>,
    /// Server start instant, for the health report.
    pub started_at: Instant,
    /// Prometheus render handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The assembled presence server, ready to produce a router or start
/// listening.
pub struct PresenceServer {
    state: AppState,
}

impl PresenceServer {
    /// Build the server state and seed the configured screening.
    #[must_use]
    pub fn new(settings: MatineeSettings) -> Self {
        let registry = Arc::new(PresenceRegistry::new());
        seed_screenings(&registry, &settings.screening);

        let directory = Arc::new(ConnectionDirectory::new());
        let broadcast = BroadcastRouter::new(Arc::clone(&directory));
        let credentials = Arc::new(CredentialService::new(&settings.auth));

        Self {
            state: AppState {
                registry,
                directory,
                broadcast,
                credentials,
                settings: Arc::new(settings),
                started_at: Instant::now(),
                metrics: None,
            },
        }
    }

    /// Attach a Prometheus handle so `/metrics` can render.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.state.metrics = Some(handle);
        self
    }

    /// Clone of the shared state, mainly for tests and the reaper.
    #[must_use]
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the full HTTP + WebSocket router.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .route("/api/auth/visitor", post(handlers::register_visitor))
            .route("/api/screenings/{id}", get(handlers::get_screening))
            .route("/api/screenings/{id}/seats", post(handlers::select_seat))
            .route(
                "/api/screenings/{id}/seats/release",
                post(handlers::release_seat),
            )
            .route("/api/screenings/{id}/heartbeat", post(handlers::heartbeat))
            .route("/ws/screenings/{id}", get(websocket::session::ws_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind a listener, start serving, and start the reaper.
    ///
    /// Binding port 0 picks a free port; the chosen address is on the
    /// returned handle.
    pub async fn start(self, host: &str, port: u16) -> std::io::Result<ServerHandle> {
        let listener = tokio::net::TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let reaper = reaper::spawn_reaper(self.state.clone(), cancel.clone());

        let router = self.router();
        let shutdown = cancel.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(err) = result {
                error!(error = %err, "server exited with error");
            }
        });

        info!(%addr, "matinee server listening");
        Ok(ServerHandle {
            addr,
            cancel,
            server,
            reaper,
        })
    }
}

/// A running server with its background tasks.
pub struct ServerHandle {
    addr: SocketAddr,
    cancel: CancellationToken,
    server: JoinHandle<()>,
    reaper: JoinHandle<()>,
}

impl ServerHandle {
    /// The bound listen address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The bound port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop serving and wait for the tasks to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.server.await;
        let _ = self.reaper.await;
    }
}

/// Seed the configured screening, plus the default screening when the
/// configuration names something else. Unknown-id fallback relies on the
/// default always existing.
fn seed_screenings(registry: &PresenceRegistry, settings: &ScreeningSettings) {
    let start = Utc::now();
    let screening = Screening {
        id: ScreeningId::from(settings.id.as_str()),
        title: settings.title.clone(),
        magnet_link: settings.magnet_link.clone(),
        start_time: start,
        end_time: start + chrono::Duration::hours(settings.duration_hours as i64),
        seats: SeatingChart::new(settings.rows, settings.seats_per_row),
    };

    if screening.id.as_str() != DEFAULT_SCREENING_ID {
        let mut fallback = screening.clone();
        fallback.id = ScreeningId::from(DEFAULT_SCREENING_ID);
        registry.insert_screening(fallback);
    }
    registry.insert_screening(screening);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use matinee_settings::PresenceSettings;

    /// State over default settings with the given reaper timings.
    pub(crate) fn make_state(sweep_secs: u64, inactivity_secs: u64) -> AppState {
        let settings = MatineeSettings {
            presence: PresenceSettings {
                sweep_interval_secs: sweep_secs,
                inactivity_timeout_secs: inactivity_secs,
            },
            ..MatineeSettings::default()
        };
        PresenceServer::new(settings).state()
    }

    /// Server over default settings.
    pub(crate) fn make_server() -> PresenceServer {
        PresenceServer::new(MatineeSettings::default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
