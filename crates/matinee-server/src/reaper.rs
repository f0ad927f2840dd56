//! Background eviction of inactive visitors.
//!
//! A periodic sweep removes every visitor whose `last_active` is older than
//! the configured threshold, frees their seat, announces the departure, and
//! closes their sockets. Announcements go out before the sockets close so
//! the evicted visitor sees their own departure, same as everyone else.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use matinee_core::ServerEvent;
use matinee_presence::Eviction;

use crate::AppState;

/// Spawn the reaper task. The first sweep runs one full period after start.
pub fn spawn_reaper(state: AppState, cancel: CancellationToken) -> JoinHandle<()> {
    let period = Duration::from_secs(state.settings.presence.sweep_interval_secs);
    let threshold = chrono::Duration::seconds(state.settings.presence.inactivity_timeout_secs as i64);

    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut ticker = tokio::time::interval_at(start, period);
        info!(
            period_secs = period.as_secs(),
            threshold_secs = threshold.num_seconds(),
            "inactivity reaper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => sweep(&state, threshold).await,
                () = cancel.cancelled() => {
                    info!("inactivity reaper stopped");
                    break;
                }
            }
        }
    })
}

/// Evict every stale visitor and fan the consequences out.
async fn sweep(state: &AppState, threshold: chrono::Duration) {
    for Eviction {
        visitor_id,
        screening_id,
        freed_chart,
    } in state.registry.evict_stale(threshold)
    {
        if let Some(chart) = freed_chart {
            state
                .broadcast
                .broadcast_to_screening(&screening_id, &ServerEvent::seat_update(chart))
                .await;
        }
        state
            .broadcast
            .broadcast_to_screening(&screening_id, &ServerEvent::visitor_left(visitor_id.clone()))
            .await;

        // Announcements done; now retire the visitor's sockets. The session
        // cleanup finds no binding left and skips its own announcement.
        for binding in state.directory.unbind_visitor(&visitor_id).await {
            binding.conn.close();
        }
        info!(
            visitor_id = %visitor_id,
            screening_id = %screening_id,
            "visitor evicted for inactivity"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
