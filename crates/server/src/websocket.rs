//! WebSocket endpoint
//!
//! Upgrades the request and runs the connection lifecycle on the socket.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::IntoResponse,
};
use voice_order_transport::WsTransport;

use crate::connection::ConnectionLifecycle;
use crate::metrics;
use crate::state::AppState;

/// Upgrade handler; `503` when the connection limit is reached
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    let guard = state.connections.register().map_err(|e| {
        tracing::warn!(error = %e, "Rejecting WebSocket upgrade");
        StatusCode::from(e)
    })?;

    metrics::record_connection_opened();
    metrics::record_active_connections(state.connections.count());

    let services = state.services.clone();
    let connections = state.connections.clone();

    Ok(ws.on_upgrade(move |socket| async move {
        let entry = guard.entry();
        tracing::debug!(connection_id = %entry.id(), "WebSocket connected");

        let outcome = ConnectionLifecycle::new(WsTransport::new(socket), services)
            .with_entry(entry)
            .run()
            .await;
        tracing::debug!(
            session_id = outcome.session_id.as_deref().unwrap_or("-"),
            states = ?outcome.states,
            "WebSocket finished"
        );

        drop(guard);
        metrics::record_active_connections(connections.count());
    }))
}
