// libs/video-conferencing-cell/src/handlers.rs
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{ParticipantRole, VideoConferencingError};
use crate::router::VideoCellState;
use crate::services::{RelayFrame, SignalingRelay};

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

/// Both fields are optional so a missing parameter becomes our own 400 instead of a
/// generic extractor rejection.
#[derive(Debug, Deserialize)]
pub struct SignalingQuery {
    pub appointment_id: Option<String>,
    pub role: Option<String>,
}

impl SignalingQuery {
    pub fn validate(&self) -> Result<(Uuid, ParticipantRole), VideoConferencingError> {
        let appointment_id = self
            .appointment_id
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| VideoConferencingError::RelayProtocol {
                message: "appointment_id is required".to_string(),
            })?;
        let appointment_id = Uuid::parse_str(appointment_id).map_err(|_| {
            VideoConferencingError::RelayProtocol {
                message: format!("appointment_id '{}' is not a valid id", appointment_id),
            }
        })?;

        let role = self
            .role
            .as_deref()
            .ok_or_else(|| VideoConferencingError::RelayProtocol {
                message: "role is required".to_string(),
            })?
            .parse::<ParticipantRole>()?;

        Ok((appointment_id, role))
    }
}

// ==============================================================================
// SIGNALING HANDLERS
// ==============================================================================

/// Upgrades to the signaling websocket after validating the query.
pub async fn signaling_upgrade(
    State(state): State<VideoCellState>,
    Query(query): Query<SignalingQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let (appointment_id, role) = query.validate()?;

    let upgrade = upgrade.map_err(|rejection| {
        AppError::BadRequest(format!("Websocket upgrade required: {}", rejection))
    })?;

    let relay = state.relay.clone();
    let max_lifetime = state
        .config
        .signaling_max_connection_secs
        .map(Duration::from_secs);

    debug!("Upgrading signaling connection for {} in room {}", role, appointment_id);
    Ok(upgrade
        .on_upgrade(move |socket| relay_connection(socket, relay, appointment_id, role, max_lifetime))
        .into_response())
}

/// Runs one signaling connection: a writer task drains frames from the other peer into
/// the socket while this task forwards inbound frames until close, error or eviction.
async fn relay_connection(
    socket: WebSocket,
    relay: Arc<SignalingRelay>,
    appointment_id: Uuid,
    role: ParticipantRole,
    max_lifetime: Option<Duration>,
) {
    let (mut sink, mut stream) = socket.split();
    let connection = relay.join(appointment_id, role).await;
    let membership = connection.membership;
    let mut outbound = connection.outbound;
    let mut evicted = connection.evicted;

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let message = match frame {
                RelayFrame::Text(text) => Message::Text(text.into()),
                RelayFrame::Binary(bytes) => Message::Binary(bytes.into()),
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let lifetime = async move {
        match max_lifetime {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(lifetime);

    loop {
        tokio::select! {
            _ = &mut evicted => {
                info!("{} connection {} replaced by a newer one", role, membership.connection_id());
                break;
            }
            _ = &mut lifetime => {
                warn!("{} connection {} reached its maximum lifetime", role, membership.connection_id());
                break;
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        relay.forward(&membership, RelayFrame::Text(text.as_str().to_string())).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        relay.forward(&membership, RelayFrame::Binary(bytes.to_vec())).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("Signaling read error for {} in room {}: {}", role, appointment_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    relay.leave(membership).await;
    let _ = writer.await;
}

// ==============================================================================
// SESSION HANDLERS
// ==============================================================================

pub async fn get_appointment_session(
    State(state): State<VideoCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let session = state.sessions.current_session(appointment_id).await?;
    let link = session.join_link();

    Ok(Json(json!({
        "success": true,
        "session": session,
        "doctor_url": link.for_role(ParticipantRole::Doctor),
        "patient_url": link.for_role(ParticipantRole::Patient),
    })))
}

pub async fn video_health_check(State(state): State<VideoCellState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "active_rooms": state.relay.active_rooms().await,
        "max_connection_secs": state.config.signaling_max_connection_secs,
    }))
}
