// libs/video-conferencing-cell/src/router.rs
use std::sync::Arc;

use axum::{routing::get, Router};

use shared_config::AppConfig;

use crate::handlers::*;
use crate::services::{SignalingRelay, VideoSessionManager};

#[derive(Clone)]
pub struct VideoCellState {
    pub config: Arc<AppConfig>,
    pub relay: Arc<SignalingRelay>,
    pub sessions: Arc<VideoSessionManager>,
}

/// Signaling and session routes. Mounted under `/video`.
pub fn video_conferencing_routes(state: VideoCellState) -> Router {
    Router::new()
        .route("/health", get(video_health_check))
        .route("/ws", get(signaling_upgrade))
        .route("/appointments/{appointment_id}/session", get(get_appointment_session))
        .with_state(state)
}
