use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, schedule_routes, AppointmentCellState};
use video_conferencing_cell::{video_conferencing_routes, VideoCellState};

pub fn create_router(appointments: AppointmentCellState, video: VideoCellState) -> Router {
    Router::new()
        .route("/", get(|| async { "Telemed API is running!" }))
        .nest("/appointments", appointment_routes(appointments.clone()))
        .nest("/schedules", schedule_routes(appointments))
        .nest("/video", video_conferencing_routes(video))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use appointment_cell::InMemoryAppointmentStore;
    use shared_utils::clock::{FixedOffsetClock, SharedClock};
    use shared_utils::test_utils::TestConfig;
    use video_conferencing_cell::{InMemoryVideoSessionStore, JoinLinkBuilder, SignalingRelay, VideoSessionManager};

    fn app() -> Router {
        let config = TestConfig::default().to_arc();
        let clock: SharedClock = Arc::new(FixedOffsetClock::new(5));
        let sessions = Arc::new(VideoSessionManager::new(
            Arc::new(InMemoryVideoSessionStore::new()),
            JoinLinkBuilder::from_config(&config),
            clock.clone(),
        ));

        let video = VideoCellState {
            config: config.clone(),
            relay: Arc::new(SignalingRelay::new()),
            sessions: sessions.clone(),
        };
        let appointments =
            AppointmentCellState::new(config, Arc::new(InMemoryAppointmentStore::new()), sessions, clock);

        create_router(appointments, video)
    }

    #[tokio::test]
    async fn test_root_liveness() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cells_are_nested() {
        let response = app()
            .oneshot(Request::builder().uri("/video/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["active_rooms"], 0);

        let missing = app()
            .oneshot(
                Request::builder()
                    .uri("/appointments/7f9c1b4e-2a4d-4c1e-9a55-0f3b2d9e6c11/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
