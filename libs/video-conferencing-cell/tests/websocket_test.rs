use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;
use uuid::Uuid;

use shared_utils::clock::{FixedOffsetClock, SharedClock};
use shared_utils::test_utils::TestConfig;
use video_conferencing_cell::models::ParticipantRole;
use video_conferencing_cell::services::{
    InMemoryVideoSessionStore, JoinLinkBuilder, SignalingRelay, VideoSessionManager,
};
use video_conferencing_cell::{video_conferencing_routes, VideoCellState};

fn test_state() -> VideoCellState {
    let config = TestConfig::default().to_arc();
    let clock: SharedClock = Arc::new(FixedOffsetClock::utc());

    VideoCellState {
        relay: Arc::new(SignalingRelay::new()),
        sessions: Arc::new(VideoSessionManager::new(
            Arc::new(InMemoryVideoSessionStore::new()),
            JoinLinkBuilder::from_config(&config),
            clock,
        )),
        config,
    }
}

async fn spawn_server(state: VideoCellState) -> (String, tokio::task::JoinHandle<()>) {
    let app = video_conferencing_routes(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://127.0.0.1:{}/ws", addr.port()), handle)
}

async fn wait_for_roles(relay: &SignalingRelay, appointment_id: Uuid, expected: Vec<ParticipantRole>) {
    for _ in 0..100 {
        if relay.connected_roles(appointment_id).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("room {} never reached {:?}", appointment_id, expected);
}

async fn wait_for_room_count(relay: &SignalingRelay, expected: usize) {
    for _ in 0..100 {
        if relay.active_rooms().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("active rooms never reached {}", expected);
}

#[tokio::test]
async fn test_doctor_and_patient_exchange_frames() {
    let state = test_state();
    let relay = state.relay.clone();
    let (base, server) = spawn_server(state).await;
    let appointment_id = Uuid::new_v4();

    let (mut doctor, _) = tokio_tungstenite::connect_async(format!(
        "{}?appointment_id={}&role=doctor",
        base, appointment_id
    ))
    .await
    .expect("doctor connect failed");
    let (mut patient, _) = tokio_tungstenite::connect_async(format!(
        "{}?appointment_id={}&role=patient",
        base, appointment_id
    ))
    .await
    .expect("patient connect failed");

    wait_for_roles(&relay, appointment_id, vec![ParticipantRole::Doctor, ParticipantRole::Patient]).await;

    doctor.send(Message::Text(r#"{"type":"offer"}"#.into())).await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), patient.next())
        .await
        .expect("timeout waiting for offer")
        .expect("stream ended")
        .expect("ws error");
    assert_eq!(received.to_text().unwrap(), r#"{"type":"offer"}"#);

    patient.send(Message::Binary(vec![7u8, 8, 9].into())).await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), doctor.next())
        .await
        .expect("timeout waiting for answer")
        .expect("stream ended")
        .expect("ws error");
    assert!(received.is_binary());
    assert_eq!(received.into_data().to_vec(), vec![7u8, 8, 9]);

    let _ = doctor.close(None).await;
    let _ = patient.close(None).await;
    wait_for_room_count(&relay, 0).await;

    server.abort();
}

#[tokio::test]
async fn test_second_doctor_connection_closes_the_first() {
    let state = test_state();
    let relay = state.relay.clone();
    let (base, server) = spawn_server(state).await;
    let appointment_id = Uuid::new_v4();
    let url = format!("{}?appointment_id={}&role=doctor", base, appointment_id);

    let (mut first, _) = tokio_tungstenite::connect_async(url.clone()).await.unwrap();
    wait_for_roles(&relay, appointment_id, vec![ParticipantRole::Doctor]).await;

    let (_second, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let next = tokio::time::timeout(Duration::from_secs(5), first.next())
        .await
        .expect("first connection was left open");
    match next {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        Some(Ok(other)) => panic!("unexpected frame on replaced connection: {:?}", other),
    }

    assert_eq!(relay.connected_roles(appointment_id).await, vec![ParticipantRole::Doctor]);
    server.abort();
}

#[tokio::test]
async fn test_invalid_query_is_rejected_before_upgrade() {
    let app = video_conferencing_routes(test_state());

    for uri in [
        "/ws?role=doctor".to_string(),
        format!("/ws?appointment_id={}", Uuid::new_v4()),
        format!("/ws?appointment_id={}&role=nurse", Uuid::new_v4()),
        "/ws?appointment_id=42&role=patient".to_string(),
    ] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri {}", uri);
    }
}

#[tokio::test]
async fn test_health_reports_active_rooms() {
    let state = test_state();
    let relay = state.relay.clone();
    let app = video_conferencing_routes(state);

    let _held = relay.join(Uuid::new_v4(), ParticipantRole::Patient).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["active_rooms"], 1);
}
