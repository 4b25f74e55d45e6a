use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Duration;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentError, AppointmentStatus, CompleteVisitRequest, Prescription,
};
use appointment_cell::services::{AppointmentLifecycle, AppointmentStore, InMemoryAppointmentStore};
use shared_utils::clock::{ManualClock, SharedClock};
use shared_utils::test_utils::utc;
use video_conferencing_cell::{InMemoryVideoSessionStore, JoinLinkBuilder, VideoSessionManager};

struct Fixture {
    store: Arc<InMemoryAppointmentStore>,
    sessions: Arc<VideoSessionManager>,
    lifecycle: Arc<AppointmentLifecycle>,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let clock = Arc::new(ManualClock::new(utc(2025, 6, 3, 9, 0), 5));
    let shared: SharedClock = clock.clone();
    let sessions = Arc::new(VideoSessionManager::new(
        Arc::new(InMemoryVideoSessionStore::new()),
        JoinLinkBuilder::new("/webrtc/room"),
        shared.clone(),
    ));

    Fixture {
        lifecycle: Arc::new(AppointmentLifecycle::new(store.clone(), sessions.clone(), shared)),
        store,
        sessions,
        clock,
    }
}

async fn seed_appointment(store: &InMemoryAppointmentStore, status: AppointmentStatus) -> Uuid {
    let appointment = Appointment {
        id: Uuid::new_v4(),
        timeslot_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        status,
        created_at: utc(2025, 6, 1, 0, 0),
        updated_at: utc(2025, 6, 1, 0, 0),
    };
    store.insert_appointment(appointment.clone()).await.unwrap();
    appointment.id
}

fn visit(diagnosis: &str, prescriptions: usize) -> CompleteVisitRequest {
    CompleteVisitRequest {
        complaints: "Headache".to_string(),
        diagnosis: diagnosis.to_string(),
        assignment: "Rest".to_string(),
        prescriptions: (0..prescriptions)
            .map(|i| Prescription {
                medication: format!("Medication {}", i),
                dosage: "10mg".to_string(),
                schedule: "daily".to_string(),
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_accept_is_idempotent_and_returns_same_session() {
    let fx = fixture();
    let id = seed_appointment(&fx.store, AppointmentStatus::Booked).await;

    let first = fx.lifecycle.accept(id).await.unwrap();
    let second = fx.lifecycle.accept(id).await.unwrap();

    assert_eq!(first.video_url, second.video_url);
    assert_eq!(first.room_name, second.room_name);
    assert_eq!(fx.lifecycle.status(id).await.unwrap(), AppointmentStatus::Accepted);
}

#[tokio::test]
async fn test_concurrent_accepts_converge() {
    let fx = fixture();
    let id = seed_appointment(&fx.store, AppointmentStatus::Booked).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let lifecycle = fx.lifecycle.clone();
        handles.push(tokio::spawn(async move { lifecycle.accept(id).await }));
    }

    let mut urls = Vec::new();
    for handle in handles {
        urls.push(handle.await.unwrap().unwrap().room_name);
    }
    urls.dedup();
    assert_eq!(urls.len(), 1);
}

#[tokio::test]
async fn test_status_never_moves_backward() {
    let fx = fixture();
    let id = seed_appointment(&fx.store, AppointmentStatus::Booked).await;

    fx.lifecycle.accept(id).await.unwrap();
    fx.lifecycle.end_call(id).await.unwrap();

    assert_matches!(
        fx.lifecycle.accept(id).await,
        Err(AppointmentError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Accepted
        })
    );
    assert_eq!(fx.lifecycle.status(id).await.unwrap(), AppointmentStatus::Completed);
}

#[tokio::test]
async fn test_cancelled_appointments_are_not_driven() {
    let fx = fixture();
    let id = seed_appointment(&fx.store, AppointmentStatus::Cancelled).await;

    assert_matches!(fx.lifecycle.accept(id).await, Err(AppointmentError::InvalidTransition { .. }));
    assert_matches!(fx.lifecycle.end_call(id).await, Err(AppointmentError::InvalidTransition { .. }));
    assert_matches!(
        fx.lifecycle.complete_visit(id, visit("n/a", 0)).await,
        Err(AppointmentError::InvalidTransition { .. })
    );
}

#[tokio::test]
async fn test_end_call_requires_accept_and_is_idempotent() {
    let fx = fixture();
    let id = seed_appointment(&fx.store, AppointmentStatus::Booked).await;

    assert_matches!(
        fx.lifecycle.end_call(id).await,
        Err(AppointmentError::InvalidTransition {
            from: AppointmentStatus::Booked,
            to: AppointmentStatus::Completed
        })
    );

    fx.lifecycle.accept(id).await.unwrap();
    fx.clock.advance(Duration::minutes(25));

    assert_eq!(fx.lifecycle.end_call(id).await.unwrap(), AppointmentStatus::Completed);
    assert_eq!(fx.lifecycle.end_call(id).await.unwrap(), AppointmentStatus::Completed);

    let session = fx.sessions.current_session(id).await.unwrap();
    assert_eq!(session.ended_at, Some(utc(2025, 6, 3, 9, 25)));
}

#[tokio::test]
async fn test_complete_visit_requires_accepted() {
    let fx = fixture();
    let id = seed_appointment(&fx.store, AppointmentStatus::Booked).await;

    assert_matches!(
        fx.lifecycle.complete_visit(id, visit("Migraine", 1)).await,
        Err(AppointmentError::InvalidTransition { .. })
    );
    assert_matches!(fx.lifecycle.visit_details(id).await, Err(AppointmentError::NotFound(_)));
}

#[tokio::test]
async fn test_resubmitted_visit_details_overwrite() {
    let fx = fixture();
    let id = seed_appointment(&fx.store, AppointmentStatus::Accepted).await;

    fx.lifecycle.complete_visit(id, visit("Migraine", 3)).await.unwrap();
    assert_eq!(fx.lifecycle.status(id).await.unwrap(), AppointmentStatus::Completed);

    fx.lifecycle.complete_visit(id, visit("Tension headache", 1)).await.unwrap();

    let details = fx.lifecycle.visit_details(id).await.unwrap();
    assert_eq!(details.diagnosis, "Tension headache");
    assert_eq!(details.prescriptions.len(), 1);
    assert_eq!(fx.lifecycle.status(id).await.unwrap(), AppointmentStatus::Completed);
}

#[tokio::test]
async fn test_unknown_appointment() {
    let fx = fixture();

    assert_matches!(fx.lifecycle.status(Uuid::new_v4()).await, Err(AppointmentError::NotFound(_)));
    assert_matches!(fx.lifecycle.accept(Uuid::new_v4()).await, Err(AppointmentError::NotFound(_)));
}
