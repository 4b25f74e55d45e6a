use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, BookAppointmentRequest, CreateScheduleRequest, Schedule,
};
use appointment_cell::services::{
    AppointmentStore, BookingAllocator, InMemoryAppointmentStore, ScheduleService,
};
use shared_utils::clock::{ManualClock, SharedClock};
use shared_utils::test_utils::utc;

struct Fixture {
    store: Arc<InMemoryAppointmentStore>,
    allocator: Arc<BookingAllocator>,
    schedule: Schedule,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let clock: SharedClock = Arc::new(ManualClock::new(utc(2025, 6, 2, 8, 0), 5));
    let schedules = ScheduleService::new(store.clone(), clock.clone(), 30);

    let (schedule, _) = schedules
        .create_schedule(CreateScheduleRequest {
            doctor_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            start_time: utc(2025, 6, 3, 9, 0),
            end_time: utc(2025, 6, 3, 12, 0),
            color: None,
            slot_minutes: None,
        })
        .await
        .unwrap();

    Fixture {
        allocator: Arc::new(BookingAllocator::new(store.clone(), clock)),
        store,
        schedule,
    }
}

fn request(schedule_id: Uuid, start: DateTime<Utc>, minutes: i64) -> BookAppointmentRequest {
    BookAppointmentRequest {
        schedule_id,
        patient_id: Uuid::new_v4(),
        start_time: start,
        end_time: start + Duration::minutes(minutes),
    }
}

#[tokio::test]
async fn test_booking_claims_the_slot() {
    let fx = fixture().await;

    let appointment = fx
        .allocator
        .book(request(fx.schedule.id, utc(2025, 6, 3, 10, 0), 30))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Booked);
    let slot = fx.store.get_timeslot(appointment.timeslot_id).await.unwrap().unwrap();
    assert!(slot.is_booked);
    assert_eq!(slot.start_time, utc(2025, 6, 3, 10, 0));
}

#[tokio::test]
async fn test_second_booking_of_same_slot_is_rejected() {
    let fx = fixture().await;
    let start = utc(2025, 6, 3, 10, 0);

    fx.allocator.book(request(fx.schedule.id, start, 30)).await.unwrap();

    assert_matches!(
        fx.allocator.book(request(fx.schedule.id, start, 30)).await,
        Err(AppointmentError::SlotAlreadyBooked)
    );
}

#[tokio::test]
async fn test_concurrent_bookings_produce_exactly_one_appointment() {
    let fx = fixture().await;
    let start = utc(2025, 6, 3, 11, 0);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let allocator = fx.allocator.clone();
        let attempt = request(fx.schedule.id, start, 30);
        handles.push(tokio::spawn(async move { allocator.book(attempt).await }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(appointment) => winners.push(appointment),
            Err(AppointmentError::SlotAlreadyBooked) => conflicts += 1,
            Err(other) => panic!("unexpected booking error: {}", other),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 15);
    assert_eq!(fx.store.appointments_for_timeslot(winners[0].timeslot_id).await, 1);
}

#[tokio::test]
async fn test_off_grid_range_creates_slot_lazily() {
    let fx = fixture().await;
    let start = utc(2025, 6, 3, 9, 15);

    let appointment = fx.allocator.book(request(fx.schedule.id, start, 20)).await.unwrap();

    let slot = fx.store.get_timeslot(appointment.timeslot_id).await.unwrap().unwrap();
    assert_eq!(slot.start_time, start);
    assert_eq!(slot.end_time, start + Duration::minutes(20));
}

#[tokio::test]
async fn test_invalid_ranges_are_rejected() {
    let fx = fixture().await;

    assert_matches!(
        fx.allocator.book(request(fx.schedule.id, utc(2025, 6, 3, 10, 0), 0)).await,
        Err(AppointmentError::Validation(_))
    );
    assert_matches!(
        fx.allocator.book(request(fx.schedule.id, utc(2025, 6, 3, 11, 45), 30)).await,
        Err(AppointmentError::Validation(_))
    );
    assert_matches!(
        fx.allocator.book(request(fx.schedule.id, utc(2025, 6, 3, 8, 30), 30)).await,
        Err(AppointmentError::Validation(_))
    );
}

#[tokio::test]
async fn test_unknown_or_hidden_schedule_is_not_found() {
    let fx = fixture().await;

    assert_matches!(
        fx.allocator.book(request(Uuid::new_v4(), utc(2025, 6, 3, 10, 0), 30)).await,
        Err(AppointmentError::NotFound(_))
    );

    fx.store.set_schedule_visibility(fx.schedule.id, false).await.unwrap();
    assert_matches!(
        fx.allocator.book(request(fx.schedule.id, utc(2025, 6, 3, 10, 0), 30)).await,
        Err(AppointmentError::NotFound(_))
    );
}

#[tokio::test]
async fn test_schedule_creation_materializes_slots_once() {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let clock: SharedClock = Arc::new(ManualClock::new(utc(2025, 6, 2, 8, 0), 5));
    let schedules = ScheduleService::new(store.clone(), clock, 30);

    let (schedule, created) = schedules
        .create_schedule(CreateScheduleRequest {
            doctor_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            start_time: utc(2025, 6, 3, 9, 0),
            end_time: utc(2025, 6, 3, 10, 45),
            color: Some("#ff0000".to_string()),
            slot_minutes: None,
        })
        .await
        .unwrap();

    assert_eq!(created, 3);
    assert_eq!(schedule.color, "#ff0000");
    assert_eq!(schedules.regenerate_timeslots(schedule.id, None).await.unwrap(), 0);
    assert_eq!(schedules.list_timeslots(schedule.id).await.unwrap().len(), 3);

    assert_matches!(
        schedules.regenerate_timeslots(schedule.id, Some(0)).await,
        Err(AppointmentError::Validation(_))
    );
}
