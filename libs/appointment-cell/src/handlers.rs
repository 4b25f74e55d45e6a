// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use video_conferencing_cell::ParticipantRole;

use crate::models::{
    AppointmentListQuery, BookAppointmentRequest, CompleteVisitRequest, CreateScheduleRequest,
    ScheduleListQuery, ScheduleVisibilityRequest,
};
use crate::router::AppointmentCellState;

/// Scheme and host the browser used to reach us, for building absolute join links.
fn request_base_url(state: &AppointmentCellState, headers: &HeaderMap) -> Option<String> {
    if let Some(base) = &state.config.public_base_url {
        return Some(base.trim_end_matches('/').to_string());
    }

    let host = headers.get(header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");

    Some(format!("{}://{}", scheme, host))
}

fn parse_id_list(raw: &str) -> Result<Vec<Uuid>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            Uuid::parse_str(part)
                .map_err(|_| AppError::BadRequest(format!("'{}' is not a valid schedule id", part)))
        })
        .collect()
}

// ==============================================================================
// SCHEDULE HANDLERS
// ==============================================================================

pub async fn create_schedule(
    State(state): State<AppointmentCellState>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (schedule, slot_count) = state.schedules.create_schedule(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "schedule": schedule,
            "timeslots_created": slot_count,
        })),
    ))
}

pub async fn list_schedules(
    State(state): State<AppointmentCellState>,
    Query(query): Query<ScheduleListQuery>,
) -> Result<Json<Value>, AppError> {
    let schedules = state.schedules.list_schedules(query.doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "schedules": schedules,
    })))
}

pub async fn set_schedule_visibility(
    State(state): State<AppointmentCellState>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<ScheduleVisibilityRequest>,
) -> Result<Json<Value>, AppError> {
    let schedule = state.schedules.set_visibility(schedule_id, request.is_visible).await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
    })))
}

pub async fn list_timeslots(
    State(state): State<AppointmentCellState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let timeslots = state.schedules.list_timeslots(schedule_id).await?;

    Ok(Json(json!({
        "success": true,
        "timeslots": timeslots,
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<AppointmentCellState>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.booking.book(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
        })),
    ))
}

/// Appointments of the given schedules with the latest call link of each.
pub async fn list_appointments(
    State(state): State<AppointmentCellState>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let schedule_ids = parse_id_list(&query.schedule_ids)?;
    let booked = state.store.list_appointments_for_schedules(&schedule_ids).await?;

    let appointment_ids: Vec<Uuid> = booked.iter().map(|b| b.appointment.id).collect();
    let sessions = state.sessions.sessions_for(&appointment_ids).await?;

    let appointments: Vec<Value> = booked
        .into_iter()
        .map(|b| {
            let video_url = sessions
                .get(&b.appointment.id)
                .map(|session| session.join_link().for_role(ParticipantRole::Doctor));
            json!({
                "id": b.appointment.id,
                "patient_id": b.appointment.patient_id,
                "status": b.appointment.status,
                "schedule_id": b.timeslot.schedule_id,
                "timeslot_id": b.timeslot.id,
                "start_time": b.timeslot.start_time,
                "end_time": b.timeslot.end_time,
                "video_url": video_url,
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
    })))
}

pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .store
        .get_appointment(appointment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Appointment {} not found", appointment_id)))?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn get_appointment_status(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let status = state.lifecycle.status(appointment_id).await?;

    Ok(Json(json!({ "status": status })))
}

/// Doctor accepts. Responds with the doctor's absolute call link.
pub async fn accept_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let session = state.lifecycle.accept(appointment_id).await?;
    let link = session.join_link();

    let video_url = match request_base_url(&state, &headers) {
        Some(base) => link.absolute(&base, ParticipantRole::Doctor),
        None => link.for_role(ParticipantRole::Doctor),
    };

    Ok(Json(json!({
        "success": true,
        "video_url": video_url,
        "room_name": session.room_name,
    })))
}

pub async fn complete_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CompleteVisitRequest>,
) -> Result<Json<Value>, AppError> {
    let details = state.lifecycle.complete_visit(appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "details": details,
    })))
}

pub async fn get_visit_details(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let details = state.lifecycle.visit_details(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "details": details,
    })))
}

pub async fn end_call(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let status = state.lifecycle.end_call(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "status": status,
    })))
}
