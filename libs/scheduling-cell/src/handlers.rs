use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::AuthDoctor;
use shared_models::error::AppError;
use shared_store::AppState;

use crate::models::{
    AgendaQuery, CancelAppointmentRequest, ConflictCheckQuery, CreateAppointmentRequest,
    MarkNoShowRequest, RescheduleAppointmentRequest,
};
use crate::services::AppointmentSchedulerService;

fn scheduler(state: &AppState) -> AppointmentSchedulerService {
    AppointmentSchedulerService::new(Arc::clone(&state.store), Arc::clone(&state.clock))
}

// ==============================================================================
// APPOINTMENT LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Extension(doctor): Extension<AuthDoctor>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = scheduler(&state).create(doctor.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let appointment = scheduler(&state).get(appointment_id).await?;

    if appointment.doctor_id != doctor.id {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = scheduler(&state)
        .reschedule(appointment_id, doctor.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let appointment = scheduler(&state).confirm(appointment_id, doctor.id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment confirmed"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = scheduler(&state)
        .cancel(appointment_id, doctor.id, request.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
    Json(request): Json<MarkNoShowRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = scheduler(&state)
        .mark_no_show(appointment_id, doctor.id, &request.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment marked as no-show"
    })))
}

#[axum::debug_handler]
pub async fn start_encounter(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let encounter = scheduler(&state)
        .start_encounter(appointment_id, doctor.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "encounter": encounter,
        "message": "Encounter started"
    })))
}

// ==============================================================================
// AGENDA AND CONFLICT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_agenda(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AgendaQuery>,
    Extension(doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let appointments = scheduler(&state)
        .agenda(doctor.id, params.from, params.to)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor.id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConflictCheckQuery>,
    Extension(doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let service = scheduler(&state);
    let response = service
        .conflicts()
        .check_conflicts(
            doctor.id,
            params.start_at,
            params.end_at,
            params.exclude_appointment_id,
        )
        .await?;

    Ok(Json(json!(response)))
}
