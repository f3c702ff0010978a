use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::AuthDoctor;
use shared_models::error::AppError;
use shared_store::AppState;

use crate::models::RegisterPatientRequest;
use crate::services::AttendanceService;

fn service(state: &AppState) -> AttendanceService {
    AttendanceService::new(Arc::clone(&state.store), Arc::clone(&state.clock))
}

#[axum::debug_handler]
pub async fn register_patient(
    State(state): State<Arc<AppState>>,
    Extension(_doctor): Extension<AuthDoctor>,
    Json(request): Json<RegisterPatientRequest>,
) -> Result<Json<Value>, AppError> {
    let patient = service(&state).register_patient(request).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient registered"
    })))
}

#[axum::debug_handler]
pub async fn check_in(
    State(state): State<Arc<AppState>>,
    Path(scan_code): Path<String>,
    Extension(doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let result = service(&state).check_in(&scan_code, doctor.id).await?;

    let message = if result.already_complete {
        "Protocol already completed"
    } else {
        "Check-in recorded"
    };

    Ok(Json(json!({
        "patient": result.patient.full_name,
        "session": result.session_number(),
        "total_sessions": result.patient.total_sessions,
        "status": result.status(),
        "message": message,
    })))
}

#[axum::debug_handler]
pub async fn attendance_log(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<i64>,
    Extension(_doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let log = service(&state).attendance_log(patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "attendance": log,
        "total": log.len()
    })))
}
