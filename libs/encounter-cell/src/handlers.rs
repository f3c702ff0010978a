use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::AuthDoctor;
use shared_models::error::AppError;
use shared_store::AppState;

use crate::models::{AddEvolutionRequest, StartEncounterRequest, UpsertNoteRequest};
use crate::services::{ClinicalNoteService, EncounterLifecycleService};

fn lifecycle(state: &AppState) -> EncounterLifecycleService {
    EncounterLifecycleService::new(Arc::clone(&state.store), Arc::clone(&state.clock))
}

fn notes(state: &AppState) -> ClinicalNoteService {
    ClinicalNoteService::new(Arc::clone(&state.store), Arc::clone(&state.clock))
}

#[axum::debug_handler]
pub async fn start_encounter(
    State(state): State<Arc<AppState>>,
    Extension(doctor): Extension<AuthDoctor>,
    Json(request): Json<StartEncounterRequest>,
) -> Result<Json<Value>, AppError> {
    let encounter = lifecycle(&state).start_standalone(doctor.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "encounter": encounter,
        "message": "Encounter started"
    })))
}

#[axum::debug_handler]
pub async fn end_encounter(
    State(state): State<Arc<AppState>>,
    Path(encounter_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let encounter = lifecycle(&state).end(encounter_id, doctor.id).await?;

    Ok(Json(json!({
        "success": true,
        "encounter_id": encounter.id,
        "ended_at": encounter.ended_at,
    })))
}

#[axum::debug_handler]
pub async fn get_encounter(
    State(state): State<Arc<AppState>>,
    Path(encounter_id): Path<i64>,
    Extension(_doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let view = lifecycle(&state).get(encounter_id).await?;
    Ok(Json(json!(view)))
}

#[axum::debug_handler]
pub async fn list_patient_encounters(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<i64>,
    Extension(_doctor): Extension<AuthDoctor>,
) -> Result<Json<Value>, AppError> {
    let encounters = lifecycle(&state).list_for_patient(patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "encounters": encounters,
        "total": encounters.len()
    })))
}

#[axum::debug_handler]
pub async fn upsert_note(
    State(state): State<Arc<AppState>>,
    Path(encounter_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
    Json(request): Json<UpsertNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let note = notes(&state).upsert(encounter_id, doctor.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "note": note,
        "message": "Clinical note saved"
    })))
}

#[axum::debug_handler]
pub async fn add_evolution(
    State(state): State<Arc<AppState>>,
    Path(encounter_id): Path<i64>,
    Extension(doctor): Extension<AuthDoctor>,
    Json(request): Json<AddEvolutionRequest>,
) -> Result<Json<Value>, AppError> {
    let evolution = notes(&state)
        .add_evolution(encounter_id, doctor.id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "evolution_id": evolution.id,
        "created_at": evolution.created_at,
        "author_doctor_id": evolution.author_doctor_id,
    })))
}
