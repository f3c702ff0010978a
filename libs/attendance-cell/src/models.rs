use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::entities::{Attendance, Patient, PatientStatus};
use shared_models::error::AppError;
use shared_store::StoreError;

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPatientRequest {
    pub full_name: String,
    pub total_sessions: i32,
}

/// Outcome of one scan. `attendance` is present only when a session was
/// actually recorded; an already-completed protocol yields a non-mutating
/// success.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInResult {
    pub patient: Patient,
    pub attendance: Option<Attendance>,
    pub already_complete: bool,
}

impl CheckInResult {
    pub fn session_number(&self) -> i32 {
        self.patient.completed_sessions
    }

    pub fn status(&self) -> PatientStatus {
        self.patient.status
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("no patient matches this scan code")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AttendanceError::NotFound,
            StoreError::UniqueViolation(key) => {
                AttendanceError::Validation(format!("duplicate value for {key}"))
            }
            other => AttendanceError::Storage(other.to_string()),
        }
    }
}

impl From<AttendanceError> for AppError {
    fn from(err: AttendanceError) -> Self {
        let message = err.to_string();
        match err {
            AttendanceError::NotFound => AppError::NotFound(message),
            AttendanceError::Validation(_) => AppError::ValidationError(message),
            AttendanceError::Storage(_) => AppError::Database(message),
        }
    }
}
