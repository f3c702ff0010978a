use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::entities::{Appointment, AppointmentStatus};
use shared_models::error::AppError;
use shared_store::StoreError;

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

/// Time-window constants for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    /// Small tolerance for client clock skew when rejecting past start times.
    pub clock_skew_tolerance_minutes: i64,
    /// A visit may be opened this many minutes before the scheduled start...
    pub start_window_early_minutes: i64,
    /// ...and until this many minutes after the scheduled end.
    pub start_window_late_minutes: i64,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            min_duration_minutes: 10,
            max_duration_minutes: 240,
            clock_skew_tolerance_minutes: 1,
            start_window_early_minutes: 15,
            start_window_late_minutes: 30,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: i64,
    pub start_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub start_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkNoShowRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConflictCheckQuery {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub exclude_appointment_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgendaQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("appointment duration must be between {min} and {max} minutes")]
    InvalidDuration { min: i64, max: i64 },

    #[error("cannot schedule an appointment in the past")]
    PastDate,

    #[error("{0}")]
    Validation(String),

    #[error("appointment not found")]
    NotFound,

    #[error("patient not found")]
    PatientNotFound,

    #[error("appointment belongs to another doctor")]
    Forbidden,

    #[error("the requested slot overlaps an existing appointment")]
    Conflict,

    #[error("outside the start window for this appointment")]
    OutOfWindow,

    #[error("operation not valid while appointment is {0}")]
    InvalidState(AppointmentStatus),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppointmentError::NotFound,
            StoreError::SlotTaken => AppointmentError::Conflict,
            other => AppointmentError::Storage(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::InvalidDuration { .. }
            | AppointmentError::PastDate
            | AppointmentError::Validation(_) => AppError::ValidationError(message),
            AppointmentError::NotFound | AppointmentError::PatientNotFound => {
                AppError::NotFound(message)
            }
            AppointmentError::Forbidden => AppError::Forbidden(message),
            AppointmentError::Conflict => AppError::SchedulingConflict(message),
            AppointmentError::OutOfWindow => AppError::OutOfWindow(message),
            AppointmentError::InvalidState(_) => AppError::InvalidState(message),
            AppointmentError::Storage(_) => AppError::Database(message),
        }
    }
}
