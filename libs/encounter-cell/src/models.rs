use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::entities::{ClinicalNote, Encounter, EncounterEvolution};
use shared_models::error::AppError;
use shared_store::StoreError;

// ==============================================================================
// ENCOUNTER RULES
// ==============================================================================

/// Time-window constants for the encounter lifecycle.
#[derive(Debug, Clone)]
pub struct EncounterRules {
    /// Minutes after closing during which the note may still be replaced.
    pub edit_window_minutes: i64,
}

impl Default for EncounterRules {
    fn default() -> Self {
        Self {
            edit_window_minutes: 20,
        }
    }
}

impl EncounterRules {
    /// An open encounter is always editable; a closed one only while the
    /// edit window is still running.
    pub fn is_editable(&self, encounter: &Encounter, now: DateTime<Utc>) -> bool {
        match encounter.ended_at {
            None => true,
            Some(ended_at) => now <= ended_at + Duration::minutes(self.edit_window_minutes),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Note replacement payload. Narrative fields that are omitted keep their
/// stored value; structured lists are rendered as bullet blocks and appended
/// beneath the narrative they belong to. Vitals arrive as free text and are
/// parsed leniently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsertNoteRequest {
    pub chief_complaint: Option<String>,
    pub hpi: Option<String>,
    pub physical_exam: Option<String>,
    pub complementary_tests: Option<String>,
    pub assessment_dx: Option<String>,
    pub plan_treatment: Option<String>,
    pub indications_alarm_signs: Option<String>,
    pub follow_up: Option<String>,

    pub diagnoses: Option<Vec<String>>,
    pub medications: Option<Vec<String>>,
    pub tests: Option<Vec<String>>,
    pub plan_items: Option<Vec<String>>,

    pub ta_sys: Option<String>,
    pub ta_dia: Option<String>,
    pub hr: Option<String>,
    pub rr: Option<String>,
    pub spo2: Option<String>,
    pub temp: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub bmi: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddEvolutionRequest {
    pub content: String,
}

/// Walk-in visit with no appointment behind it.
#[derive(Debug, Clone, Deserialize)]
pub struct StartEncounterRequest {
    pub patient_id: i64,
    pub visit_type: Option<String>,
    pub chief_complaint: Option<String>,
}

/// Full read view of one visit: the encounter, its note if written, and the
/// addenda in creation order.
#[derive(Debug, Clone, Serialize)]
pub struct EncounterView {
    pub encounter: Encounter,
    pub note: Option<ClinicalNote>,
    pub evolutions: Vec<EncounterEvolution>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum EncounterError {
    #[error("encounter not found")]
    NotFound,

    #[error("encounter belongs to another doctor")]
    Forbidden,

    #[error("edit window closed; add corrections as an evolution")]
    EditWindowClosed,

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for EncounterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => EncounterError::NotFound,
            other => EncounterError::Storage(other.to_string()),
        }
    }
}

impl From<EncounterError> for AppError {
    fn from(err: EncounterError) -> Self {
        let message = err.to_string();
        match err {
            EncounterError::NotFound => AppError::NotFound(message),
            EncounterError::Forbidden => AppError::Forbidden(message),
            EncounterError::EditWindowClosed => AppError::EditWindowClosed(message),
            EncounterError::Validation(_) => AppError::ValidationError(message),
            EncounterError::Storage(_) => AppError::Database(message),
        }
    }
}
