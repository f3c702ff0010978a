use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use shared_config::AppConfig;
use shared_models::audit::AuditTrail;
use shared_models::clock::Clock;
use shared_models::entities::{
    Appointment, AppointmentStatus, Attendance, ClinicalNote, Doctor, Encounter,
    EncounterEvolution, Patient, PatientStatus,
};

pub mod memory;

pub use memory::MemoryStore;

/// Shared per-request state handed to every cell router.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn ClinicStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The guarded insert/reschedule found an overlapping live appointment.
    #[error("slot already taken")]
    SlotTaken,

    #[error("unique key violation: {0}")]
    UniqueViolation(String),

    /// Optimistic concurrency check failed; the caller may retry.
    #[error("serialization conflict")]
    Serialization,

    #[error("storage backend error: {0}")]
    Backend(String),
}

// ==============================================================================
// INSERT / UPDATE PAYLOADS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub specialty: Option<String>,
    pub registration_number: Option<String>,
    pub credential_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub full_name: String,
    pub scan_code: Option<String>,
    pub total_sessions: i32,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub notes: AuditTrail,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<AuditTrail>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewEncounter {
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub visit_type: String,
    pub chief_complaint_short: Option<String>,
}

/// Full replacement content for a clinical note; the store deletes any
/// existing note for the encounter and recreates it from this.
#[derive(Debug, Clone, Default)]
pub struct NoteContent {
    pub chief_complaint: Option<String>,
    pub hpi: Option<String>,
    pub physical_exam: Option<String>,
    pub complementary_tests: Option<String>,
    pub assessment_dx: Option<String>,
    pub plan_treatment: Option<String>,
    pub indications_alarm_signs: Option<String>,
    pub follow_up: Option<String>,
    pub ta_sys: Option<i32>,
    pub ta_dia: Option<i32>,
    pub hr: Option<i32>,
    pub rr: Option<i32>,
    pub spo2: Option<i32>,
    pub temp: Option<f64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub bmi: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewEvolution {
    pub encounter_id: i64,
    pub author_doctor_id: i64,
    pub content: String,
}

/// Target session counters for the check-in compare-and-set.
#[derive(Debug, Clone, Copy)]
pub struct SessionProgress {
    pub completed_sessions: i32,
    pub status: PatientStatus,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub session_number: i32,
    pub timestamp: DateTime<Utc>,
}

// ==============================================================================
// STORE INTERFACE
// ==============================================================================

/// Minimal record-store interface the engine runs against. Implementations
/// must execute each compound operation as one transaction (or equivalent
/// locking); the in-memory engine holds a single lock across each call.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    // Doctors
    async fn insert_doctor(&self, new: NewDoctor, now: DateTime<Utc>) -> Result<Doctor, StoreError>;
    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError>;
    async fn find_doctor_by_registration(&self, registration: &str)
        -> Result<Option<Doctor>, StoreError>;

    // Patients
    async fn insert_patient(&self, new: NewPatient, now: DateTime<Utc>) -> Result<Patient, StoreError>;
    async fn get_patient(&self, id: i64) -> Result<Option<Patient>, StoreError>;
    async fn find_patient_by_scan_code(&self, code: &str) -> Result<Option<Patient>, StoreError>;

    /// Compare-and-set on `completed_sessions` plus the attendance row, as one
    /// unit. Fails with `Serialization` when a concurrent check-in moved the
    /// counter past `expected_completed`.
    async fn commit_check_in(
        &self,
        patient_id: i64,
        expected_completed: i32,
        progress: SessionProgress,
        attendance: NewAttendance,
    ) -> Result<(Patient, Attendance), StoreError>;

    async fn attendance_for_patient(&self, patient_id: i64) -> Result<Vec<Attendance>, StoreError>;

    // Appointments
    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError>;

    /// Appointments of a doctor whose interval intersects [from, to),
    /// optionally excluding one id (for reschedules of the same slot).
    async fn appointments_for_doctor_in_range(
        &self,
        doctor_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Overlap guard and insert as one unit; `SlotTaken` if a live appointment
    /// of the doctor overlaps the requested interval.
    async fn insert_appointment_if_free(
        &self,
        new: NewAppointment,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;

    /// Overlap guard (excluding the appointment itself) and slot update as one
    /// unit.
    async fn reschedule_appointment_if_free(
        &self,
        id: i64,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;

    async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError>;

    // Encounters
    async fn get_encounter(&self, id: i64) -> Result<Option<Encounter>, StoreError>;
    async fn encounters_for_patient(&self, patient_id: i64) -> Result<Vec<Encounter>, StoreError>;
    async fn insert_encounter(&self, new: NewEncounter, now: DateTime<Utc>)
        -> Result<Encounter, StoreError>;

    /// Insert an encounter and link it to the appointment in one unit. If a
    /// concurrent start already linked one, that encounter is returned and no
    /// duplicate is created.
    async fn create_encounter_for_appointment(
        &self,
        appointment_id: i64,
        new: NewEncounter,
        now: DateTime<Utc>,
    ) -> Result<Encounter, StoreError>;

    /// Set `ended_at` only while it is null; first write wins. Returns the
    /// stored encounter either way.
    async fn close_encounter(&self, id: i64, ended_at: DateTime<Utc>)
        -> Result<Encounter, StoreError>;

    // Clinical notes and addenda
    async fn note_for_encounter(&self, encounter_id: i64)
        -> Result<Option<ClinicalNote>, StoreError>;
    async fn replace_note(&self, encounter_id: i64, content: NoteContent)
        -> Result<ClinicalNote, StoreError>;
    async fn add_evolution(&self, new: NewEvolution, now: DateTime<Utc>)
        -> Result<EncounterEvolution, StoreError>;
    async fn evolutions_for_encounter(
        &self,
        encounter_id: i64,
    ) -> Result<Vec<EncounterEvolution>, StoreError>;
}
