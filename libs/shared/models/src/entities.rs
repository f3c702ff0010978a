use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::AuditTrail;

// ==============================================================================
// ROOT ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialty: Option<String>,
    pub registration_number: Option<String>,
    /// Opaque credential hash; hashing is performed by an external collaborator.
    pub credential_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub full_name: String,
    /// Unique external scan code, None until issued.
    pub scan_code: Option<String>,
    pub total_sessions: i32,
    pub completed_sessions: i32,
    pub status: PatientStatus,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// A zero-session protocol is complete from the start; the counter must
    /// never pass the prescribed total.
    pub fn protocol_complete(&self) -> bool {
        self.completed_sessions >= self.total_sessions
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Active,
    Completed,
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatientStatus::Active => write!(f, "active"),
            PatientStatus::Completed => write!(f, "completed"),
        }
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: AuditTrail,
    pub encounter_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open interval overlap: [start_at, end_at) intersects [start, end).
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_at < end && self.end_at > start
    }

    /// Canceled appointments never block a slot again.
    pub fn blocks_slot(&self) -> bool {
        self.status != AppointmentStatus::Canceled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Canceled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Canceled => write!(f, "canceled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

// ==============================================================================
// ENCOUNTERS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub visit_type: String,
    pub chief_complaint_short: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Reserved for a future signing workflow; never driven by any operation.
    pub is_signed: bool,
}

impl Encounter {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub id: i64,
    pub encounter_id: i64,

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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterEvolution {
    pub id: i64,
    pub encounter_id: i64,
    pub author_doctor_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// ATTENDANCE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendance {
    pub id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub session_number: i32,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    fn appointment(start: DateTime<Utc>, end: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: 1,
            doctor_id: 1,
            patient_id: 1,
            start_at: start,
            end_at: end,
            status,
            reason: None,
            notes: AuditTrail::default(),
            encounter_id: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn overlap_is_half_open() {
        let appt = appointment(at(10, 0), at(11, 0), AppointmentStatus::Scheduled);

        assert!(appt.overlaps(at(10, 30), at(11, 30)));
        assert!(appt.overlaps(at(9, 30), at(10, 1)));
        // Back-to-back slots do not overlap.
        assert!(!appt.overlaps(at(11, 0), at(12, 0)));
        assert!(!appt.overlaps(at(9, 0), at(10, 0)));
    }

    #[test]
    fn zero_session_protocol_is_complete_from_the_start() {
        let patient = Patient {
            id: 1,
            full_name: "Eva".to_string(),
            scan_code: None,
            total_sessions: 0,
            completed_sessions: 0,
            status: PatientStatus::Active,
            created_at: at(9, 0),
        };
        assert!(patient.protocol_complete());

        let halfway = Patient {
            total_sessions: 3,
            completed_sessions: 2,
            ..patient
        };
        assert!(!halfway.protocol_complete());
    }

    #[test]
    fn canceled_appointments_do_not_block() {
        let appt = appointment(at(10, 0), at(11, 0), AppointmentStatus::Canceled);
        assert!(!appt.blocks_slot());
        assert!(appointment(at(10, 0), at(11, 0), AppointmentStatus::NoShow).blocks_slot());
    }
}
