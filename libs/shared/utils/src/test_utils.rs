//! Shared fixtures for cell test suites: a settable clock and seed-data
//! helpers over the in-memory store.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, TimeZone, Utc};

use shared_config::AppConfig;
use shared_models::audit::AuditTrail;
use shared_models::clock::Clock;
use shared_models::entities::{Appointment, Doctor, Patient};
use shared_store::{ClinicStore, MemoryStore, NewAppointment, NewDoctor, NewPatient};

/// Deterministic clock for time-window tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(now) })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        token_ttl_minutes: 60,
    }
}

/// A Monday morning, far from any DST edge.
pub fn monday_9am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

pub async fn seed_doctor(store: &MemoryStore, name: &str) -> Doctor {
    store
        .insert_doctor(
            NewDoctor {
                name: name.to_string(),
                specialty: Some("physiatry".to_string()),
                registration_number: None,
                credential_hash: "$argon2$test".to_string(),
            },
            monday_9am(),
        )
        .await
        .expect("seed doctor")
}

pub async fn seed_patient(store: &MemoryStore, name: &str, total_sessions: i32) -> Patient {
    store
        .insert_patient(
            NewPatient {
                full_name: name.to_string(),
                scan_code: Some(format!("qr-{}", name.to_lowercase().replace(' ', "-"))),
                total_sessions,
            },
            monday_9am(),
        )
        .await
        .expect("seed patient")
}

pub async fn seed_appointment(
    store: &MemoryStore,
    doctor_id: i64,
    patient_id: i64,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) -> Appointment {
    store
        .insert_appointment_if_free(
            NewAppointment {
                doctor_id,
                patient_id,
                start_at,
                end_at,
                reason: Some("follow-up".to_string()),
                notes: AuditTrail::default(),
            },
            monday_9am(),
        )
        .await
        .expect("seed appointment")
}
