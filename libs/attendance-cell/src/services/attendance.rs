use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::clock::Clock;
use shared_models::entities::{Attendance, Patient, PatientStatus};
use shared_store::{ClinicStore, NewAttendance, NewPatient, SessionProgress, StoreError};

use crate::models::{AttendanceError, CheckInResult, RegisterPatientRequest};

pub struct AttendanceService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Register a patient with a prescribed session protocol and a freshly
    /// issued scan code.
    pub async fn register_patient(
        &self,
        request: RegisterPatientRequest,
    ) -> Result<Patient, AttendanceError> {
        let full_name = request.full_name.trim();
        if full_name.is_empty() {
            return Err(AttendanceError::Validation(
                "patient name is required".to_string(),
            ));
        }
        if request.total_sessions <= 0 {
            return Err(AttendanceError::Validation(
                "total_sessions must be positive".to_string(),
            ));
        }

        let patient = self
            .store
            .insert_patient(
                NewPatient {
                    full_name: full_name.to_string(),
                    scan_code: Some(Uuid::new_v4().to_string()),
                    total_sessions: request.total_sessions,
                },
                self.clock.now(),
            )
            .await?;

        info!(patient_id = patient.id, "patient registered");
        Ok(patient)
    }

    /// Record one treatment session for the patient behind `scan_code`.
    ///
    /// Re-scanning a finished patient is a quiet success that mutates
    /// nothing. The increment, the attendance row, and the status flip are
    /// one compare-and-set unit; a lost race against a concurrent scan is
    /// retried once before surfacing.
    pub async fn check_in(
        &self,
        scan_code: &str,
        doctor_id: i64,
    ) -> Result<CheckInResult, AttendanceError> {
        let patient = self.find_by_scan_code(scan_code).await?;

        match self.try_check_in(patient, doctor_id).await {
            Err(StoreError::Serialization) => {
                debug!(scan_code, "check-in raced, retrying once");
                let patient = self.find_by_scan_code(scan_code).await?;
                self.try_check_in(patient, doctor_id)
                    .await
                    .map_err(|err| {
                        warn!(scan_code, "check-in retry failed");
                        AttendanceError::from(err)
                    })
            }
            other => other.map_err(AttendanceError::from),
        }
    }

    pub async fn attendance_log(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Attendance>, AttendanceError> {
        self.store
            .get_patient(patient_id)
            .await?
            .ok_or(AttendanceError::NotFound)?;
        Ok(self.store.attendance_for_patient(patient_id).await?)
    }

    async fn find_by_scan_code(&self, scan_code: &str) -> Result<Patient, AttendanceError> {
        self.store
            .find_patient_by_scan_code(scan_code)
            .await?
            .ok_or(AttendanceError::NotFound)
    }

    async fn try_check_in(
        &self,
        patient: Patient,
        doctor_id: i64,
    ) -> Result<CheckInResult, StoreError> {
        if patient.protocol_complete() {
            debug!(patient_id = patient.id, "protocol already completed");
            return Ok(CheckInResult {
                patient,
                attendance: None,
                already_complete: true,
            });
        }

        let expected = patient.completed_sessions;
        let next = expected + 1;
        let status = if next >= patient.total_sessions {
            PatientStatus::Completed
        } else {
            PatientStatus::Active
        };

        let (patient, attendance) = self
            .store
            .commit_check_in(
                patient.id,
                expected,
                SessionProgress {
                    completed_sessions: next,
                    status,
                },
                NewAttendance {
                    patient_id: patient.id,
                    doctor_id,
                    session_number: next,
                    timestamp: self.clock.now(),
                },
            )
            .await?;

        info!(
            patient_id = patient.id,
            session = attendance.session_number,
            status = %patient.status,
            "check-in recorded"
        );
        Ok(CheckInResult {
            patient,
            attendance: Some(attendance),
            already_complete: false,
        })
    }
}
