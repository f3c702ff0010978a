use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use attendance_cell::models::{AttendanceError, RegisterPatientRequest};
use attendance_cell::services::AttendanceService;
use shared_models::entities::{
    Appointment, Attendance, ClinicalNote, Doctor, Encounter, EncounterEvolution, Patient,
    PatientStatus,
};
use shared_store::{
    AppointmentPatch, ClinicStore, MemoryStore, NewAppointment, NewAttendance, NewDoctor,
    NewEncounter, NewEvolution, NewPatient, NoteContent, SessionProgress, StoreError,
};
use shared_utils::test_utils::{monday_9am, seed_doctor, seed_patient, ManualClock};

fn service(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>) -> AttendanceService {
    AttendanceService::new(store.clone(), clock.clone())
}

#[tokio::test]
async fn sessions_count_up_and_flip_the_status_on_the_last_one() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::starting_at(monday_9am());
    let service = service(&store, &clock);

    let doctor = seed_doctor(&store, "Dr. Reyes").await;
    let patient = seed_patient(&store, "Ana", 3).await;
    let code = patient.scan_code.clone().expect("seeded with a code");

    let first = service.check_in(&code, doctor.id).await.unwrap();
    assert_eq!(first.session_number(), 1);
    assert_eq!(first.status(), PatientStatus::Active);
    assert!(!first.already_complete);

    clock.advance(Duration::days(2));
    let second = service.check_in(&code, doctor.id).await.unwrap();
    assert_eq!(second.session_number(), 2);
    assert_eq!(second.status(), PatientStatus::Active);

    // The third session completes the protocol
    clock.advance(Duration::days(2));
    let third = service.check_in(&code, doctor.id).await.unwrap();
    assert_eq!(third.session_number(), 3);
    assert_eq!(third.status(), PatientStatus::Completed);
    assert_eq!(
        third.attendance.as_ref().map(|a| a.session_number),
        Some(3)
    );
}

#[tokio::test]
async fn rescanning_a_finished_patient_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::starting_at(monday_9am());
    let service = service(&store, &clock);

    let doctor = seed_doctor(&store, "Dr. Reyes").await;
    let patient = seed_patient(&store, "Ana", 1).await;
    let code = patient.scan_code.clone().unwrap();

    service.check_in(&code, doctor.id).await.unwrap();

    let repeat = service.check_in(&code, doctor.id).await.unwrap();
    assert!(repeat.already_complete);
    assert!(repeat.attendance.is_none());
    assert_eq!(repeat.patient.completed_sessions, 1);
    assert_eq!(repeat.status(), PatientStatus::Completed);

    // No extra attendance row was written
    let log = service.attendance_log(patient.id).await.unwrap();
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn completed_sessions_never_decrease() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::starting_at(monday_9am());
    let service = service(&store, &clock);

    let doctor = seed_doctor(&store, "Dr. Reyes").await;
    let patient = seed_patient(&store, "Ana", 2).await;
    let code = patient.scan_code.clone().unwrap();

    let mut last = 0;
    for _ in 0..5 {
        let result = service.check_in(&code, doctor.id).await.unwrap();
        assert!(result.patient.completed_sessions >= last);
        last = result.patient.completed_sessions;
    }
    assert_eq!(last, 2);
}

#[tokio::test]
async fn unknown_scan_code_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::starting_at(monday_9am());
    let service = service(&store, &clock);

    let doctor = seed_doctor(&store, "Dr. Reyes").await;

    let err = service.check_in("qr-nobody", doctor.id).await.unwrap_err();
    assert_matches!(err, AttendanceError::NotFound);
}

#[tokio::test]
async fn registration_issues_a_scan_code_and_validates_input() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::starting_at(monday_9am());
    let service = service(&store, &clock);

    let patient = service
        .register_patient(RegisterPatientRequest {
            full_name: "  Marta Vidal ".to_string(),
            total_sessions: 12,
        })
        .await
        .unwrap();
    assert_eq!(patient.full_name, "Marta Vidal");
    assert_eq!(patient.total_sessions, 12);
    assert_eq!(patient.completed_sessions, 0);
    assert_eq!(patient.status, PatientStatus::Active);
    assert!(patient.scan_code.is_some());

    let err = service
        .register_patient(RegisterPatientRequest {
            full_name: "   ".to_string(),
            total_sessions: 5,
        })
        .await
        .unwrap_err();
    assert_matches!(err, AttendanceError::Validation(_));

    let err = service
        .register_patient(RegisterPatientRequest {
            full_name: "Pablo".to_string(),
            total_sessions: 0,
        })
        .await
        .unwrap_err();
    assert_matches!(err, AttendanceError::Validation(_));
}

#[tokio::test]
async fn attendance_log_lists_sessions_in_order() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::starting_at(monday_9am());
    let service = service(&store, &clock);

    let doctor = seed_doctor(&store, "Dr. Reyes").await;
    let patient = seed_patient(&store, "Ana", 3).await;
    let code = patient.scan_code.clone().unwrap();

    for _ in 0..3 {
        service.check_in(&code, doctor.id).await.unwrap();
        clock.advance(Duration::days(1));
    }

    let log = service.attendance_log(patient.id).await.unwrap();
    let numbers: Vec<i32> = log.iter().map(|a| a.session_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(log.iter().all(|a| a.doctor_id == doctor.id));

    let err = service.attendance_log(9999).await.unwrap_err();
    assert_matches!(err, AttendanceError::NotFound);
}

#[tokio::test]
async fn zero_session_protocol_is_complete_before_any_scan() {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::starting_at(monday_9am());
    let service = service(&store, &clock);

    let doctor = seed_doctor(&store, "Dr. Reyes").await;
    // Registration rejects a zero-session protocol, so seed the row directly.
    let patient = store
        .insert_patient(
            NewPatient {
                full_name: "Eva".to_string(),
                scan_code: Some("qr-eva".to_string()),
                total_sessions: 0,
            },
            monday_9am(),
        )
        .await
        .unwrap();

    let result = service.check_in("qr-eva", doctor.id).await.unwrap();
    assert!(result.already_complete);
    assert!(result.attendance.is_none());
    assert_eq!(result.patient.completed_sessions, 0);

    let log = service.attendance_log(patient.id).await.unwrap();
    assert!(log.is_empty());
}

/// Store whose first check-in compare-and-set loses to a concurrent scan by
/// another doctor, then behaves like the wrapped store.
struct RacingStore {
    inner: MemoryStore,
    rival_doctor_id: i64,
    raced: AtomicBool,
}

#[async_trait]
impl ClinicStore for RacingStore {
    async fn insert_doctor(&self, new: NewDoctor, now: DateTime<Utc>) -> Result<Doctor, StoreError> {
        self.inner.insert_doctor(new, now).await
    }

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError> {
        self.inner.get_doctor(id).await
    }

    async fn find_doctor_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<Doctor>, StoreError> {
        self.inner.find_doctor_by_registration(registration).await
    }

    async fn insert_patient(
        &self,
        new: NewPatient,
        now: DateTime<Utc>,
    ) -> Result<Patient, StoreError> {
        self.inner.insert_patient(new, now).await
    }

    async fn get_patient(&self, id: i64) -> Result<Option<Patient>, StoreError> {
        self.inner.get_patient(id).await
    }

    async fn find_patient_by_scan_code(&self, code: &str) -> Result<Option<Patient>, StoreError> {
        self.inner.find_patient_by_scan_code(code).await
    }

    async fn commit_check_in(
        &self,
        patient_id: i64,
        expected_completed: i32,
        progress: SessionProgress,
        attendance: NewAttendance,
    ) -> Result<(Patient, Attendance), StoreError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            // The rival's scan lands first and moves the counter.
            self.inner
                .commit_check_in(
                    patient_id,
                    expected_completed,
                    SessionProgress {
                        completed_sessions: expected_completed + 1,
                        status: progress.status,
                    },
                    NewAttendance {
                        doctor_id: self.rival_doctor_id,
                        session_number: expected_completed + 1,
                        ..attendance
                    },
                )
                .await?;
            return Err(StoreError::Serialization);
        }
        self.inner
            .commit_check_in(patient_id, expected_completed, progress, attendance)
            .await
    }

    async fn attendance_for_patient(&self, patient_id: i64) -> Result<Vec<Attendance>, StoreError> {
        self.inner.attendance_for_patient(patient_id).await
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        self.inner.get_appointment(id).await
    }

    async fn appointments_for_doctor_in_range(
        &self,
        doctor_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner
            .appointments_for_doctor_in_range(doctor_id, from, to, exclude)
            .await
    }

    async fn insert_appointment_if_free(
        &self,
        new: NewAppointment,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        self.inner.insert_appointment_if_free(new, now).await
    }

    async fn reschedule_appointment_if_free(
        &self,
        id: i64,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        self.inner
            .reschedule_appointment_if_free(id, start_at, end_at, now)
            .await
    }

    async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError> {
        self.inner.update_appointment(id, patch).await
    }

    async fn get_encounter(&self, id: i64) -> Result<Option<Encounter>, StoreError> {
        self.inner.get_encounter(id).await
    }

    async fn encounters_for_patient(&self, patient_id: i64) -> Result<Vec<Encounter>, StoreError> {
        self.inner.encounters_for_patient(patient_id).await
    }

    async fn insert_encounter(
        &self,
        new: NewEncounter,
        now: DateTime<Utc>,
    ) -> Result<Encounter, StoreError> {
        self.inner.insert_encounter(new, now).await
    }

    async fn create_encounter_for_appointment(
        &self,
        appointment_id: i64,
        new: NewEncounter,
        now: DateTime<Utc>,
    ) -> Result<Encounter, StoreError> {
        self.inner
            .create_encounter_for_appointment(appointment_id, new, now)
            .await
    }

    async fn close_encounter(
        &self,
        id: i64,
        ended_at: DateTime<Utc>,
    ) -> Result<Encounter, StoreError> {
        self.inner.close_encounter(id, ended_at).await
    }

    async fn note_for_encounter(
        &self,
        encounter_id: i64,
    ) -> Result<Option<ClinicalNote>, StoreError> {
        self.inner.note_for_encounter(encounter_id).await
    }

    async fn replace_note(
        &self,
        encounter_id: i64,
        content: NoteContent,
    ) -> Result<ClinicalNote, StoreError> {
        self.inner.replace_note(encounter_id, content).await
    }

    async fn add_evolution(
        &self,
        new: NewEvolution,
        now: DateTime<Utc>,
    ) -> Result<EncounterEvolution, StoreError> {
        self.inner.add_evolution(new, now).await
    }

    async fn evolutions_for_encounter(
        &self,
        encounter_id: i64,
    ) -> Result<Vec<EncounterEvolution>, StoreError> {
        self.inner.evolutions_for_encounter(encounter_id).await
    }
}

#[tokio::test]
async fn losing_a_check_in_race_retries_onto_the_next_session() {
    let inner = MemoryStore::new();
    let doctor = seed_doctor(&inner, "Dr. Reyes").await;
    let rival = seed_doctor(&inner, "Dr. Sosa").await;
    let patient = seed_patient(&inner, "Ana", 3).await;
    let code = patient.scan_code.clone().unwrap();

    let store = Arc::new(RacingStore {
        inner,
        rival_doctor_id: rival.id,
        raced: AtomicBool::new(false),
    });
    let clock = ManualClock::starting_at(monday_9am());
    let service = AttendanceService::new(store, clock);

    // The rival's session is committed underneath the first attempt; the
    // retry re-reads the counter and lands on the following slot.
    let result = service.check_in(&code, doctor.id).await.unwrap();
    assert!(!result.already_complete);
    assert_eq!(result.session_number(), 2);
    assert_eq!(result.patient.completed_sessions, 2);
    assert_eq!(result.status(), PatientStatus::Active);

    let log = service.attendance_log(patient.id).await.unwrap();
    let sessions: Vec<(i32, i64)> = log.iter().map(|a| (a.session_number, a.doctor_id)).collect();
    assert_eq!(sessions, vec![(1, rival.id), (2, doctor.id)]);
}
