use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use shared_models::entities::{
    Appointment, AppointmentStatus, Attendance, ClinicalNote, Doctor, Encounter,
    EncounterEvolution, Patient, PatientStatus,
};

use crate::{
    AppointmentPatch, ClinicStore, NewAppointment, NewAttendance, NewDoctor, NewEncounter,
    NewEvolution, NewPatient, NoteContent, SessionProgress, StoreError,
};

/// In-memory `ClinicStore`. One mutex over all relations, so every trait call
/// runs as a single transaction; compound operations get their atomicity from
/// holding the lock across the read-then-write.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<ClinicState>,
}

#[derive(Default)]
struct ClinicState {
    doctors: Vec<Doctor>,
    patients: Vec<Patient>,
    appointments: Vec<Appointment>,
    encounters: Vec<Encounter>,
    notes: Vec<ClinicalNote>,
    evolutions: Vec<EncounterEvolution>,
    attendance: Vec<Attendance>,
    next_id: i64,
}

impl ClinicState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn doctor_slot_free(
        &self,
        doctor_id: i64,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> bool {
        !self.appointments.iter().any(|a| {
            a.doctor_id == doctor_id
                && Some(a.id) != exclude
                && a.blocks_slot()
                && a.overlaps(start_at, end_at)
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClinicState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    // ==========================================================================
    // DOCTORS
    // ==========================================================================

    async fn insert_doctor(&self, new: NewDoctor, now: DateTime<Utc>) -> Result<Doctor, StoreError> {
        let mut state = self.state();
        if let Some(reg) = &new.registration_number {
            let taken = state
                .doctors
                .iter()
                .any(|d| d.registration_number.as_deref() == Some(reg.as_str()));
            if taken {
                return Err(StoreError::UniqueViolation(format!(
                    "registration number {reg}"
                )));
            }
        }
        let id = state.allocate_id();
        let doctor = Doctor {
            id,
            name: new.name,
            specialty: new.specialty,
            registration_number: new.registration_number,
            credential_hash: new.credential_hash,
            created_at: now,
        };
        state.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn get_doctor(&self, id: i64) -> Result<Option<Doctor>, StoreError> {
        Ok(self.state().doctors.iter().find(|d| d.id == id).cloned())
    }

    async fn find_doctor_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<Doctor>, StoreError> {
        Ok(self
            .state()
            .doctors
            .iter()
            .find(|d| d.registration_number.as_deref() == Some(registration))
            .cloned())
    }

    // ==========================================================================
    // PATIENTS
    // ==========================================================================

    async fn insert_patient(&self, new: NewPatient, now: DateTime<Utc>) -> Result<Patient, StoreError> {
        let mut state = self.state();
        if let Some(code) = &new.scan_code {
            let taken = state
                .patients
                .iter()
                .any(|p| p.scan_code.as_deref() == Some(code.as_str()));
            if taken {
                return Err(StoreError::UniqueViolation(format!("scan code {code}")));
            }
        }
        let id = state.allocate_id();
        let patient = Patient {
            id,
            full_name: new.full_name,
            scan_code: new.scan_code,
            total_sessions: new.total_sessions,
            completed_sessions: 0,
            status: PatientStatus::Active,
            created_at: now,
        };
        state.patients.push(patient.clone());
        Ok(patient)
    }

    async fn get_patient(&self, id: i64) -> Result<Option<Patient>, StoreError> {
        Ok(self.state().patients.iter().find(|p| p.id == id).cloned())
    }

    async fn find_patient_by_scan_code(&self, code: &str) -> Result<Option<Patient>, StoreError> {
        Ok(self
            .state()
            .patients
            .iter()
            .find(|p| p.scan_code.as_deref() == Some(code))
            .cloned())
    }

    async fn commit_check_in(
        &self,
        patient_id: i64,
        expected_completed: i32,
        progress: SessionProgress,
        attendance: NewAttendance,
    ) -> Result<(Patient, Attendance), StoreError> {
        let mut state = self.state();
        let id = state.allocate_id();
        let patient = state
            .patients
            .iter_mut()
            .find(|p| p.id == patient_id)
            .ok_or(StoreError::NotFound)?;

        if patient.completed_sessions != expected_completed {
            debug!(
                patient_id,
                expected = expected_completed,
                actual = patient.completed_sessions,
                "check-in CAS lost to a concurrent write"
            );
            return Err(StoreError::Serialization);
        }

        patient.completed_sessions = progress.completed_sessions;
        patient.status = progress.status;
        let patient = patient.clone();

        let row = Attendance {
            id,
            patient_id: attendance.patient_id,
            doctor_id: attendance.doctor_id,
            session_number: attendance.session_number,
            timestamp: attendance.timestamp,
        };
        state.attendance.push(row.clone());
        Ok((patient, row))
    }

    async fn attendance_for_patient(&self, patient_id: i64) -> Result<Vec<Attendance>, StoreError> {
        Ok(self
            .state()
            .attendance
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect())
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>, StoreError> {
        Ok(self.state().appointments.iter().find(|a| a.id == id).cloned())
    }

    async fn appointments_for_doctor_in_range(
        &self,
        doctor_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut matches: Vec<Appointment> = self
            .state()
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && Some(a.id) != exclude && a.overlaps(from, to))
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.start_at);
        Ok(matches)
    }

    async fn insert_appointment_if_free(
        &self,
        new: NewAppointment,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut state = self.state();
        if !state.doctor_slot_free(new.doctor_id, new.start_at, new.end_at, None) {
            return Err(StoreError::SlotTaken);
        }
        let id = state.allocate_id();
        let appointment = Appointment {
            id,
            doctor_id: new.doctor_id,
            patient_id: new.patient_id,
            start_at: new.start_at,
            end_at: new.end_at,
            status: AppointmentStatus::Scheduled,
            reason: new.reason,
            notes: new.notes,
            encounter_id: None,
            created_at: now,
            updated_at: now,
        };
        state.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn reschedule_appointment_if_free(
        &self,
        id: i64,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut state = self.state();
        let doctor_id = state
            .appointments
            .iter()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?
            .doctor_id;
        if !state.doctor_slot_free(doctor_id, start_at, end_at, Some(id)) {
            return Err(StoreError::SlotTaken);
        }
        let appointment = state
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        appointment.start_at = start_at;
        appointment.end_at = end_at;
        appointment.updated_at = now;
        Ok(appointment.clone())
    }

    async fn update_appointment(
        &self,
        id: i64,
        patch: AppointmentPatch,
    ) -> Result<Appointment, StoreError> {
        let mut state = self.state();
        let appointment = state
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(status) = patch.status {
            appointment.status = status;
        }
        if let Some(notes) = patch.notes {
            appointment.notes = notes;
        }
        if let Some(updated_at) = patch.updated_at {
            appointment.updated_at = updated_at;
        }
        Ok(appointment.clone())
    }

    // ==========================================================================
    // ENCOUNTERS
    // ==========================================================================

    async fn get_encounter(&self, id: i64) -> Result<Option<Encounter>, StoreError> {
        Ok(self.state().encounters.iter().find(|e| e.id == id).cloned())
    }

    async fn encounters_for_patient(&self, patient_id: i64) -> Result<Vec<Encounter>, StoreError> {
        let mut matches: Vec<Encounter> = self
            .state()
            .encounters
            .iter()
            .filter(|e| e.patient_id == patient_id)
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.created_at);
        Ok(matches)
    }

    async fn insert_encounter(
        &self,
        new: NewEncounter,
        now: DateTime<Utc>,
    ) -> Result<Encounter, StoreError> {
        let mut state = self.state();
        let id = state.allocate_id();
        let encounter = Encounter {
            id,
            doctor_id: new.doctor_id,
            patient_id: new.patient_id,
            appointment_id: new.appointment_id,
            visit_type: new.visit_type,
            chief_complaint_short: new.chief_complaint_short,
            created_at: now,
            ended_at: None,
            is_signed: false,
        };
        state.encounters.push(encounter.clone());
        Ok(encounter)
    }

    async fn create_encounter_for_appointment(
        &self,
        appointment_id: i64,
        new: NewEncounter,
        now: DateTime<Utc>,
    ) -> Result<Encounter, StoreError> {
        let mut state = self.state();

        let linked = state
            .appointments
            .iter()
            .find(|a| a.id == appointment_id)
            .ok_or(StoreError::NotFound)?
            .encounter_id;
        if let Some(encounter_id) = linked {
            // A concurrent start won; hand back its encounter.
            return state
                .encounters
                .iter()
                .find(|e| e.id == encounter_id)
                .cloned()
                .ok_or(StoreError::NotFound);
        }

        let id = state.allocate_id();
        let encounter = Encounter {
            id,
            doctor_id: new.doctor_id,
            patient_id: new.patient_id,
            appointment_id: Some(appointment_id),
            visit_type: new.visit_type,
            chief_complaint_short: new.chief_complaint_short,
            created_at: now,
            ended_at: None,
            is_signed: false,
        };
        state.encounters.push(encounter.clone());

        if let Some(appointment) = state.appointments.iter_mut().find(|a| a.id == appointment_id) {
            appointment.encounter_id = Some(encounter.id);
            appointment.updated_at = now;
        }
        Ok(encounter)
    }

    async fn close_encounter(
        &self,
        id: i64,
        ended_at: DateTime<Utc>,
    ) -> Result<Encounter, StoreError> {
        let mut state = self.state();
        let encounter = state
            .encounters
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound)?;
        if encounter.ended_at.is_none() {
            encounter.ended_at = Some(ended_at);
        }
        Ok(encounter.clone())
    }

    // ==========================================================================
    // CLINICAL NOTES AND ADDENDA
    // ==========================================================================

    async fn note_for_encounter(
        &self,
        encounter_id: i64,
    ) -> Result<Option<ClinicalNote>, StoreError> {
        Ok(self
            .state()
            .notes
            .iter()
            .find(|n| n.encounter_id == encounter_id)
            .cloned())
    }

    async fn replace_note(
        &self,
        encounter_id: i64,
        content: NoteContent,
    ) -> Result<ClinicalNote, StoreError> {
        let mut state = self.state();
        state.notes.retain(|n| n.encounter_id != encounter_id);
        let id = state.allocate_id();
        let note = ClinicalNote {
            id,
            encounter_id,
            chief_complaint: content.chief_complaint,
            hpi: content.hpi,
            physical_exam: content.physical_exam,
            complementary_tests: content.complementary_tests,
            assessment_dx: content.assessment_dx,
            plan_treatment: content.plan_treatment,
            indications_alarm_signs: content.indications_alarm_signs,
            follow_up: content.follow_up,
            ta_sys: content.ta_sys,
            ta_dia: content.ta_dia,
            hr: content.hr,
            rr: content.rr,
            spo2: content.spo2,
            temp: content.temp,
            weight: content.weight,
            height: content.height,
            bmi: content.bmi,
        };
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn add_evolution(
        &self,
        new: NewEvolution,
        now: DateTime<Utc>,
    ) -> Result<EncounterEvolution, StoreError> {
        let mut state = self.state();
        let id = state.allocate_id();
        let evolution = EncounterEvolution {
            id,
            encounter_id: new.encounter_id,
            author_doctor_id: new.author_doctor_id,
            content: new.content,
            created_at: now,
        };
        state.evolutions.push(evolution.clone());
        Ok(evolution)
    }

    async fn evolutions_for_encounter(
        &self,
        encounter_id: i64,
    ) -> Result<Vec<EncounterEvolution>, StoreError> {
        let mut matches: Vec<EncounterEvolution> = self
            .state()
            .evolutions
            .iter()
            .filter(|e| e.encounter_id == encounter_id)
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.created_at);
        Ok(matches)
    }
}
