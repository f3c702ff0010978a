use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use shared_models::audit::AuditTrail;
use shared_models::clock::Clock;
use shared_models::entities::{Appointment, AppointmentStatus, Encounter};
use shared_store::{AppointmentPatch, ClinicStore, NewAppointment, NewEncounter, StoreError};

use crate::models::{
    AppointmentError, CreateAppointmentRequest, RescheduleAppointmentRequest, SchedulingRules,
};
use crate::services::conflict::ConflictDetectionService;

const DEFAULT_VISIT_TYPE: &str = "ambulatory";
const REASON_MAX_CHARS: usize = 120;

pub struct AppointmentSchedulerService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    conflict_service: ConflictDetectionService,
    rules: SchedulingRules,
}

impl AppointmentSchedulerService {
    pub fn new(store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_rules(store, clock, SchedulingRules::default())
    }

    pub fn with_rules(
        store: Arc<dyn ClinicStore>,
        clock: Arc<dyn Clock>,
        rules: SchedulingRules,
    ) -> Self {
        let conflict_service = ConflictDetectionService::new(Arc::clone(&store));
        Self {
            store,
            clock,
            conflict_service,
            rules,
        }
    }

    pub fn conflicts(&self) -> &ConflictDetectionService {
        &self.conflict_service
    }

    /// Book a new slot for the calling doctor. The overlap check and the
    /// insert run as one storage transaction.
    pub async fn create(
        &self,
        doctor_id: i64,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let duration = self.validate_duration(request.duration_minutes)?;
        let start_at = request.start_at;
        self.reject_past_start(start_at)?;
        let end_at = start_at + duration;

        self.store
            .get_patient(request.patient_id)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;

        let notes = match request.notes.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => AuditTrail::new(text),
            _ => AuditTrail::default(),
        };

        let appointment = self
            .store
            .insert_appointment_if_free(
                NewAppointment {
                    doctor_id,
                    patient_id: request.patient_id,
                    start_at,
                    end_at,
                    reason: clean_reason(request.reason),
                    notes,
                },
                self.clock.now(),
            )
            .await?;

        info!(
            appointment_id = appointment.id,
            doctor_id, patient_id = appointment.patient_id, "appointment booked"
        );
        Ok(appointment)
    }

    /// Move an existing appointment to a new slot. The conflict check
    /// excludes the appointment's own interval.
    pub async fn reschedule(
        &self,
        appointment_id: i64,
        doctor_id: i64,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.owned_appointment(appointment_id, doctor_id).await?;

        let duration = self.validate_duration(request.duration_minutes)?;
        self.reject_past_start(request.start_at)?;
        let end_at = request.start_at + duration;

        let moved = self
            .store
            .reschedule_appointment_if_free(appointment.id, request.start_at, end_at, self.clock.now())
            .await?;

        info!(appointment_id, doctor_id, "appointment rescheduled");
        Ok(moved)
    }

    /// Cancel a slot. Re-canceling is a no-op success; the slot never blocks
    /// other bookings again.
    pub async fn cancel(
        &self,
        appointment_id: i64,
        doctor_id: i64,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.owned_appointment(appointment_id, doctor_id).await?;

        if appointment.status == AppointmentStatus::Canceled {
            debug!(appointment_id, "already canceled, nothing to do");
            return Ok(appointment);
        }

        let now = self.clock.now();
        let mut notes = appointment.notes.clone();
        if let Some(reason) = reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            notes.append_entry(now, "CANCELED", reason);
        }

        let canceled = self
            .store
            .update_appointment(
                appointment.id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Canceled),
                    notes: Some(notes),
                    updated_at: Some(now),
                },
            )
            .await?;

        info!(appointment_id, doctor_id, "appointment canceled");
        Ok(canceled)
    }

    /// Confirm a scheduled slot. Confirming twice is a no-op success.
    pub async fn confirm(
        &self,
        appointment_id: i64,
        doctor_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.owned_appointment(appointment_id, doctor_id).await?;

        match appointment.status {
            AppointmentStatus::Confirmed => Ok(appointment),
            AppointmentStatus::Scheduled => {
                let confirmed = self
                    .store
                    .update_appointment(
                        appointment.id,
                        AppointmentPatch {
                            status: Some(AppointmentStatus::Confirmed),
                            notes: None,
                            updated_at: Some(self.clock.now()),
                        },
                    )
                    .await?;
                Ok(confirmed)
            }
            status => Err(AppointmentError::InvalidState(status)),
        }
    }

    /// Record that the patient did not arrive. The reason is mandatory and
    /// lands on the append-only audit trail, never overwriting prior notes.
    pub async fn mark_no_show(
        &self,
        appointment_id: i64,
        doctor_id: i64,
        reason: &str,
    ) -> Result<Appointment, AppointmentError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::Validation(
                "a no-show reason is required".to_string(),
            ));
        }

        let appointment = self.owned_appointment(appointment_id, doctor_id).await?;
        if appointment.status == AppointmentStatus::Completed {
            return Err(AppointmentError::InvalidState(appointment.status));
        }

        let now = self.clock.now();
        let mut notes = appointment.notes.clone();
        notes.append_entry(now, "NO_SHOW", reason);

        let updated = self
            .store
            .update_appointment(
                appointment.id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::NoShow),
                    notes: Some(notes),
                    updated_at: Some(now),
                },
            )
            .await?;

        info!(appointment_id, doctor_id, "appointment marked no-show");
        Ok(updated)
    }

    /// Open the clinical visit for an appointment.
    ///
    /// Re-entry is idempotent: once an encounter is linked, every later call
    /// returns it. A fresh start must land inside the start window
    /// [start - early, end + late]; the appointment status itself is left
    /// untouched (appointment status and encounter state are independently
    /// observable).
    pub async fn start_encounter(
        &self,
        appointment_id: i64,
        doctor_id: i64,
    ) -> Result<Encounter, AppointmentError> {
        let appointment = self.owned_appointment(appointment_id, doctor_id).await?;

        match appointment.status {
            AppointmentStatus::Canceled | AppointmentStatus::NoShow => {
                return Err(AppointmentError::InvalidState(appointment.status));
            }
            _ => {}
        }

        if let Some(encounter_id) = appointment.encounter_id {
            debug!(appointment_id, encounter_id, "re-entering linked encounter");
            return self
                .store
                .get_encounter(encounter_id)
                .await?
                .ok_or(AppointmentError::NotFound);
        }

        // Completed but never linked: there is nothing left to open.
        if appointment.status == AppointmentStatus::Completed {
            return Err(AppointmentError::InvalidState(appointment.status));
        }

        let now = self.clock.now();
        let window_open = appointment.start_at - Duration::minutes(self.rules.start_window_early_minutes);
        let window_close = appointment.end_at + Duration::minutes(self.rules.start_window_late_minutes);
        if now < window_open || now > window_close {
            return Err(AppointmentError::OutOfWindow);
        }

        let encounter = self
            .store
            .create_encounter_for_appointment(
                appointment.id,
                NewEncounter {
                    doctor_id,
                    patient_id: appointment.patient_id,
                    appointment_id: Some(appointment.id),
                    visit_type: DEFAULT_VISIT_TYPE.to_string(),
                    chief_complaint_short: clean_reason(appointment.reason.clone()),
                },
                now,
            )
            .await?;

        info!(
            appointment_id,
            encounter_id = encounter.id,
            doctor_id,
            "encounter started from appointment"
        );
        Ok(encounter)
    }

    pub async fn get(&self, appointment_id: i64) -> Result<Appointment, AppointmentError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// The doctor's agenda: every appointment intersecting [from, to).
    pub async fn agenda(
        &self,
        doctor_id: i64,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .store
            .appointments_for_doctor_in_range(doctor_id, from, to, None)
            .await?)
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    async fn owned_appointment(
        &self,
        appointment_id: i64,
        doctor_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .await
            .map_err(|e: StoreError| AppointmentError::from(e))?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.doctor_id != doctor_id {
            return Err(AppointmentError::Forbidden);
        }
        Ok(appointment)
    }

    fn validate_duration(&self, minutes: i64) -> Result<Duration, AppointmentError> {
        if minutes < self.rules.min_duration_minutes || minutes > self.rules.max_duration_minutes {
            return Err(AppointmentError::InvalidDuration {
                min: self.rules.min_duration_minutes,
                max: self.rules.max_duration_minutes,
            });
        }
        Ok(Duration::minutes(minutes))
    }

    fn reject_past_start(
        &self,
        start_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppointmentError> {
        let tolerance = Duration::minutes(self.rules.clock_skew_tolerance_minutes);
        if start_at < self.clock.now() - tolerance {
            return Err(AppointmentError::PastDate);
        }
        Ok(())
    }
}

fn clean_reason(reason: Option<String>) -> Option<String> {
    reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| r.chars().take(REASON_MAX_CHARS).collect())
}
