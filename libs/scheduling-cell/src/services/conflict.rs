use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use shared_store::ClinicStore;

use crate::models::{AppointmentError, ConflictCheckResponse};

/// Read-only overlap detection for a doctor's calendar.
///
/// This answers advisory queries; the authoritative check runs inside the
/// store's guarded insert/reschedule so that check and write are one
/// transaction.
pub struct ConflictDetectionService {
    store: Arc<dyn ClinicStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// True iff a non-canceled appointment of the doctor overlaps
    /// [start_at, end_at), excluding `exclude_appointment_id`.
    pub async fn overlaps(
        &self,
        doctor_id: i64,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude_appointment_id: Option<i64>,
    ) -> Result<bool, AppointmentError> {
        let response = self
            .check_conflicts(doctor_id, start_at, end_at, exclude_appointment_id)
            .await?;
        Ok(response.has_conflict)
    }

    /// Overlap check that also reports the conflicting appointments.
    pub async fn check_conflicts(
        &self,
        doctor_id: i64,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        exclude_appointment_id: Option<i64>,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        debug!(
            doctor_id,
            %start_at,
            %end_at,
            "checking conflicts"
        );

        let in_range = self
            .store
            .appointments_for_doctor_in_range(doctor_id, start_at, end_at, exclude_appointment_id)
            .await?;

        let conflicting_appointments: Vec<_> =
            in_range.into_iter().filter(|a| a.blocks_slot()).collect();

        let has_conflict = !conflicting_appointments.is_empty();
        if has_conflict {
            warn!(
                doctor_id,
                conflicts = conflicting_appointments.len(),
                "conflict detected"
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict,
            conflicting_appointments,
        })
    }
}
