use std::sync::Arc;

use tracing::{debug, info};

use shared_models::clock::Clock;
use shared_models::entities::Encounter;
use shared_store::{ClinicStore, NewEncounter};

use crate::models::{EncounterError, EncounterRules, EncounterView, StartEncounterRequest};

const DEFAULT_VISIT_TYPE: &str = "ambulatory";

/// The one ownership rule for mutations: only the doctor who opened the
/// encounter may close it or write its note. Reads are open to any
/// authenticated doctor (shared clinical history).
pub fn authorize_owner(doctor_id: i64, encounter: &Encounter) -> Result<(), EncounterError> {
    if encounter.doctor_id != doctor_id {
        return Err(EncounterError::Forbidden);
    }
    Ok(())
}

pub struct EncounterLifecycleService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    rules: EncounterRules,
}

impl EncounterLifecycleService {
    pub fn new(store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            rules: EncounterRules::default(),
        }
    }

    pub fn rules(&self) -> &EncounterRules {
        &self.rules
    }

    /// Open a walk-in visit that has no appointment behind it.
    pub async fn start_standalone(
        &self,
        doctor_id: i64,
        request: StartEncounterRequest,
    ) -> Result<Encounter, EncounterError> {
        self.store
            .get_patient(request.patient_id)
            .await?
            .ok_or(EncounterError::NotFound)?;

        let visit_type = request
            .visit_type
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VISIT_TYPE)
            .to_string();

        let encounter = self
            .store
            .insert_encounter(
                NewEncounter {
                    doctor_id,
                    patient_id: request.patient_id,
                    appointment_id: None,
                    visit_type,
                    chief_complaint_short: request
                        .chief_complaint
                        .as_deref()
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string),
                },
                self.clock.now(),
            )
            .await?;

        info!(encounter_id = encounter.id, doctor_id, "walk-in encounter opened");
        Ok(encounter)
    }

    /// Close the visit. First write wins on `ended_at`; closing an already
    /// closed encounter returns the original timestamp as a success.
    pub async fn end(
        &self,
        encounter_id: i64,
        doctor_id: i64,
    ) -> Result<Encounter, EncounterError> {
        let encounter = self.require(encounter_id).await?;
        authorize_owner(doctor_id, &encounter)?;

        if let Some(ended_at) = encounter.ended_at {
            debug!(encounter_id, %ended_at, "already closed");
            return Ok(encounter);
        }

        let closed = self
            .store
            .close_encounter(encounter_id, self.clock.now())
            .await?;

        info!(encounter_id, doctor_id, "encounter closed");
        Ok(closed)
    }

    pub fn is_editable(&self, encounter: &Encounter) -> bool {
        self.rules.is_editable(encounter, self.clock.now())
    }

    /// Full view of one visit; readable by any authenticated doctor.
    pub async fn get(&self, encounter_id: i64) -> Result<EncounterView, EncounterError> {
        let encounter = self.require(encounter_id).await?;
        let note = self.store.note_for_encounter(encounter_id).await?;
        let evolutions = self.store.evolutions_for_encounter(encounter_id).await?;
        Ok(EncounterView {
            encounter,
            note,
            evolutions,
        })
    }

    pub async fn list_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<Encounter>, EncounterError> {
        Ok(self.store.encounters_for_patient(patient_id).await?)
    }

    async fn require(&self, encounter_id: i64) -> Result<Encounter, EncounterError> {
        self.store
            .get_encounter(encounter_id)
            .await?
            .ok_or(EncounterError::NotFound)
    }
}
