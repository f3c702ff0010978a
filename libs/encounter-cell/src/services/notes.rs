use std::sync::Arc;

use tracing::{info, warn};

use shared_models::clock::Clock;
use shared_models::entities::{ClinicalNote, EncounterEvolution};
use shared_store::{ClinicStore, NewEvolution, NoteContent};

use crate::models::{AddEvolutionRequest, EncounterError, EncounterRules, UpsertNoteRequest};
use crate::services::lifecycle::authorize_owner;

pub struct ClinicalNoteService {
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    rules: EncounterRules,
}

impl ClinicalNoteService {
    pub fn new(store: Arc<dyn ClinicStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            rules: EncounterRules::default(),
        }
    }

    /// Replace the encounter's note with merged content.
    ///
    /// Narrative fields omitted from the request keep their stored value;
    /// structured lists are rendered to bullet blocks and appended beneath
    /// the narrative they annotate, never replacing it. The storage write is
    /// a full delete-and-recreate.
    pub async fn upsert(
        &self,
        encounter_id: i64,
        doctor_id: i64,
        request: UpsertNoteRequest,
    ) -> Result<ClinicalNote, EncounterError> {
        let encounter = self
            .store
            .get_encounter(encounter_id)
            .await?
            .ok_or(EncounterError::NotFound)?;
        authorize_owner(doctor_id, &encounter)?;

        if !self.rules.is_editable(&encounter, self.clock.now()) {
            warn!(encounter_id, doctor_id, "note edit refused, window closed");
            return Err(EncounterError::EditWindowClosed);
        }

        let existing = self.store.note_for_encounter(encounter_id).await?;
        let content = merge_note(existing, request);

        let note = self.store.replace_note(encounter_id, content).await?;
        info!(encounter_id, doctor_id, "clinical note replaced");
        Ok(note)
    }

    /// Append a timestamped, attributed addendum. No edit window and no
    /// ownership restriction beyond authentication; this is the correction
    /// path once the note is frozen.
    pub async fn add_evolution(
        &self,
        encounter_id: i64,
        doctor_id: i64,
        request: AddEvolutionRequest,
    ) -> Result<EncounterEvolution, EncounterError> {
        self.store
            .get_encounter(encounter_id)
            .await?
            .ok_or(EncounterError::NotFound)?;

        let content = request.content.trim();
        if content.is_empty() {
            return Err(EncounterError::Validation(
                "evolution content is required".to_string(),
            ));
        }

        let evolution = self
            .store
            .add_evolution(
                NewEvolution {
                    encounter_id,
                    author_doctor_id: doctor_id,
                    content: content.to_string(),
                },
                self.clock.now(),
            )
            .await?;

        info!(
            encounter_id,
            doctor_id, evolution_id = evolution.id, "evolution appended"
        );
        Ok(evolution)
    }
}

// ==============================================================================
// MERGE LOGIC
// ==============================================================================

/// Build the replacement content from the stored note and the request.
fn merge_note(existing: Option<ClinicalNote>, request: UpsertNoteRequest) -> NoteContent {
    let existing = existing.unwrap_or_default();

    let chief_complaint = narrative(request.chief_complaint, existing.chief_complaint);
    let hpi = narrative(request.hpi, existing.hpi);
    let physical_exam = narrative(request.physical_exam, existing.physical_exam);
    let indications_alarm_signs =
        narrative(request.indications_alarm_signs, existing.indications_alarm_signs);
    let follow_up = narrative(request.follow_up, existing.follow_up);

    // Structured lists land beneath the narrative they annotate.
    let assessment_dx = with_bullets(
        narrative(request.assessment_dx, existing.assessment_dx),
        request.diagnoses.as_deref(),
    );
    let complementary_tests = with_bullets(
        narrative(request.complementary_tests, existing.complementary_tests),
        request.tests.as_deref(),
    );
    let plan_treatment = with_bullets(
        with_bullets(
            narrative(request.plan_treatment, existing.plan_treatment),
            request.medications.as_deref(),
        ),
        request.plan_items.as_deref(),
    );

    NoteContent {
        chief_complaint,
        hpi,
        physical_exam,
        complementary_tests,
        assessment_dx,
        plan_treatment,
        indications_alarm_signs,
        follow_up,
        ta_sys: vital(request.ta_sys, existing.ta_sys),
        ta_dia: vital(request.ta_dia, existing.ta_dia),
        hr: vital(request.hr, existing.hr),
        rr: vital(request.rr, existing.rr),
        spo2: vital(request.spo2, existing.spo2),
        temp: vital(request.temp, existing.temp),
        weight: vital(request.weight, existing.weight),
        height: vital(request.height, existing.height),
        bmi: vital(request.bmi, existing.bmi),
    }
}

/// Provided text wins; an omitted field keeps what is stored.
fn narrative(provided: Option<String>, stored: Option<String>) -> Option<String> {
    match provided {
        Some(text) => {
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        }
        None => stored,
    }
}

/// Append a bulleted block beneath the narrative. Blank items are skipped;
/// an empty list leaves the narrative untouched.
fn with_bullets(base: Option<String>, items: Option<&[String]>) -> Option<String> {
    let block = items.map(render_bullets).unwrap_or_default();
    if block.is_empty() {
        return base;
    }
    match base {
        Some(text) if !text.trim().is_empty() => {
            Some(format!("{}\n{}", text.trim_end(), block))
        }
        _ => Some(block),
    }
}

fn render_bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lenient vitals: omitted keeps the stored value, blank clears it, and
/// unparseable text stores nothing instead of failing the request.
fn vital<T: std::str::FromStr>(provided: Option<String>, stored: Option<T>) -> Option<T> {
    match provided {
        Some(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                None
            } else {
                raw.parse().ok()
            }
        }
        None => stored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_with_plan(text: &str) -> ClinicalNote {
        ClinicalNote {
            plan_treatment: Some(text.to_string()),
            ..ClinicalNote::default()
        }
    }

    #[test]
    fn bullets_append_beneath_existing_narrative() {
        let merged = merge_note(
            Some(note_with_plan("rest and ice for two days")),
            UpsertNoteRequest {
                medications: Some(vec!["ibuprofen 400mg".to_string(), " ".to_string()]),
                plan_items: Some(vec!["physio twice a week".to_string()]),
                ..UpsertNoteRequest::default()
            },
        );

        assert_eq!(
            merged.plan_treatment.as_deref(),
            Some("rest and ice for two days\n- ibuprofen 400mg\n- physio twice a week")
        );
    }

    #[test]
    fn omitted_fields_keep_stored_values() {
        let merged = merge_note(
            Some(ClinicalNote {
                hpi: Some("three weeks of pain".to_string()),
                ta_sys: Some(120),
                ..ClinicalNote::default()
            }),
            UpsertNoteRequest {
                chief_complaint: Some("lower back pain".to_string()),
                ..UpsertNoteRequest::default()
            },
        );

        assert_eq!(merged.chief_complaint.as_deref(), Some("lower back pain"));
        assert_eq!(merged.hpi.as_deref(), Some("three weeks of pain"));
        assert_eq!(merged.ta_sys, Some(120));
    }

    #[test]
    fn unparseable_vitals_store_none_instead_of_failing() {
        let merged = merge_note(
            None,
            UpsertNoteRequest {
                ta_sys: Some("120".to_string()),
                ta_dia: Some("eighty".to_string()),
                temp: Some("36.8".to_string()),
                spo2: Some("".to_string()),
                ..UpsertNoteRequest::default()
            },
        );

        assert_eq!(merged.ta_sys, Some(120));
        assert_eq!(merged.ta_dia, None);
        assert_eq!(merged.temp, Some(36.8));
        assert_eq!(merged.spo2, None);
    }

    #[test]
    fn lists_without_narrative_form_the_whole_field() {
        let merged = merge_note(
            None,
            UpsertNoteRequest {
                diagnoses: Some(vec!["lumbago".to_string(), "sciatica".to_string()]),
                ..UpsertNoteRequest::default()
            },
        );

        assert_eq!(merged.assessment_dx.as_deref(), Some("- lumbago\n- sciatica"));
    }
}
