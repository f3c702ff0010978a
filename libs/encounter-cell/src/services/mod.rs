pub mod lifecycle;
pub mod notes;

pub use lifecycle::EncounterLifecycleService;
pub use notes::ClinicalNoteService;
