// Note model module
// Note types and the admission filter for raw model output

pub mod admission;
pub mod types;

pub use admission::{admit_events, round_millis, AdmissionConfig, AdmissionReport};
pub use types::{sort_notes, total_duration, Note, RawNoteEvent};
