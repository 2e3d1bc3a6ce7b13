// Pipeline execution and monitoring module
// Runs one analysis end to end and records its progress and result

pub mod analysis;
pub mod document;
pub mod trace;

pub use analysis::{analyze_events, analyze_events_with_observer, AnalysisOutput};
pub use document::{calculate_sha256, DocumentError, NoteRecord, NotesDocument, SourceInfo};
pub use trace::{read_trace_file, TraceBuilder, TraceEntry, TraceError, TraceWriter};
