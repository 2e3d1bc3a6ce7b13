// Pianoscribe - Piano note refinement for pitch-detection model output
// Module declarations

pub mod config;
pub mod export;
pub mod notes;
pub mod pipeline;
pub mod refine;

pub use config::{load_config, validate_config, Config, ConfigError};
pub use notes::{Note, RawNoteEvent};
pub use pipeline::{analyze_events, analyze_events_with_observer, AnalysisOutput, NotesDocument, SourceInfo};
pub use refine::{refine_notes, RefinementConfig, RefinementResult, RefinementStatistics, VelocityCurve};
