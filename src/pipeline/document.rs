// Result document
// The notes.json payload handed to playback and visualization consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::notes::{round_millis, AdmissionReport, Note};
use crate::refine::RefinementStatistics;

/// Label written into every document
pub const ANALYSIS_METHOD: &str = "pitch-detection model + refinement pipeline";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One refined note as written to the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub pitch: u8,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub velocity: u8,
}

impl From<&Note> for NoteRecord {
    fn from(note: &Note) -> Self {
        NoteRecord {
            pitch: note.pitch,
            start_time: round_millis(note.start_time),
            end_time: round_millis(note.end_time()),
            duration: round_millis(note.duration),
            velocity: note.velocity,
        }
    }
}

/// Which stages ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingPipeline {
    pub admission_filter: bool,
    pub adaptive_threshold: bool,
    pub harmonic_filter: bool,
    pub fragment_merge: bool,
    pub velocity_curve: bool,
}

impl ProcessingPipeline {
    pub fn from_config(config: &Config) -> Self {
        ProcessingPipeline {
            admission_filter: true,
            adaptive_threshold: config.refinement.density.enabled,
            harmonic_filter: config.refinement.harmonic.enabled,
            fragment_merge: true,
            velocity_curve: config.refinement.velocity.enabled,
        }
    }
}

/// Admission and refinement counters for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Raw events received from the model
    pub original_count: usize,

    /// Notes in the document
    pub final_count: usize,

    /// Share of raw events that did not survive as separate notes, in percent
    pub filter_rate_percent: f64,

    pub admission: AdmissionReport,
    pub refinement: RefinementStatistics,
}

/// Where the events came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Source identifier (file name or URL)
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Hex SHA-256 of the source bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl SourceInfo {
    pub fn named(name: impl Into<String>) -> Self {
        SourceInfo {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attach the digest of the bytes the events were read from
    pub fn with_digest(mut self, data: &[u8]) -> Self {
        self.sha256 = Some(calculate_sha256(data));
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub source: SourceInfo,

    /// Latest note release in seconds
    pub total_duration: f64,

    pub note_count: usize,
    pub analysis_method: String,
    pub processing_pipeline: ProcessingPipeline,

    /// Every setting the run used
    pub parameters: Config,

    pub statistics: RunStatistics,
}

/// Complete result of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesDocument {
    pub metadata: DocumentMetadata,
    pub notes: Vec<NoteRecord>,
}

impl NotesDocument {
    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as pretty-printed JSON, replacing any existing file
    pub fn write(&self, path: &Path) -> Result<(), DocumentError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
