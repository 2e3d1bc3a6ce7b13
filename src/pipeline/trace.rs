// Pipeline progress tracing
// Append-only JSONL trace file for monitoring an analysis run

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A single progress entry for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// ISO 8601 timestamp of when this entry was created
    pub timestamp: String,

    /// Run this entry belongs to
    pub run_id: Uuid,

    /// Stage name (e.g., "admission", "harmonic", "merge")
    pub stage: String,

    /// Progress of the whole run [0.0, 1.0]
    pub progress: f32,

    /// Human-readable message describing the stage outcome
    pub message: String,

    /// Optional structured data (e.g., surviving note count)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Create a new trace entry with current timestamp
    pub fn new(run_id: Uuid, stage: String, progress: f32, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id,
            stage,
            progress: progress.clamp(0.0, 1.0),
            message,
            data: None,
        }
    }

    /// Attach structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Helper builder for entries of one run
#[derive(Debug, Clone, Copy)]
pub struct TraceBuilder {
    run_id: Uuid,
}

impl TraceBuilder {
    pub fn for_run(run_id: Uuid) -> Self {
        TraceBuilder { run_id }
    }

    /// Create a start entry (progress = 0.0)
    pub fn start(&self, stage: impl Into<String>, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.run_id, stage.into(), 0.0, message.into())
    }

    /// Create a progress entry
    pub fn progress(&self, stage: impl Into<String>, progress: f32, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.run_id, stage.into(), progress, message.into())
    }

    /// Create a complete entry (progress = 1.0)
    pub fn complete(&self, stage: impl Into<String>, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.run_id, stage.into(), 1.0, message.into())
    }
}

/// Manages an append-only JSONL trace file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        self.write_batch(std::slice::from_ref(entry))
    }

    /// Append multiple entries at once
    pub fn write_batch(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for entry in entries {
            let json_line = entry.to_json_line()?;
            file.write_all(json_line.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}
