// Configuration
// Whole-run settings, loaded from JSON and validated before a run starts

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::export::MidiExportOptions;
use crate::notes::AdmissionConfig;
use crate::refine::RefinementConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration parameter: {0}")]
    InvalidParameter(String),
}

/// Settings for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub admission: AdmissionConfig,
    pub refinement: RefinementConfig,
    pub midi: MidiExportOptions,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: "1.0".to_string(),
            admission: AdmissionConfig::default(),
            refinement: RefinementConfig::default(),
            midi: MidiExportOptions::default(),
        }
    }
}

/// Load and validate a JSON configuration file
///
/// Missing sections and fields fall back to their defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject settings no run could use meaningfully
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let admission = &config.admission;
    if admission.min_pitch > admission.max_pitch {
        return invalid(format!(
            "admission.min_pitch ({}) is above admission.max_pitch ({})",
            admission.min_pitch, admission.max_pitch
        ));
    }
    if admission.max_pitch > 127 {
        return invalid("admission.max_pitch must be at most 127".to_string());
    }
    if !(admission.min_duration >= 0.0) {
        return invalid("admission.min_duration must be non-negative".to_string());
    }
    if admission.max_events == 0 {
        return invalid("admission.max_events must be positive".to_string());
    }

    let density = &config.refinement.density;
    if !(density.window > 0.0) {
        return invalid("refinement.density.window must be positive".to_string());
    }
    if density.chord_threshold < 2 {
        return invalid("refinement.density.chord_threshold must be at least 2".to_string());
    }
    for (name, value) in [
        ("chord_min_velocity", density.chord_min_velocity),
        ("cluster_min_velocity", density.cluster_min_velocity),
        ("single_min_velocity", density.single_min_velocity),
    ] {
        if value > 127 {
            return invalid(format!("refinement.density.{} must be at most 127", name));
        }
    }

    let harmonic = &config.refinement.harmonic;
    if !(harmonic.time_tolerance > 0.0) {
        return invalid("refinement.harmonic.time_tolerance must be positive".to_string());
    }
    if !(harmonic.ratio_threshold > 0.0 && harmonic.ratio_threshold <= 1.0) {
        return invalid("refinement.harmonic.ratio_threshold must be in (0, 1]".to_string());
    }

    let merge = &config.refinement.merge;
    if !(merge.min_gap >= 0.0) {
        return invalid("refinement.merge.min_gap must be non-negative".to_string());
    }
    if !(merge.max_duration > 0.0) {
        return invalid("refinement.merge.max_duration must be positive".to_string());
    }

    if config.midi.ppq == 0 {
        return invalid("midi.ppq must be positive".to_string());
    }
    if !(config.midi.bpm > 0.0) {
        return invalid("midi.bpm must be positive".to_string());
    }

    Ok(())
}

fn invalid(message: String) -> Result<(), ConfigError> {
    Err(ConfigError::InvalidParameter(message))
}
