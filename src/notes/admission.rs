// Admission filter
// Turns raw model events into plausible candidate notes before refinement

use serde::{Deserialize, Serialize};

use super::types::{time_then_pitch, Note, RawNoteEvent};

/// Bounds a raw event must satisfy to become a candidate note
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Lowest accepted pitch (A0 on an 88-key piano)
    pub min_pitch: u8,

    /// Highest accepted pitch (C8 on an 88-key piano)
    pub max_pitch: u8,

    /// Shortest accepted event in seconds
    pub min_duration: f64,

    /// Quietest accepted velocity
    pub min_velocity: u8,

    /// Upper bound on candidates handed to the refinement stages
    pub max_events: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        AdmissionConfig {
            min_pitch: 21,
            max_pitch: 108,
            min_duration: 0.04,
            min_velocity: 10,
            max_events: 10_000,
        }
    }
}

/// Counts of what the admission filter did with each raw event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionReport {
    pub raw_count: usize,
    pub malformed: usize,
    pub out_of_range: usize,
    pub too_short: usize,
    pub too_quiet: usize,
    pub over_limit: usize,
    pub admitted: usize,
}

/// Filter raw model events down to candidate notes
///
/// Rejection order per event: malformed timing, pitch range, duration,
/// velocity. Each rejected event is counted under the first rule it fails.
/// Times are rounded to millisecond precision.
pub fn admit_events(raw: &[RawNoteEvent], config: &AdmissionConfig) -> (Vec<Note>, AdmissionReport) {
    let mut report = AdmissionReport {
        raw_count: raw.len(),
        ..Default::default()
    };
    let mut admitted = Vec::with_capacity(raw.len());

    for event in raw {
        if !event.start_time.is_finite() || !event.end_time.is_finite() || !event.velocity.is_finite() {
            report.malformed += 1;
            continue;
        }

        if event.pitch < config.min_pitch as i64 || event.pitch > config.max_pitch as i64 {
            report.out_of_range += 1;
            continue;
        }

        if event.duration() < config.min_duration {
            report.too_short += 1;
            continue;
        }

        let velocity = (event.velocity.trunc() as i64).clamp(0, 127);
        if velocity < config.min_velocity as i64 {
            report.too_quiet += 1;
            continue;
        }

        let start_time = round_millis(event.start_time);
        let end_time = round_millis(event.end_time);
        admitted.push(Note::new(
            event.pitch,
            start_time,
            round_millis(end_time - start_time),
            velocity,
        ));
    }

    if admitted.len() > config.max_events {
        admitted.sort_by(time_then_pitch);
        report.over_limit = admitted.len() - config.max_events;
        admitted.truncate(config.max_events);
        log::warn!(
            "[Admission] {} candidates exceed the limit of {}, dropped {} latest",
            config.max_events + report.over_limit,
            config.max_events,
            report.over_limit
        );
    }

    report.admitted = admitted.len();
    log::info!(
        "[Admission] {} raw events -> {} candidates ({} out of range, {} too short, {} too quiet, {} malformed)",
        report.raw_count,
        report.admitted,
        report.out_of_range,
        report.too_short,
        report.too_quiet,
        report.malformed
    );

    (admitted, report)
}

/// Round seconds to millisecond precision
pub fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
