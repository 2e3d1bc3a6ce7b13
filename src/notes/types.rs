// Note types
// Defines the refined note, the raw model event, and note ordering helpers

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Lowest MIDI pitch
pub const MIN_PITCH: u8 = 0;

/// Highest MIDI pitch
pub const MAX_PITCH: u8 = 127;

/// Quietest velocity a surviving note may carry (a note must stay audible)
pub const MIN_VELOCITY: u8 = 1;

/// Loudest MIDI velocity
pub const MAX_VELOCITY: u8 = 127;

/// A single detected keystroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Semitone index (60 = middle C)
    /// Pitch identity is the merge/group key and never changes
    pub pitch: u8,

    /// Onset in seconds from the start of the source audio
    pub start_time: f64,

    /// Length in seconds
    pub duration: f64,

    /// Perceptual strike intensity [1, 127]
    pub velocity: u8,
}

impl Note {
    /// Create a note, clamping every field into its valid range
    pub fn new(pitch: i64, start_time: f64, duration: f64, velocity: i64) -> Self {
        Note {
            pitch: pitch.clamp(MIN_PITCH as i64, MAX_PITCH as i64) as u8,
            start_time: non_negative(start_time),
            duration: non_negative(duration),
            velocity: velocity.clamp(MIN_VELOCITY as i64, MAX_VELOCITY as i64) as u8,
        }
    }

    /// Time at which the note stops sounding
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Negative and non-finite values collapse to zero
fn non_negative(value: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        0.0
    } else {
        value
    }
}

/// A raw event as emitted by the pitch-detection model
///
/// Velocity is already scaled into a [0, 127]-compatible range but may be
/// fractional. Nothing here is trusted; the admission filter decides what
/// becomes a [`Note`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNoteEvent {
    /// Onset in seconds
    pub start_time: f64,

    /// Release in seconds
    pub end_time: f64,

    /// MIDI pitch as reported by the model (may be out of range)
    pub pitch: i64,

    /// Intensity in model units, [0, 127]-compatible
    pub velocity: f64,
}

impl RawNoteEvent {
    pub fn new(start_time: f64, end_time: f64, pitch: i64, velocity: f64) -> Self {
        RawNoteEvent {
            start_time,
            end_time,
            pitch,
            velocity,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Order by onset, ties broken by pitch
pub fn time_then_pitch(a: &Note, b: &Note) -> Ordering {
    a.start_time
        .total_cmp(&b.start_time)
        .then(a.pitch.cmp(&b.pitch))
}

/// Stable sort into output order (onset ascending, then pitch ascending)
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(time_then_pitch);
}

/// Latest release time over a note sequence, 0.0 when empty
pub fn total_duration(notes: &[Note]) -> f64 {
    notes.iter().map(Note::end_time).fold(0.0, f64::max)
}
