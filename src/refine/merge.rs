// De-jitter Merger
// Coalesces fragmented detections per pitch and caps pedal-length sustains

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::notes::types::sort_notes;
use crate::notes::Note;

/// Settings for fragment merging and the sustain cap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Same-pitch notes separated by less than this many seconds are merged
    pub min_gap: f64,

    /// Longest allowed note in seconds
    pub max_duration: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            min_gap: 0.03,
            max_duration: 3.0,
        }
    }
}

/// What the merger changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Fragments absorbed into an earlier note of the same pitch
    pub merged: usize,

    /// Notes shortened to the sustain cap
    pub truncated: usize,
}

/// Notes grouped by pitch, each group in onset order
struct PitchGroups(BTreeMap<u8, Vec<Note>>);

impl PitchGroups {
    fn from_notes(notes: Vec<Note>) -> Self {
        let mut groups: BTreeMap<u8, Vec<Note>> = BTreeMap::new();
        for note in notes {
            groups.entry(note.pitch).or_default().push(note);
        }
        for group in groups.values_mut() {
            group.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        }
        PitchGroups(groups)
    }
}

/// Merge same-pitch fragments and cap durations
///
/// Within one pitch, a note starting less than `min_gap` after the current
/// note ends is folded into it: the end becomes the later of the two ends
/// and the velocity the louder of the two. Pitches never interact. After
/// merging, durations above `max_duration` are cut to it.
///
/// Output is sorted by onset, ties by pitch.
pub fn merge_fragments(notes: Vec<Note>, config: &MergeConfig) -> (Vec<Note>, MergeOutcome) {
    let mut outcome = MergeOutcome::default();
    if notes.is_empty() {
        return (notes, outcome);
    }

    let mut refined = Vec::with_capacity(notes.len());

    for (_, group) in PitchGroups::from_notes(notes).0 {
        let mut fragments = group.into_iter();
        let Some(mut current) = fragments.next() else {
            continue;
        };

        for next in fragments {
            let current_end = current.end_time();
            let gap = next.start_time - current_end;

            if gap < config.min_gap {
                let new_end = current_end.max(next.end_time());
                current.duration = new_end - current.start_time;
                current.velocity = current.velocity.max(next.velocity);
                outcome.merged += 1;
            } else {
                refined.push(current);
                current = next;
            }
        }

        refined.push(current);
    }

    for note in refined.iter_mut() {
        if note.duration > config.max_duration {
            note.duration = config.max_duration;
            outcome.truncated += 1;
        }
    }

    sort_notes(&mut refined);

    if outcome.merged > 0 {
        log::info!("[Refine] Merged {} fragments", outcome.merged);
    }
    if outcome.truncated > 0 {
        log::info!(
            "[Refine] Truncated {} overlong notes (max={}s)",
            outcome.truncated,
            config.max_duration
        );
    }

    (refined, outcome)
}
