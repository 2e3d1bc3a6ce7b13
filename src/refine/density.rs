// Adaptive Density Filter
// Loosens the velocity floor inside chords and tightens it in sparse passages

use serde::{Deserialize, Serialize};

use crate::notes::Note;

/// Settings for density-adaptive filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Run this stage at all
    pub enabled: bool,

    /// Window length in seconds, anchored at the first unconsumed note
    pub window: f64,

    /// Minimum group size treated as a chord
    pub chord_threshold: usize,

    /// Velocity floor for chord groups (>= chord_threshold notes)
    pub chord_min_velocity: u8,

    /// Velocity floor for groups of two up to chord_threshold - 1 notes
    pub cluster_min_velocity: u8,

    /// Velocity floor for an isolated note
    pub single_min_velocity: u8,
}

impl Default for DensityConfig {
    fn default() -> Self {
        DensityConfig {
            enabled: true,
            window: 0.1,
            chord_threshold: 4,
            chord_min_velocity: 8,
            cluster_min_velocity: 12,
            single_min_velocity: 18,
        }
    }
}

impl DensityConfig {
    /// Velocity floor for a group of `size` notes
    pub fn min_velocity_for(&self, size: usize) -> u8 {
        if size >= self.chord_threshold {
            self.chord_min_velocity
        } else if size >= 2 {
            self.cluster_min_velocity
        } else {
            self.single_min_velocity
        }
    }
}

/// Drop quiet notes using a threshold chosen by local note density
///
/// Groups are formed greedily: the earliest unconsumed note opens a window
/// of `config.window` seconds and every note starting before the window
/// closes joins the group. The next group opens at the first note past it.
/// Group boundaries are therefore data-dependent, not a fixed grid.
///
/// Returns the surviving notes in time order and the number dropped.
pub fn filter_by_density(notes: Vec<Note>, config: &DensityConfig) -> (Vec<Note>, usize) {
    if notes.is_empty() {
        return (notes, 0);
    }

    let original_count = notes.len();
    let mut sorted = notes;
    sorted.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut kept: Vec<Note> = Vec::with_capacity(sorted.len());
    let mut i = 0;

    while i < sorted.len() {
        let window_end = sorted[i].start_time + config.window;

        let mut j = i;
        while j < sorted.len() && sorted[j].start_time < window_end {
            j += 1;
        }
        // A non-positive window still consumes the anchor note
        let j = j.max(i + 1);

        let group = &sorted[i..j];
        let min_velocity = config.min_velocity_for(group.len());
        let group_start = kept.len();

        for note in group {
            if note.velocity < min_velocity {
                continue;
            }
            if kept[group_start..].contains(note) {
                continue;
            }
            kept.push(*note);
        }

        i = j;
    }

    let removed = original_count - kept.len();
    if removed > 0 {
        log::info!("[Density] Removed {} notes below their local velocity floor", removed);
    }

    (kept, removed)
}
