// Harmonic Filter
// Removes quiet upper notes that are overtone ghosts of a simultaneous lower note

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::notes::types::time_then_pitch;
use crate::notes::Note;

/// Intervals (in semitones above the base) at which overtones are detected:
/// fifth, octave, octave + fifth, two octaves
pub const HARMONIC_INTERVALS: [i16; 4] = [7, 12, 19, 24];

/// Settings for harmonic ghost removal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonicConfig {
    /// Run this stage at all
    pub enabled: bool,

    /// Maximum onset difference in seconds for two notes to count as simultaneous
    pub time_tolerance: f64,

    /// Upper/base velocity ratio below which the upper note is treated as a ghost
    pub ratio_threshold: f64,
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        HarmonicConfig {
            enabled: true,
            time_tolerance: 0.02,
            ratio_threshold: 0.35,
        }
    }
}

/// Notes indexed by onset bucket of width `time_tolerance`
///
/// Any two notes whose onsets are within one tolerance of each other land in
/// the same or adjacent buckets, so a lookup only scans three buckets.
struct OnsetIndex {
    tolerance: f64,
    buckets: HashMap<i64, Vec<usize>>,
}

impl OnsetIndex {
    fn build(notes: &[Note], tolerance: f64) -> Self {
        let mut index = OnsetIndex {
            tolerance,
            buckets: HashMap::new(),
        };
        for (i, note) in notes.iter().enumerate() {
            let key = index.bucket_of(note.start_time);
            index.buckets.entry(key).or_default().push(i);
        }
        index
    }

    fn bucket_of(&self, time: f64) -> i64 {
        (time / self.tolerance).round() as i64
    }

    /// Indices of notes that may start within tolerance of `time`
    fn near(&self, time: f64) -> impl Iterator<Item = usize> + '_ {
        let key = self.bucket_of(time);
        (key.saturating_sub(1)..=key.saturating_add(1))
            .filter_map(move |k| self.buckets.get(&k))
            .flatten()
            .copied()
    }
}

/// Whether `other` looks like an overtone ghost of `base`
pub fn is_harmonic_ghost(base: &Note, other: &Note, config: &HarmonicConfig) -> bool {
    if (other.start_time - base.start_time).abs() > config.time_tolerance {
        return false;
    }

    let pitch_diff = other.pitch as i16 - base.pitch as i16;
    if !HARMONIC_INTERVALS.contains(&pitch_diff) {
        return false;
    }

    let ratio = other.velocity as f64 / base.velocity.max(1) as f64;
    ratio < config.ratio_threshold
}

/// Remove probable overtone ghosts
///
/// Bases are visited in onset order (ties by pitch). A note already marked
/// for removal neither acts as a base nor gets compared again. Survivors
/// keep their input order.
///
/// Returns the surviving notes and the number removed.
pub fn filter_harmonics(notes: Vec<Note>, config: &HarmonicConfig) -> (Vec<Note>, usize) {
    if notes.is_empty() || config.time_tolerance <= 0.0 {
        return (notes, 0);
    }

    let index = OnsetIndex::build(&notes, config.time_tolerance);

    let mut base_order: Vec<usize> = (0..notes.len()).collect();
    base_order.sort_by(|&a, &b| time_then_pitch(&notes[a], &notes[b]));

    let mut removed = vec![false; notes.len()];

    for &b in &base_order {
        if removed[b] {
            continue;
        }
        let base = &notes[b];

        for o in index.near(base.start_time) {
            if o == b || removed[o] {
                continue;
            }
            let other = &notes[o];

            if is_harmonic_ghost(base, other, config) {
                removed[o] = true;
                log::debug!(
                    "[Harmonic] Removed probable overtone {} (base {}, velocity ratio {:.2})",
                    other.pitch,
                    base.pitch,
                    other.velocity as f64 / base.velocity.max(1) as f64
                );
            }
        }
    }

    let removed_count = removed.iter().filter(|&&r| r).count();
    let survivors = notes
        .into_iter()
        .zip(removed)
        .filter_map(|(note, gone)| (!gone).then_some(note))
        .collect();

    if removed_count > 0 {
        log::info!("[Harmonic] Removed {} probable overtones", removed_count);
    }

    (survivors, removed_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: i64, start_time: f64, velocity: i64) -> Note {
        Note::new(pitch, start_time, 0.2, velocity)
    }

    #[test]
    fn test_octave_ghost_removed() {
        let base = note(60, 1.0, 100);
        let notes = vec![base, note(72, 1.0, 30)];

        let (kept, removed) = filter_harmonics(notes, &HarmonicConfig::default());

        assert_eq!(removed, 1);
        assert_eq!(kept, vec![base]);
    }

    #[test]
    fn test_all_harmonic_intervals_detected() {
        for interval in HARMONIC_INTERVALS {
            let notes = vec![note(48, 0.5, 100), note(48 + interval as i64, 0.51, 20)];
            let (kept, removed) = filter_harmonics(notes, &HarmonicConfig::default());
            assert_eq!(removed, 1, "interval {} not detected", interval);
            assert_eq!(kept[0].pitch, 48);
        }
    }

    #[test]
    fn test_loud_upper_note_survives() {
        // Ratio 0.4 >= 0.35: an independently played note
        let notes = vec![note(60, 1.0, 100), note(72, 1.0, 40)];

        let (kept, removed) = filter_harmonics(notes, &HarmonicConfig::default());

        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_ratio_at_threshold_never_removed() {
        let config = HarmonicConfig {
            ratio_threshold: 0.5,
            ..Default::default()
        };

        for interval in HARMONIC_INTERVALS {
            let notes = vec![note(40, 0.0, 100), note(40 + interval as i64, 0.0, 50)];
            let (_, removed) = filter_harmonics(notes, &config);
            assert_eq!(removed, 0);
        }
    }

    #[test]
    fn test_non_harmonic_interval_ignored() {
        // Major third above, very quiet
        let notes = vec![note(60, 1.0, 100), note(64, 1.0, 5)];

        let (_, removed) = filter_harmonics(notes, &HarmonicConfig::default());

        assert_eq!(removed, 0);
    }

    #[test]
    fn test_lower_note_never_removed_by_upper() {
        let notes = vec![note(72, 1.0, 100), note(60, 1.0, 10)];

        let (_, removed) = filter_harmonics(notes, &HarmonicConfig::default());

        assert_eq!(removed, 0);
    }

    #[test]
    fn test_outside_time_tolerance_ignored() {
        let notes = vec![note(60, 1.0, 100), note(72, 1.05, 10)];

        let (_, removed) = filter_harmonics(notes, &HarmonicConfig::default());

        assert_eq!(removed, 0);
    }

    #[test]
    fn test_removed_note_cannot_remove_others() {
        // 60 is a ghost of 48. 79 sits an octave + fifth above 60 at ratio 0.3,
        // but is 31 semitones above 48, so only the removed 60 could claim it
        let notes = vec![note(48, 0.0, 100), note(60, 0.0, 30), note(79, 0.0, 9)];
        let config = HarmonicConfig::default();

        let (kept, removed) = filter_harmonics(notes, &config);

        assert_eq!(removed, 1);
        let pitches: Vec<u8> = kept.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![48, 79]);
    }

    #[test]
    fn test_survivors_keep_input_order() {
        let notes = vec![
            note(67, 2.0, 90),
            note(60, 1.0, 100),
            note(72, 1.0, 10),
            note(50, 0.0, 90),
        ];

        let (kept, _) = filter_harmonics(notes, &HarmonicConfig::default());

        let pitches: Vec<u8> = kept.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![67, 60, 50]);
    }

    #[test]
    fn test_bucket_boundaries() {
        // Onsets 0.029 and 0.031 fall into different buckets but are 2ms apart
        let notes = vec![note(60, 0.029, 100), note(72, 0.031, 10)];

        let (_, removed) = filter_harmonics(notes, &HarmonicConfig::default());

        assert_eq!(removed, 1);
    }

    #[test]
    fn test_zero_velocity_base_is_floored() {
        // Velocity is clamped to 1 on construction; the divisor floor still applies
        let base = Note { pitch: 60, start_time: 0.0, duration: 0.2, velocity: 0 };
        let other = note(72, 0.0, 1);

        assert!(!is_harmonic_ghost(&base, &other, &HarmonicConfig::default()));
    }

    #[test]
    fn test_extreme_onsets_share_saturated_bucket() {
        let base = note(60, 1e300, 100);
        let notes = vec![base, note(72, 1e300, 10)];

        let (kept, removed) = filter_harmonics(notes, &HarmonicConfig::default());

        assert_eq!(removed, 1);
        assert_eq!(kept, vec![base]);
    }

    #[test]
    fn test_tiny_tolerance_still_matches_simultaneous_onsets() {
        let config = HarmonicConfig {
            time_tolerance: 1e-300,
            ..Default::default()
        };
        let notes = vec![note(48, 2.0, 100), note(60, 2.0, 10), note(60, 2.5, 10)];

        let (kept, removed) = filter_harmonics(notes, &config);

        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let (kept, removed) = filter_harmonics(Vec::new(), &HarmonicConfig::default());
        assert!(kept.is_empty());
        assert_eq!(removed, 0);
    }
}
