// Refinement pipeline
// Runs density -> harmonic -> merge -> velocity over one note set

use serde::{Deserialize, Serialize};

use super::density::{filter_by_density, DensityConfig};
use super::harmonic::{filter_harmonics, HarmonicConfig};
use super::merge::{merge_fragments, MergeConfig};
use super::stats::RefinementStatistics;
use super::velocity_curve::VelocityCurve;
use crate::notes::Note;

/// Settings for the final velocity remap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Apply the curve at all
    pub enabled: bool,

    /// Response curve
    pub curve: VelocityCurve,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        VelocityConfig {
            enabled: true,
            curve: VelocityCurve::Piano,
        }
    }
}

/// Settings for every refinement stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    pub density: DensityConfig,
    pub harmonic: HarmonicConfig,
    pub merge: MergeConfig,
    pub velocity: VelocityConfig,
}

/// Refinement stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineStage {
    Density,
    Harmonic,
    Merge,
    Velocity,
}

impl RefineStage {
    pub const ALL: [RefineStage; 4] = [
        RefineStage::Density,
        RefineStage::Harmonic,
        RefineStage::Merge,
        RefineStage::Velocity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RefineStage::Density => "density",
            RefineStage::Harmonic => "harmonic",
            RefineStage::Merge => "merge",
            RefineStage::Velocity => "velocity",
        }
    }
}

/// Summary of one completed stage, handed to the observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: RefineStage,

    /// Whether the stage ran or passed its input through
    pub enabled: bool,

    /// Notes left after the stage
    pub notes_remaining: usize,
}

/// Refined notes with their provenance
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementResult {
    /// Time-ascending notes, ties by pitch
    pub notes: Vec<Note>,

    pub statistics: RefinementStatistics,
}

/// Refine a note set
///
/// Never fails: empty input gives empty output and zeroed statistics.
pub fn refine_notes(notes: Vec<Note>, config: &RefinementConfig) -> RefinementResult {
    refine_notes_with_observer(notes, config, |_| {})
}

/// Refine a note set, reporting each stage as it completes
///
/// Stage order is fixed. Density classification needs the unfiltered
/// population of each window, so it runs before harmonic removal. Ghosts
/// must be gone before merging or they would stretch a real note. The
/// velocity curve sees the post-merge peak velocities.
pub fn refine_notes_with_observer<F>(
    notes: Vec<Note>,
    config: &RefinementConfig,
    mut observer: F,
) -> RefinementResult
where
    F: FnMut(StageReport),
{
    let mut statistics = RefinementStatistics::new(notes.len());

    let notes = if config.density.enabled {
        let (kept, removed) = filter_by_density(notes, &config.density);
        statistics.density_removed_count = removed;
        kept
    } else {
        notes
    };
    observer(StageReport {
        stage: RefineStage::Density,
        enabled: config.density.enabled,
        notes_remaining: notes.len(),
    });

    let notes = if config.harmonic.enabled {
        let (kept, removed) = filter_harmonics(notes, &config.harmonic);
        statistics.harmonic_removed_count = removed;
        kept
    } else {
        notes
    };
    observer(StageReport {
        stage: RefineStage::Harmonic,
        enabled: config.harmonic.enabled,
        notes_remaining: notes.len(),
    });

    let (mut notes, outcome) = merge_fragments(notes, &config.merge);
    statistics.merged_count = outcome.merged;
    statistics.truncated_count = outcome.truncated;
    observer(StageReport {
        stage: RefineStage::Merge,
        enabled: true,
        notes_remaining: notes.len(),
    });

    if config.velocity.enabled {
        let curve = config.velocity.curve;
        for note in notes.iter_mut() {
            note.velocity = curve.apply(note.velocity as i32);
        }
    }
    observer(StageReport {
        stage: RefineStage::Velocity,
        enabled: config.velocity.enabled,
        notes_remaining: notes.len(),
    });

    let statistics = statistics.finish(notes.len());
    log::info!(
        "[Refine] {} -> {} notes ({} filtered, {} merged, {:.1}% overall, curve {})",
        statistics.original_count,
        statistics.final_count,
        statistics.dropped_count(),
        statistics.merged_count,
        statistics.filter_rate_percent,
        if config.velocity.enabled {
            config.velocity.curve.as_str()
        } else {
            "off"
        }
    );

    RefinementResult { notes, statistics }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_config() -> RefinementConfig {
        RefinementConfig {
            velocity: VelocityConfig {
                enabled: true,
                curve: VelocityCurve::Linear,
            },
            ..Default::default()
        }
    }

    fn busy_passage() -> Vec<Note> {
        vec![
            // Chord with an octave ghost
            Note::new(48, 1.000, 0.50, 100),
            Note::new(52, 1.005, 0.50, 70),
            Note::new(55, 1.010, 0.50, 65),
            Note::new(60, 1.012, 0.50, 30),
            // Fragmented melody note
            Note::new(67, 2.000, 0.10, 60),
            Note::new(67, 2.110, 0.20, 75),
            // Quiet isolated noise
            Note::new(90, 3.000, 0.10, 15),
            // Pedal-held bass
            Note::new(36, 4.000, 6.00, 80),
        ]
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let result = refine_notes(Vec::new(), &RefinementConfig::default());

        assert!(result.notes.is_empty());
        assert_eq!(result.statistics, RefinementStatistics::default());
    }

    #[test]
    fn test_full_pipeline() {
        let result = refine_notes(busy_passage(), &linear_config());
        let stats = &result.statistics;

        assert_eq!(stats.original_count, 8);
        assert_eq!(stats.density_removed_count, 1);
        assert_eq!(stats.harmonic_removed_count, 1);
        assert_eq!(stats.merged_count, 1);
        assert_eq!(stats.truncated_count, 1);
        assert_eq!(stats.final_count, 5);
        assert_eq!(stats.filter_rate_percent, 37.5);

        let pitches: Vec<u8> = result.notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![48, 52, 55, 67, 36]);

        let melody = result.notes.iter().find(|n| n.pitch == 67).unwrap();
        assert!((melody.duration - 0.31).abs() < 1e-9);
        assert_eq!(melody.velocity, 75);

        let bass = result.notes.iter().find(|n| n.pitch == 36).unwrap();
        assert_eq!(bass.duration, 3.0);
    }

    #[test]
    fn test_statistics_conservation() {
        let result = refine_notes(busy_passage(), &RefinementConfig::default());
        let stats = &result.statistics;

        assert_eq!(
            stats.original_count - stats.final_count,
            stats.dropped_count() + stats.merged_count
        );
    }

    #[test]
    fn test_disabled_filters_pass_through() {
        let mut config = linear_config();
        config.density.enabled = false;
        config.harmonic.enabled = false;

        let result = refine_notes(busy_passage(), &config);

        assert_eq!(result.statistics.density_removed_count, 0);
        assert_eq!(result.statistics.harmonic_removed_count, 0);
        assert!(result.notes.iter().any(|n| n.pitch == 60));
        assert!(result.notes.iter().any(|n| n.pitch == 90));
    }

    #[test]
    fn test_velocity_curve_applied_after_merge() {
        let notes = vec![Note::new(60, 0.0, 0.04, 50), Note::new(60, 0.06, 0.05, 100)];
        let mut config = RefinementConfig::default();
        config.merge.min_gap = 0.05;

        let result = refine_notes(notes, &config);

        assert_eq!(result.notes.len(), 1);
        assert_eq!(result.notes[0].velocity, VelocityCurve::Piano.apply(100));
    }

    #[test]
    fn test_disabled_velocity_curve_keeps_velocities() {
        let mut config = RefinementConfig::default();
        config.velocity.enabled = false;

        let result = refine_notes(vec![Note::new(60, 0.0, 0.2, 64)], &config);

        assert_eq!(result.notes[0].velocity, 64);
    }

    #[test]
    fn test_output_invariants() {
        let result = refine_notes(busy_passage(), &RefinementConfig::default());

        for pair in result.notes.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time);
        }
        for note in &result.notes {
            assert!(note.pitch <= 127);
            assert!((1..=127).contains(&note.velocity));
            assert!(note.duration >= 0.0 && note.duration <= 3.0);
            assert!(note.start_time >= 0.0);
        }
    }

    #[test]
    fn test_observer_sees_every_stage_in_order() {
        let mut seen = Vec::new();
        let mut config = RefinementConfig::default();
        config.harmonic.enabled = false;

        refine_notes_with_observer(busy_passage(), &config, |report| seen.push(report));

        let stages: Vec<RefineStage> = seen.iter().map(|r| r.stage).collect();
        assert_eq!(stages, RefineStage::ALL.to_vec());
        assert!(!seen[1].enabled);
        assert_eq!(seen[3].notes_remaining, seen[2].notes_remaining);
    }
}
