// Refinement statistics
// Counters collected while a note set moves through the refinement stages

use serde::{Deserialize, Serialize};

/// Provenance of one refinement run
///
/// `original_count - final_count` always equals
/// `density_removed_count + harmonic_removed_count + merged_count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementStatistics {
    /// Notes handed to the refinement stages
    pub original_count: usize,

    /// Notes dropped by the adaptive density filter
    pub density_removed_count: usize,

    /// Notes dropped as overtone ghosts
    pub harmonic_removed_count: usize,

    /// Fragments absorbed into another note of the same pitch
    pub merged_count: usize,

    /// Notes cut to the maximum duration
    pub truncated_count: usize,

    /// Notes in the refined output
    pub final_count: usize,

    /// Share of input notes that did not survive as separate notes, in percent
    pub filter_rate_percent: f64,
}

impl RefinementStatistics {
    /// Start counting a run over `original_count` notes
    pub fn new(original_count: usize) -> Self {
        RefinementStatistics {
            original_count,
            ..Default::default()
        }
    }

    /// Record the final note count and derive the filter rate
    pub fn finish(mut self, final_count: usize) -> Self {
        self.final_count = final_count;
        self.filter_rate_percent = filter_rate_percent(self.original_count, final_count);
        self
    }

    /// Notes removed by filtering stages
    pub fn dropped_count(&self) -> usize {
        self.density_removed_count + self.harmonic_removed_count
    }
}

/// `(original - final) / original * 100`, rounded to one decimal
pub fn filter_rate_percent(original_count: usize, final_count: usize) -> f64 {
    if original_count == 0 {
        return 0.0;
    }
    let removed = original_count.saturating_sub(final_count) as f64;
    (removed / original_count as f64 * 1000.0).round() / 10.0
}
