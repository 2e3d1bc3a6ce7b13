// Note Refinement - Cleans noisy pitch-detection output
// Density filtering, harmonic removal, de-jitter merging and velocity shaping

pub mod density;
pub mod harmonic;
pub mod merge;
pub mod pipeline;
pub mod stats;
pub mod velocity_curve;

pub use density::{filter_by_density, DensityConfig};
pub use harmonic::{filter_harmonics, HarmonicConfig, HARMONIC_INTERVALS};
pub use merge::{merge_fragments, MergeConfig, MergeOutcome};
pub use pipeline::{
    refine_notes, refine_notes_with_observer, RefineStage, RefinementConfig, RefinementResult,
    StageReport, VelocityConfig,
};
pub use stats::RefinementStatistics;
pub use velocity_curve::{apply_velocity_curve, VelocityCurve};
