// Export module
// Writes refined note sequences to playback formats

pub mod midi;

pub use midi::{export_midi, MidiExportError, MidiExportOptions};
