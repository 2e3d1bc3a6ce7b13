// MIDI Export - Convert refined notes to a Standard MIDI File using midly
// Produces a meta track plus a single piano track for playback

use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notes::Note;

#[derive(Debug, Error)]
pub enum MidiExportError {
    #[error("Failed to write MIDI: {0}")]
    Write(#[from] std::io::Error),

    #[error("Invalid export option: {0}")]
    InvalidOption(String),
}

/// MIDI export options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ) - typically 480 or 960
    pub ppq: u16,

    /// Tempo written to the file; note times are exact at any tempo
    pub bpm: f64,

    /// MIDI channel [0, 15]
    pub channel: u8,

    /// General MIDI program (0 = acoustic grand piano)
    pub program: u8,

    /// Include tempo metadata
    pub include_tempo: bool,

    /// Name written to the note track, if any
    pub track_name: Option<String>,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            bpm: 120.0,
            channel: 0,
            program: 0,
            include_tempo: true,
            track_name: Some("PIANO".to_string()),
        }
    }
}

/// Export refined notes to MIDI file bytes
pub fn export_midi(notes: &[Note], options: &MidiExportOptions) -> Result<Vec<u8>, MidiExportError> {
    if options.ppq == 0 || !(options.bpm > 0.0) {
        return Err(MidiExportError::InvalidOption(format!(
            "ppq {} and bpm {} must both be positive",
            options.ppq, options.bpm
        )));
    }
    if options.channel > 15 || options.program > 127 {
        return Err(MidiExportError::InvalidOption(format!(
            "channel {} or program {} out of range",
            options.channel, options.program
        )));
    }

    let header = Header {
        format: midly::Format::Parallel,
        timing: Timing::Metrical(options.ppq.into()),
    };
    let ticks_per_second = calculate_ticks_per_second(options.bpm, options.ppq);

    let mut meta_track = Track::new();
    if options.include_tempo {
        add_tempo(&mut meta_track, 0, options.bpm);
    }
    meta_track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let note_track = create_note_track(notes, ticks_per_second, options);

    let smf = Smf {
        header,
        tracks: vec![meta_track, note_track],
    };

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;

    Ok(bytes)
}

/// Build the note track; note-offs sort ahead of note-ons on the same tick
fn create_note_track<'a>(notes: &[Note], ticks_per_second: f64, options: &'a MidiExportOptions) -> Track<'a> {
    let mut track = Track::new();
    let channel = options.channel.into();

    if let Some(name) = &options.track_name {
        track.push(TrackEvent {
            delta: 0u32.into(),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        });
    }
    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: options.program.into(),
            },
        },
    });

    // (tick, 0 = off / 1 = on, message)
    let mut events: Vec<(u32, u8, MidiMessage)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let tick_on = seconds_to_ticks(note.start_time, ticks_per_second);
        let tick_off = seconds_to_ticks(note.end_time(), ticks_per_second).max(tick_on + 1);
        let key = note.pitch.min(127).into();

        events.push((
            tick_on,
            1,
            MidiMessage::NoteOn {
                key,
                vel: note.velocity.clamp(1, 127).into(),
            },
        ));
        events.push((tick_off, 0, MidiMessage::NoteOff { key, vel: 0.into() }));
    }
    events.sort_by_key(|(tick, order, _)| (*tick, *order));

    let mut last_tick = 0;
    for (tick, _, message) in events {
        track.push(TrackEvent {
            delta: tick.saturating_sub(last_tick).into(),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    track
}

/// Ticks per second at the given tempo and resolution
fn calculate_ticks_per_second(bpm: f64, ppq: u16) -> f64 {
    ppq as f64 * bpm / 60.0
}

fn seconds_to_ticks(seconds: f64, ticks_per_second: f64) -> u32 {
    (seconds.max(0.0) * ticks_per_second).round() as u32
}

/// Add tempo meta message (microseconds per quarter note, 24-bit)
fn add_tempo(track: &mut Track<'_>, delta: u32, bpm: f64) {
    let us_per_quarter = ((60_000_000.0 / bpm) as u32).min(0x00FF_FFFF);

    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter.into())),
    });
}
