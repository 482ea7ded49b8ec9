// MIDI output from practice scores.
//
// Converts a Score into a Standard MIDI File (SMF) for playback. Track 0
// carries the tempo, key signature, and time signature; each part then gets
// its own track and channel, played on acoustic grand piano. Note timing
// comes from timeline.rs, so bars stay aligned across the two hands. Chords
// become groups of simultaneous note-ons.
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1 (multi-track).

use crate::error::ExportError;
use crate::score::{Score, Voice};
use crate::timeline::{Timeline, schedule};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// General MIDI program 0, acoustic grand piano.
const PIANO_PROGRAM: u8 = 0;

/// Convert a Score to MIDI and write it to a file.
pub fn write_midi(score: &Score, path: &Path) -> Result<(), ExportError> {
    let buf = midi_bytes(score)?;
    std::fs::write(path, &buf).map_err(|e| ExportError::io(path, e))?;
    Ok(())
}

/// Encode a Score as SMF bytes.
pub fn midi_bytes(score: &Score) -> Result<Vec<u8>, ExportError> {
    let smf = score_to_smf(score);
    let mut buf = Vec::new();
    smf.write_std(&mut buf).map_err(ExportError::Midi)?;
    Ok(buf)
}

/// Convert a Score to an in-memory SMF.
pub fn score_to_smf(score: &Score) -> Smf<'static> {
    let timeline = schedule(score, score.meta.bpm);
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));
    smf.tracks.push(conductor_track(score, &timeline));
    for voice in Voice::ALL {
        smf.tracks.push(voice_track(&timeline, voice));
    }
    smf
}

fn conductor_track(score: &Score, timeline: &Timeline) -> Track<'static> {
    // Tempo is a 24-bit microseconds-per-quarter value.
    let tempo_microseconds = (60_000_000 / timeline.bpm).min(0xFF_FFFF);
    let numerator = score.meta.beats_per_bar.clamp(1, 255) as u8;
    vec![
        meta(0, MetaMessage::Tempo(u24::new(tempo_microseconds))),
        // Denominator is a power of two: 2 means quarter-note beats.
        meta(0, MetaMessage::TimeSignature(numerator, 2, 24, 8)),
        meta(0, MetaMessage::KeySignature(score.meta.fifths, false)),
        meta(0, MetaMessage::EndOfTrack),
    ]
}

fn voice_track(timeline: &Timeline, voice: Voice) -> Track<'static> {
    let channel = u4::new(voice.index() as u8);
    let mut track: Track<'static> = vec![
        meta(0, MetaMessage::TrackName(voice.label().as_bytes())),
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(PIANO_PROGRAM),
                },
            },
        },
    ];

    // (tick, is_on, key, velocity); note-offs sort before note-ons at a tick.
    let mut edges: Vec<(u32, bool, u8, u8)> = Vec::new();
    for onset in &timeline.voice(voice).onsets {
        let on = beats_to_ticks(onset.start_beat);
        let off = beats_to_ticks(onset.start_beat + onset.length_beats);
        for &pitch in &onset.pitches {
            edges.push((on, true, pitch.min(127), onset.velocity.min(127)));
            edges.push((off, false, pitch.min(127), 0));
        }
    }
    edges.sort_by_key(|&(tick, is_on, key, _)| (tick, is_on, key));

    let mut last_tick = 0;
    for (tick, is_on, key, vel) in edges {
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    let end = beats_to_ticks(timeline.total_beats());
    track.push(meta(end.saturating_sub(last_tick), MetaMessage::EndOfTrack));
    track
}

fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(message),
    }
}

fn beats_to_ticks(beats: f64) -> u32 {
    (beats * TICKS_PER_QUARTER as f64).round() as u32
}
