// The score: the immutable product of one generation run.
//
// A `Score` holds metadata plus exactly two parts, treble then bass. Each
// part is a list of measures and each measure a list of events whose beats
// sum to the bar length. quantize.rs guarantees that invariant; this module
// only stores and describes the result.
//
// The serialized shape (`meta`, `parts[].measures[].events[]`) is what the
// notation renderer and audio player consume, so field names are camelCase.

use crate::event::{BEAT_EPSILON, Event};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// The two voices of a piano exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Treble = 0,
    Bass = 1,
}

impl Voice {
    pub const ALL: [Voice; 2] = [Voice::Treble, Voice::Bass];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn clef(self) -> Clef {
        match self {
            Voice::Treble => Clef::G,
            Voice::Bass => Clef::F,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Voice::Treble => "Treble",
            Voice::Bass => "Bass",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clef {
    G,
    F,
}

/// One bar of one voice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Measure {
    pub events: Vec<Event>,
}

impl Measure {
    pub fn new(events: Vec<Event>) -> Self {
        Measure { events }
    }

    /// Total length in beats.
    pub fn beats(&self) -> f64 {
        self.events.iter().map(Event::beats).sum()
    }

    pub fn is_full(&self, beats_per_bar: u32) -> bool {
        (self.beats() - beats_per_bar as f64).abs() < BEAT_EPSILON
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub voice_id: Voice,
    pub clef: Clef,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn new(voice: Voice, measures: Vec<Measure>) -> Self {
        Part {
            voice_id: voice,
            clef: voice.clef(),
            measures,
        }
    }

    /// All events in order, ignoring bar lines.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.measures.iter().flat_map(|m| m.events.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMeta {
    pub title: String,
    pub key: String,
    pub scale: String,
    pub bpm: u32,
    pub bars: usize,
    pub beats_per_bar: u32,
    pub ticks_per_beat: u32,
    /// Key signature as a count of sharps (positive) or flats (negative).
    pub fifths: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub meta: ScoreMeta,
    /// Treble first, bass second.
    pub parts: [Part; 2],
}

impl Score {
    pub fn part(&self, voice: Voice) -> &Part {
        &self.parts[voice.index()]
    }

    pub fn treble(&self) -> &Part {
        self.part(Voice::Treble)
    }

    pub fn bass(&self) -> &Part {
        self.part(Voice::Bass)
    }

    /// Compact text rendering of both parts for terminal output.
    ///
    /// Notes print as names, chords as bracketed names, rests as `.`, and
    /// each event is followed by its duration token.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            let _ = write!(out, "{:>7}: ", part.voice_id.label());
            for (i, measure) in part.measures.iter().enumerate() {
                if i > 0 {
                    out.push_str("| ");
                }
                for event in &measure.events {
                    match event {
                        Event::Note { pitch, .. } => out.push_str(pitch_name(*pitch)),
                        Event::Chord { pitches, .. } => {
                            let names: Vec<&str> = pitches.iter().map(|&p| pitch_name(p)).collect();
                            let _ = write!(out, "[{}]", names.join(" "));
                        }
                        Event::Rest { .. } => out.push('.'),
                    }
                    let _ = write!(out, "/{} ", event.duration().token());
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Convert a MIDI pitch to a compact note name (e.g., "C4", "F#3").
pub fn pitch_name(pitch: u8) -> &'static str {
    const NAMES: &[&str] = &[
        "C-1", "C#-1", "D-1", "Eb-1", "E-1", "F-1", "F#-1", "G-1", "Ab-1", "A-1", "Bb-1", "B-1",
        "C0", "C#0", "D0", "Eb0", "E0", "F0", "F#0", "G0", "Ab0", "A0", "Bb0", "B0", "C1", "C#1",
        "D1", "Eb1", "E1", "F1", "F#1", "G1", "Ab1", "A1", "Bb1", "B1", "C2", "C#2", "D2", "Eb2",
        "E2", "F2", "F#2", "G2", "Ab2", "A2", "Bb2", "B2", "C3", "C#3", "D3", "Eb3", "E3", "F3",
        "F#3", "G3", "Ab3", "A3", "Bb3", "B3", "C4", "C#4", "D4", "Eb4", "E4", "F4", "F#4", "G4",
        "Ab4", "A4", "Bb4", "B4", "C5", "C#5", "D5", "Eb5", "E5", "F5", "F#5", "G5", "Ab5", "A5",
        "Bb5", "B5", "C6", "C#6", "D6", "Eb6", "E6", "F6", "F#6", "G6", "Ab6", "A6", "Bb6", "B6",
        "C7", "C#7", "D7", "Eb7", "E7", "F7", "F#7", "G7", "Ab7", "A7", "Bb7", "B7", "C8", "C#8",
        "D8", "Eb8", "E8", "F8", "F#8", "G8", "Ab8", "A8", "Bb8", "B8", "C9", "C#9", "D9", "Eb9",
        "E9", "F9", "F#9", "G9",
    ];
    NAMES.get(pitch as usize).copied().unwrap_or("??")
}
