// Playback timeline: when each event of a score sounds, in seconds.
//
// A beat lasts `60 / bpm` seconds. Each voice is scheduled sequentially, and
// the voices stay aligned at bar lines: every bar starts where the longer of
// the two voices ended the previous bar. Rests produce no onset but still
// advance time. The audio player and midi.rs both consume this schedule.

use crate::event::Event;
use crate::score::{Score, Voice};
use serde::Serialize;

/// One sounding event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Onset {
    /// Seconds from the start of the piece.
    pub start: f64,
    /// Seconds the event sounds.
    pub length: f64,
    /// Beat position from the start of the piece.
    pub start_beat: f64,
    pub length_beats: f64,
    /// One pitch for a note, several for a chord.
    pub pitches: Vec<u8>,
    pub velocity: u8,
    /// Zero-based bar index.
    pub bar: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceTimeline {
    pub voice: Voice,
    pub onsets: Vec<Onset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub bpm: u32,
    pub voices: [VoiceTimeline; 2],
    /// Start of each bar in beats, plus the end of the piece.
    pub bar_starts: Vec<f64>,
    pub total_seconds: f64,
}

impl Timeline {
    pub fn voice(&self, voice: Voice) -> &VoiceTimeline {
        &self.voices[voice.index()]
    }

    pub fn total_beats(&self) -> f64 {
        self.bar_starts.last().copied().unwrap_or(0.0)
    }
}

/// Schedule every event of `score` at `bpm` beats per minute. A zero tempo
/// is treated as 1.
pub fn schedule(score: &Score, bpm: u32) -> Timeline {
    let bpm = bpm.max(1);
    let seconds_per_beat = 60.0 / bpm as f64;
    let bar_count = score.parts.iter().map(|p| p.measures.len()).max().unwrap_or(0);

    let mut voices = Voice::ALL.map(|voice| VoiceTimeline {
        voice,
        onsets: Vec::new(),
    });
    let mut bar_starts = Vec::with_capacity(bar_count + 1);
    let mut bar_start = 0.0;

    for bar in 0..bar_count {
        bar_starts.push(bar_start);
        let mut longest: f64 = 0.0;
        for (part, timeline) in score.parts.iter().zip(voices.iter_mut()) {
            let Some(measure) = part.measures.get(bar) else {
                continue;
            };
            let mut beat = bar_start;
            for event in &measure.events {
                let length = event.beats();
                match event {
                    Event::Note { .. } | Event::Chord { .. } => timeline.onsets.push(Onset {
                        start: beat * seconds_per_beat,
                        length: length * seconds_per_beat,
                        start_beat: beat,
                        length_beats: length,
                        pitches: event.pitches().to_vec(),
                        velocity: event.velocity().unwrap_or(0),
                        bar,
                    }),
                    Event::Rest { .. } => {}
                }
                beat += length;
            }
            longest = longest.max(beat - bar_start);
        }
        bar_start += longest;
    }
    bar_starts.push(bar_start);

    Timeline {
        bpm,
        voices,
        bar_starts,
        total_seconds: bar_start * seconds_per_beat,
    }
}
