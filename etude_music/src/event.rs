// Events and durations: the atoms of a practice score.
//
// Every voice is a sequence of `Event`s, each a note, a chord, or a rest,
// tagged with a `Duration` from a small closed set of note values. Beat
// counts are in quarter-note beats (a whole note is 4 beats).
//
// Durations serialize as the short tokens downstream players and renderers
// understand ("1n", "2n", "4n", "8n", "4n.", "8n."). An unrecognized token
// reads back as a quarter note instead of failing.
//
// Consumed everywhere: phrase.rs builds events, quantize.rs packs them into
// measures, cadence.rs overwrites the final ones, timeline.rs and midi.rs
// turn them into time.

use serde::{Deserialize, Serialize};

/// Tolerance for comparing beat sums.
pub const BEAT_EPSILON: f64 = 1e-4;

/// Velocity used when the caller does not configure one.
pub const DEFAULT_VELOCITY: u8 = 90;

/// A note value from the closed set the composer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Duration {
    Whole,
    Half,
    DottedQuarter,
    Quarter,
    DottedEighth,
    Eighth,
}

impl Duration {
    /// All durations, longest first.
    pub const DESCENDING: [Duration; 6] = [
        Duration::Whole,
        Duration::Half,
        Duration::DottedQuarter,
        Duration::Quarter,
        Duration::DottedEighth,
        Duration::Eighth,
    ];

    /// Length in quarter-note beats.
    pub fn beats(self) -> f64 {
        match self {
            Duration::Whole => 4.0,
            Duration::Half => 2.0,
            Duration::DottedQuarter => 1.5,
            Duration::Quarter => 1.0,
            Duration::DottedEighth => 0.75,
            Duration::Eighth => 0.5,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Duration::Whole => "1n",
            Duration::Half => "2n",
            Duration::DottedQuarter => "4n.",
            Duration::Quarter => "4n",
            Duration::DottedEighth => "8n.",
            Duration::Eighth => "8n",
        }
    }

    /// Parse a duration token. Returns `None` for unknown tokens.
    pub fn from_token(token: &str) -> Option<Duration> {
        Duration::DESCENDING
            .into_iter()
            .find(|d| d.token() == token.trim())
    }

    /// Lenient parse: unknown tokens are quarter notes.
    pub fn from_token_or_quarter(token: &str) -> Duration {
        Duration::from_token(token).unwrap_or_else(|| {
            tracing::debug!(token, "unknown duration token, reading as quarter");
            Duration::Quarter
        })
    }

    /// Notation ticks for this duration at a per-quarter resolution.
    pub fn ticks(self, ticks_per_beat: u32) -> u32 {
        (self.beats() * ticks_per_beat as f64).floor() as u32
    }

    /// Long values eligible when a bar asks for a sustained note.
    pub fn is_long(self) -> bool {
        matches!(
            self,
            Duration::Whole | Duration::Half | Duration::DottedQuarter
        )
    }

    /// The longest duration that fits in `beats`, if any.
    pub fn largest_fitting(beats: f64) -> Option<Duration> {
        Duration::DESCENDING
            .into_iter()
            .find(|d| d.beats() <= beats + BEAT_EPSILON)
    }

    /// Decompose a span of beats into durations, longest first.
    ///
    /// Any remainder shorter than an eighth is dropped. Callers that need the
    /// span exact must place it themselves.
    pub fn fill(beats: f64) -> Vec<Duration> {
        let mut parts = Vec::new();
        let mut left = beats;
        while left > BEAT_EPSILON {
            let Some(d) = Duration::largest_fitting(left) else {
                break;
            };
            parts.push(d);
            left -= d.beats();
        }
        parts
    }
}

impl From<String> for Duration {
    fn from(token: String) -> Self {
        Duration::from_token_or_quarter(&token)
    }
}

impl From<Duration> for &'static str {
    fn from(d: Duration) -> Self {
        d.token()
    }
}

/// One item in a voice: a single note, a block chord, or silence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Note {
        pitch: u8,
        duration: Duration,
        velocity: u8,
    },
    Chord {
        pitches: Vec<u8>,
        duration: Duration,
        velocity: u8,
    },
    Rest {
        duration: Duration,
    },
}

impl Event {
    pub fn note(pitch: u8, duration: Duration, velocity: u8) -> Self {
        Event::Note {
            pitch: pitch.min(127),
            duration,
            velocity,
        }
    }

    /// A chord from the given pitches, sorted and deduplicated. An empty
    /// pitch list yields a rest, since a chord needs at least one pitch.
    pub fn chord(pitches: &[u8], duration: Duration, velocity: u8) -> Self {
        let mut sorted: Vec<u8> = pitches.iter().map(|&p| p.min(127)).collect();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.is_empty() {
            Event::Rest { duration }
        } else {
            Event::Chord {
                pitches: sorted,
                duration,
                velocity,
            }
        }
    }

    pub fn rest(duration: Duration) -> Self {
        Event::Rest { duration }
    }

    /// Rests spanning `beats`, longest first.
    pub fn rests_for(beats: f64) -> Vec<Event> {
        Duration::fill(beats).into_iter().map(Event::rest).collect()
    }

    pub fn duration(&self) -> Duration {
        match self {
            Event::Note { duration, .. }
            | Event::Chord { duration, .. }
            | Event::Rest { duration } => *duration,
        }
    }

    pub fn beats(&self) -> f64 {
        self.duration().beats()
    }

    /// Replace the duration, keeping pitches.
    pub fn with_duration(self, duration: Duration) -> Self {
        match self {
            Event::Note {
                pitch, velocity, ..
            } => Event::Note {
                pitch,
                duration,
                velocity,
            },
            Event::Chord {
                pitches, velocity, ..
            } => Event::Chord {
                pitches,
                duration,
                velocity,
            },
            Event::Rest { .. } => Event::Rest { duration },
        }
    }

    /// Sounding pitches (empty for a rest).
    pub fn pitches(&self) -> &[u8] {
        match self {
            Event::Note { pitch, .. } => std::slice::from_ref(pitch),
            Event::Chord { pitches, .. } => pitches,
            Event::Rest { .. } => &[],
        }
    }

    /// The melodic pitch: a note's pitch or a chord's lowest pitch.
    pub fn lead_pitch(&self) -> Option<u8> {
        self.pitches().first().copied()
    }

    pub fn velocity(&self) -> Option<u8> {
        match self {
            Event::Note { velocity, .. } | Event::Chord { velocity, .. } => Some(*velocity),
            Event::Rest { .. } => None,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, Event::Rest { .. })
    }
}
