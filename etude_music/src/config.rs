// Generation options: the partial caller record and the resolved config.
//
// `PracticeOptions` is what callers hand in: any subset of the recognized
// options, deserializable from camelCase JSON. `Config::resolve` layers it
// over the built-in defaults and the named difficulty preset, then
// normalizes every field into its valid domain. Resolution never fails: an
// unknown enum name falls back to its default, a swapped range is repaired,
// and every probability, bias, and count is clamped.
//
// The resolved `Config` is immutable for the rest of a run and is read by
// every stage of compose.rs.

use crate::event::DEFAULT_VELOCITY;
use crate::progression::Roman;
use crate::score::Voice;
use serde::{Deserialize, Serialize};

/// Upper bound on piece length.
pub const MAX_BARS: usize = 512;

/// Upper bound on the meter's beat count.
pub const MAX_BEATS_PER_BAR: u32 = 16;

/// Caller-supplied options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeOptions {
    pub title: Option<String>,
    pub difficulty: Option<String>,
    pub key: Option<String>,
    pub scale: Option<String>,
    pub bars: Option<i64>,
    pub beats_per_bar: Option<i64>,
    pub phrase_length: Option<i64>,
    pub treble_low: Option<i64>,
    pub treble_high: Option<i64>,
    pub bass_low: Option<i64>,
    pub bass_high: Option<i64>,
    pub max_leap_treble: Option<i64>,
    pub max_leap_bass: Option<i64>,
    pub melodic_direction_bias: Option<f64>,
    pub rhythm_complexity: Option<String>,
    pub long_note_frequency: Option<f64>,
    pub motif_repetition: Option<f64>,
    pub cadence: Option<String>,
    pub bpm: Option<i64>,
    pub ticks_per_beat: Option<i64>,
    pub velocity: Option<i64>,
    pub treble_enabled: Option<bool>,
    pub bass_enabled: Option<bool>,
    pub start_on_tonic: Option<bool>,
    pub progression: Option<Vec<String>>,
}

impl PracticeOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Named presets that adjust rhythm and leap settings together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    fn apply(self, cfg: &mut Config) {
        let (rhythm, long_notes, leap_treble, leap_bass, motif) = match self {
            Difficulty::Easy => (RhythmComplexity::Simple, 0.4, 4, 5, 0.5),
            Difficulty::Medium => (RhythmComplexity::Medium, 0.25, 5, 7, 0.45),
            Difficulty::Hard => (RhythmComplexity::Complex, 0.15, 4, 5, 0.35),
        };
        cfg.difficulty = self;
        cfg.rhythm_complexity = rhythm;
        cfg.long_note_frequency = long_notes;
        cfg.treble.max_leap = leap_treble;
        cfg.bass.max_leap = leap_bass;
        cfg.motif_repetition = motif;
    }
}

/// Which duration pool the treble draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RhythmComplexity {
    Simple,
    Medium,
    Complex,
}

impl RhythmComplexity {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(RhythmComplexity::Simple),
            "medium" => Some(RhythmComplexity::Medium),
            "complex" => Some(RhythmComplexity::Complex),
            _ => None,
        }
    }
}

/// Closing gesture written over the final bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CadenceStyle {
    /// No cadence ("none"): the final bar is left as generated.
    #[serde(rename = "none")]
    Open,
    Authentic,
    Plagal,
    Deceptive,
}

impl CadenceStyle {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(CadenceStyle::Open),
            "authentic" => Some(CadenceStyle::Authentic),
            "plagal" => Some(CadenceStyle::Plagal),
            "deceptive" => Some(CadenceStyle::Deceptive),
            _ => None,
        }
    }

    /// The chord the final bar lands on, or `None` for no cadence.
    pub fn final_chord(self) -> Option<Roman> {
        match self {
            CadenceStyle::Open => None,
            CadenceStyle::Authentic | CadenceStyle::Plagal => Some(Roman::I),
            CadenceStyle::Deceptive => Some(Roman::VI),
        }
    }
}

/// Pitch range and leap limit for one voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub low: u8,
    pub high: u8,
    /// Largest preferred melodic step, in semitones.
    pub max_leap: u8,
    pub enabled: bool,
}

impl VoiceSettings {
    pub fn contains(&self, pitch: u8) -> bool {
        (self.low..=self.high).contains(&pitch)
    }

    pub fn clamp(&self, pitch: u8) -> u8 {
        pitch.clamp(self.low, self.high)
    }
}

/// Fully resolved generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub title: String,
    pub difficulty: Difficulty,
    pub key: String,
    pub scale: String,
    pub bars: usize,
    pub beats_per_bar: u32,
    /// Bars generated together against one slice of the progression.
    pub phrase_length: usize,
    pub treble: VoiceSettings,
    pub bass: VoiceSettings,
    /// -1 leans descending, +1 leans ascending.
    pub melodic_direction_bias: f64,
    pub rhythm_complexity: RhythmComplexity,
    pub long_note_frequency: f64,
    pub motif_repetition: f64,
    pub cadence: CadenceStyle,
    pub bpm: u32,
    pub ticks_per_beat: u32,
    pub velocity: u8,
    pub start_on_tonic: bool,
    /// Explicit progression that replaces table selection when set.
    pub progression: Option<Vec<Roman>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            title: "Practice".to_string(),
            difficulty: Difficulty::Hard,
            key: "C".to_string(),
            scale: "major".to_string(),
            bars: 8,
            beats_per_bar: 4,
            phrase_length: 4,
            treble: VoiceSettings {
                low: 60,
                high: 84,
                max_leap: 4,
                enabled: true,
            },
            bass: VoiceSettings {
                low: 36,
                high: 60,
                max_leap: 5,
                enabled: true,
            },
            melodic_direction_bias: 0.0,
            rhythm_complexity: RhythmComplexity::Complex,
            long_note_frequency: 0.15,
            motif_repetition: 0.35,
            cadence: CadenceStyle::Authentic,
            bpm: 90,
            ticks_per_beat: 16,
            velocity: DEFAULT_VELOCITY,
            start_on_tonic: false,
            progression: None,
        }
    }
}

impl Config {
    /// Defaults, then the difficulty preset, then caller overrides, then
    /// normalization.
    pub fn resolve(options: &PracticeOptions) -> Config {
        let mut cfg = Config::default();

        if let Some(name) = &options.difficulty {
            match Difficulty::from_name(name) {
                Some(d) => d.apply(&mut cfg),
                None => tracing::debug!(difficulty = %name, "unknown difficulty preset, ignoring"),
            }
        }

        if let Some(title) = &options.title {
            cfg.title = title.clone();
        }
        if let Some(key) = &options.key {
            cfg.key = key.clone();
        }
        if let Some(scale) = &options.scale {
            cfg.scale = scale.clone();
        }
        if let Some(bars) = options.bars {
            cfg.bars = bars.clamp(1, MAX_BARS as i64) as usize;
        }
        if let Some(beats) = options.beats_per_bar {
            cfg.beats_per_bar = beats.clamp(1, MAX_BEATS_PER_BAR as i64) as u32;
        }
        if let Some(len) = options.phrase_length {
            cfg.phrase_length = len.clamp(1, MAX_BARS as i64) as usize;
        }

        override_midi(&mut cfg.treble.low, options.treble_low);
        override_midi(&mut cfg.treble.high, options.treble_high);
        override_midi(&mut cfg.bass.low, options.bass_low);
        override_midi(&mut cfg.bass.high, options.bass_high);
        override_midi(&mut cfg.treble.max_leap, options.max_leap_treble);
        override_midi(&mut cfg.bass.max_leap, options.max_leap_bass);

        if let Some(bias) = options.melodic_direction_bias {
            cfg.melodic_direction_bias = bias;
        }
        if let Some(name) = &options.rhythm_complexity {
            match RhythmComplexity::from_name(name) {
                Some(r) => cfg.rhythm_complexity = r,
                None => {
                    tracing::debug!(rhythm = %name, "unknown rhythm complexity, keeping default")
                }
            }
        }
        if let Some(p) = options.long_note_frequency {
            cfg.long_note_frequency = p;
        }
        if let Some(p) = options.motif_repetition {
            cfg.motif_repetition = p;
        }
        if let Some(name) = &options.cadence {
            match CadenceStyle::from_name(name) {
                Some(c) => cfg.cadence = c,
                None => tracing::debug!(cadence = %name, "unknown cadence, keeping default"),
            }
        }
        if let Some(bpm) = options.bpm {
            cfg.bpm = bpm.clamp(1, 999) as u32;
        }
        if let Some(tpb) = options.ticks_per_beat {
            cfg.ticks_per_beat = tpb.clamp(1, 960) as u32;
        }
        if let Some(v) = options.velocity {
            cfg.velocity = v.clamp(1, 127) as u8;
        }
        if let Some(on) = options.treble_enabled {
            cfg.treble.enabled = on;
        }
        if let Some(on) = options.bass_enabled {
            cfg.bass.enabled = on;
        }
        if let Some(on) = options.start_on_tonic {
            cfg.start_on_tonic = on;
        }
        if let Some(names) = &options.progression {
            let parsed: Vec<Roman> = names.iter().map(|n| Roman::parse_or_tonic(n)).collect();
            cfg.progression = (!parsed.is_empty()).then_some(parsed);
        }

        cfg.normalize();
        cfg
    }

    /// Repair ranges and clamp probabilities and bias. Idempotent.
    fn normalize(&mut self) {
        for voice in [&mut self.treble, &mut self.bass] {
            voice.low = voice.low.min(voice.high);
        }
        self.long_note_frequency = unit_interval(self.long_note_frequency, 0.15);
        self.motif_repetition = unit_interval(self.motif_repetition, 0.35);
        self.melodic_direction_bias = if self.melodic_direction_bias.is_nan() {
            0.0
        } else {
            self.melodic_direction_bias.clamp(-1.0, 1.0)
        };
        self.bars = self.bars.clamp(1, MAX_BARS);
        self.beats_per_bar = self.beats_per_bar.clamp(1, MAX_BEATS_PER_BAR);
        self.phrase_length = self.phrase_length.max(1);
    }

    pub fn voice(&self, voice: Voice) -> &VoiceSettings {
        match voice {
            Voice::Treble => &self.treble,
            Voice::Bass => &self.bass,
        }
    }
}

/// Write an override into a 7-bit field, clamped to 0..=127.
fn override_midi(field: &mut u8, value: Option<i64>) {
    if let Some(v) = value {
        *field = v.clamp(0, 127) as u8;
    }
}

fn unit_interval(p: f64, fallback: f64) -> f64 {
    if p.is_nan() { fallback } else { p.clamp(0.0, 1.0) }
}
