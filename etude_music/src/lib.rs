// Etude Music: two-voice piano practice exercise generator
//
// Composes short exercises for treble and bass staves from a handful of
// options (key, scale, length, meter, ranges, leap limits, rhythm density,
// cadence). The bass holds one block chord per bar; the treble walks through
// chord tones with bounded leaps. Output is a `Score` of complete measures
// that serializes to JSON for notation and playback front ends, or to MIDI.
//
// Architecture:
// - config.rs: Caller options and the resolved, clamped generation config
// - theory.rs: Key and scale tables, pitch collections, chord tones per degree
// - progression.rs: Roman numerals and progression selection by bar count
// - event.rs: Durations and note/chord/rest events
// - phrase.rs: Per-voice, per-window phrase generation (the core algorithm)
// - quantize.rs: Packing event streams into exactly N complete measures
// - cadence.rs: Overwriting the final bar with the closing chord
// - score.rs: The score data model and its text summary
// - compose.rs: The end-to-end pipeline
// - timeline.rs: Wall-clock schedule of a score at a tempo
// - midi.rs: MIDI file output
// - error.rs: Errors at the I/O edges
//
// The generator is deterministic given a random source, so a seed (or the
// scripted `FirstCandidate` source) reproduces a score exactly.

pub mod cadence;
pub mod compose;
pub mod config;
pub mod error;
pub mod event;
pub mod midi;
pub mod phrase;
pub mod progression;
pub mod quantize;
pub mod score;
pub mod theory;
pub mod timeline;

pub use compose::{compose, generate};
pub use config::{Config, PracticeOptions};
pub use score::Score;
