// Scale theory: keys, scale patterns, pitch collections, and chord tones.
//
// A practice piece lives in one key and one scale. `TheoryTables` holds the
// lookup data (key name -> tonic + signature, scale name -> interval
// pattern, and the octave offsets used to span the register) as explicit
// input rather than globals, so callers can register their own scales.
//
// `ScaleInfo` is the resolved result for one run: the tonic, the sorted
// pitch collection, and the pattern. Chord tones for a scale degree are
// found by stacking diatonic thirds on the pattern (positions d-1, d+1,
// d+3) and collecting every pitch in the collection whose tonic-relative
// pitch class matches. On a pentatonic or blues pattern the "thirds" are
// whatever the pattern offers at those positions.
//
// Used by phrase.rs for chord-tone gravity and by cadence.rs for the final
// chord.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tonic pitch and key signature for a named key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// MIDI pitch of the tonic in the fourth octave.
    pub tonic: u8,
    /// Sharps (positive) or flats (negative) in the signature.
    pub fifths: i8,
}

/// A named interval pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalePattern {
    pub display_name: String,
    /// Ascending semitone offsets from the tonic, each in 0..12.
    pub intervals: Vec<u8>,
}

/// Lookup tables for keys and scales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TheoryTables {
    pub keys: BTreeMap<String, KeyEntry>,
    pub scales: BTreeMap<String, ScalePattern>,
    /// Octave shifts (in semitones) applied to each pattern interval when
    /// building the pitch collection.
    pub octave_offsets: Vec<i16>,
    pub default_key: String,
    pub default_scale: String,
}

impl Default for TheoryTables {
    fn default() -> Self {
        let keys = [
            ("C", 60, 0),
            ("G", 67, 1),
            ("D", 62, 2),
            ("A", 69, 3),
            ("E", 64, 4),
            ("B", 71, 5),
            ("F", 65, -1),
            ("Bb", 70, -2),
            ("Eb", 63, -3),
            ("Ab", 68, -4),
            ("Db", 61, -5),
            ("Gb", 66, -6),
        ]
        .into_iter()
        .map(|(name, tonic, fifths)| (name.to_string(), KeyEntry { tonic, fifths }))
        .collect();

        let scales = [
            ("major-pentatonic", "Major Pentatonic", &[0, 2, 4, 7, 9][..]),
            ("minor-pentatonic", "Minor Pentatonic", &[0, 3, 5, 7, 10][..]),
            ("blues-minor", "Blues Scale (Minor)", &[0, 3, 5, 6, 7, 10][..]),
            ("blues-major", "Major Blues Scale", &[0, 2, 3, 4, 7, 9][..]),
            ("dorian", "Dorian Mode", &[0, 2, 3, 5, 7, 9, 10][..]),
            ("mixolydian", "Mixolydian Mode", &[0, 2, 4, 5, 7, 9, 10][..]),
            ("major", "Natural Major (Ionian)", &[0, 2, 4, 5, 7, 9, 11][..]),
            ("minor", "Natural Minor (Aeolian)", &[0, 2, 3, 5, 7, 8, 10][..]),
            ("harmonic-minor", "Harmonic Minor", &[0, 2, 3, 5, 7, 8, 11][..]),
            ("melodic-minor", "Melodic Minor (Ascending)", &[0, 2, 3, 5, 7, 9, 11][..]),
        ]
        .into_iter()
        .map(|(name, display, intervals)| {
            (
                name.to_string(),
                ScalePattern {
                    display_name: display.to_string(),
                    intervals: intervals.to_vec(),
                },
            )
        })
        .collect();

        TheoryTables {
            keys,
            scales,
            octave_offsets: vec![-12, 0, 12],
            default_key: "C".to_string(),
            default_scale: "major".to_string(),
        }
    }
}

impl TheoryTables {
    /// Find a key by name. Accepts "G", "g", and "G Major".
    pub fn key(&self, name: &str) -> Option<(&str, KeyEntry)> {
        let trimmed = name.trim();
        let bare = trimmed
            .strip_suffix("Major")
            .or_else(|| trimmed.strip_suffix("major"))
            .unwrap_or(trimmed)
            .trim();
        self.keys
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(bare))
            .map(|(k, v)| (k.as_str(), *v))
    }

    /// Find a scale pattern by name (case-insensitive).
    pub fn scale(&self, name: &str) -> Option<(&str, &ScalePattern)> {
        let trimmed = name.trim();
        self.scales
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(trimmed))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Resolve a key and scale into the pitch material for a run.
    ///
    /// Unknown names fall back to the table defaults, then to C major.
    pub fn resolve_scale(&self, key: &str, scale: &str) -> ScaleInfo {
        let (key_name, key_entry) = self
            .key(key)
            .or_else(|| {
                tracing::debug!(key, "unknown key, using default");
                self.key(&self.default_key)
            })
            .map(|(n, e)| (n.to_string(), e))
            .unwrap_or_else(|| ("C".to_string(), KeyEntry { tonic: 60, fifths: 0 }));

        let (scale_name, pattern) = self
            .scale(scale)
            .or_else(|| {
                tracing::debug!(scale, "unknown scale, using default");
                self.scale(&self.default_scale)
            })
            .map(|(n, p)| (n.to_string(), p.intervals.clone()))
            .unwrap_or_else(|| ("major".to_string(), vec![0, 2, 4, 5, 7, 9, 11]));

        ScaleInfo::build(
            key_name,
            scale_name,
            key_entry,
            pattern,
            &self.octave_offsets,
        )
    }
}

/// The pitch material for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleInfo {
    pub key_name: String,
    pub scale_name: String,
    pub tonic: u8,
    pub key_signature: i8,
    pub pattern: Vec<u8>,
    /// Every scale pitch across the register, ascending, no duplicates.
    pub pitches: Vec<u8>,
}

impl ScaleInfo {
    /// Build the pitch collection by applying each pattern interval at each
    /// octave offset around the tonic.
    pub fn build(
        key_name: String,
        scale_name: String,
        key: KeyEntry,
        pattern: Vec<u8>,
        octave_offsets: &[i16],
    ) -> Self {
        let mut pitches: Vec<u8> = pattern
            .iter()
            .flat_map(|&iv| {
                octave_offsets
                    .iter()
                    .map(move |&off| key.tonic as i16 + off + iv as i16)
            })
            .filter(|p| (0..=127).contains(p))
            .map(|p| p as u8)
            .collect();
        pitches.sort_unstable();
        pitches.dedup();

        ScaleInfo {
            key_name,
            scale_name,
            tonic: key.tonic,
            key_signature: key.fifths,
            pattern: pattern.into_iter().map(|iv| iv % 12).collect(),
            pitches,
        }
    }

    /// Pitch class of `pitch` relative to the tonic (0 = tonic).
    pub fn relative_class(&self, pitch: u8) -> u8 {
        (pitch as i16 - self.tonic as i16).rem_euclid(12) as u8
    }

    /// Tonic-relative pitch classes of the root, third, and fifth of the
    /// triad on `degree` (1-based, I = 1).
    pub fn triad_classes(&self, degree: u8) -> Option<[u8; 3]> {
        let len = self.pattern.len();
        if len == 0 {
            return None;
        }
        let root = degree.max(1) as usize - 1;
        Some([
            self.pattern[root % len],
            self.pattern[(root + 2) % len],
            self.pattern[(root + 4) % len],
        ])
    }

    /// All pitches of the collection that are chord tones of `degree`.
    pub fn chord_tones(&self, degree: u8) -> Vec<u8> {
        let Some(classes) = self.triad_classes(degree) else {
            return Vec::new();
        };
        self.pitches
            .iter()
            .copied()
            .filter(|&p| classes.contains(&self.relative_class(p)))
            .collect()
    }

    /// Chord tones of `degree` inside `[low, high]`.
    pub fn chord_tones_in(&self, degree: u8, low: u8, high: u8) -> Vec<u8> {
        self.chord_tones(degree)
            .into_iter()
            .filter(|p| (low..=high).contains(p))
            .collect()
    }

    /// Scale pitches inside `[low, high]`.
    pub fn pitches_in_range(&self, low: u8, high: u8) -> Vec<u8> {
        self.pitches
            .iter()
            .copied()
            .filter(|p| (low..=high).contains(p))
            .collect()
    }

    /// The tonic-class pitch nearest the middle of `[low, high]`, or `None`
    /// when the range holds no tonic.
    pub fn home_pitch(&self, low: u8, high: u8) -> Option<u8> {
        let mid = ((low as u16 + high as u16) / 2) as u8;
        let tonics: Vec<u8> = (low..=high)
            .filter(|&p| self.relative_class(p) == 0)
            .collect();
        nearest(&tonics, mid)
    }
}

/// The element of `pitches` closest to `target`; ties go to the earlier one.
pub fn nearest(pitches: &[u8], target: u8) -> Option<u8> {
    pitches
        .iter()
        .copied()
        .min_by_key(|&p| (p as i16 - target as i16).unsigned_abs())
}
