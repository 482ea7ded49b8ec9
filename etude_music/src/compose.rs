// The composition pipeline: options in, score out.
//
// Steps, in order:
// 1. Resolve options into a `Config` (config.rs).
// 2. Resolve key and scale into `ScaleInfo` (theory.rs).
// 3. Pick the progression, or take the caller's explicit one with its last
//    chord held to the end (progression.rs).
// 4. Walk the piece in phrase windows of `phrase_length` bars. Each enabled
//    voice gets a phrase against the window's chord slice (phrase.rs), with
//    the previous pitch carried across windows and the first chord of the
//    next window available for anticipation. After the first window, the
//    treble may reuse the first window's rhythm.
// 5. Quantize each voice's stream into exactly `bars` measures (quantize.rs).
// 6. Overwrite the last bar with the cadence (cadence.rs).
//
// Nothing here can fail. Randomness enters only through the `RandomSource`
// passed in, so a fixed seed (or `FirstCandidate`) reproduces a score.

use crate::cadence::finalize_cadence;
use crate::config::{Config, PracticeOptions};
use crate::event::Duration;
use crate::phrase::{Phrase, PhraseRequest, generate_phrase};
use crate::progression::{ProgressionTable, Roman, hold_to_bars};
use crate::quantize::quantize;
use crate::score::{Part, Score, ScoreMeta, Voice};
use crate::theory::TheoryTables;
use etude_prng::RandomSource;

/// Resolve `options` against the default tables and compose a score.
pub fn generate(options: &PracticeOptions, rng: &mut impl RandomSource) -> Score {
    let config = Config::resolve(options);
    compose(
        &config,
        &TheoryTables::default(),
        &ProgressionTable::default(),
        rng,
    )
}

/// Compose a score from a resolved config and explicit lookup tables.
pub fn compose(
    config: &Config,
    tables: &TheoryTables,
    progressions: &ProgressionTable,
    rng: &mut impl RandomSource,
) -> Score {
    let scale = tables.resolve_scale(&config.key, &config.scale);
    let chords = match &config.progression {
        Some(explicit) => hold_to_bars(explicit, config.bars),
        None => progressions.select(config.bars, rng),
    };

    let mut streams = [Vec::new(), Vec::new()];
    let mut previous: [Option<u8>; 2] = [None, None];
    let mut motif: Option<Vec<Duration>> = None;
    // Hand-built configs may skip normalization.
    let window_len = config.phrase_length.max(1);

    for (window, slice) in chords.chunks(window_len).enumerate() {
        let start = window * window_len;
        let following = chords.get(start + slice.len()).copied();

        for voice in Voice::ALL {
            if !config.voice(voice).enabled {
                continue;
            }
            let reuse_rhythm = voice == Voice::Treble
                && window > 0
                && motif.is_some()
                && rng.chance(config.motif_repetition);
            let request = PhraseRequest {
                voice,
                chords: slice,
                following,
                previous_pitch: previous[voice.index()],
                rhythm_motif: if reuse_rhythm { motif.as_deref() } else { None },
                opening: window == 0,
            };
            let Phrase {
                events,
                last_pitch,
                rhythm,
            } = generate_phrase(&scale, config, &request, rng);

            if voice == Voice::Treble && window == 0 {
                motif = Some(rhythm);
            }
            previous[voice.index()] = last_pitch;
            streams[voice.index()].extend(events);
        }

        tracing::debug!(
            window,
            chords = ?slice.iter().map(|c| c.symbol()).collect::<Vec<_>>(),
            "phrase window done"
        );
    }

    let [treble_events, bass_events] = streams;
    let mut parts = [
        Part::new(
            Voice::Treble,
            quantize(&treble_events, config.bars, config.beats_per_bar),
        ),
        Part::new(
            Voice::Bass,
            quantize(&bass_events, config.bars, config.beats_per_bar),
        ),
    ];
    finalize_cadence(&mut parts, config.cadence, &scale, config);

    tracing::info!(
        bars = config.bars,
        key = %scale.key_name,
        scale = %scale.scale_name,
        cadence = ?config.cadence,
        progression = ?chords.iter().map(|c| Roman::symbol(*c)).collect::<Vec<_>>(),
        "composed practice score"
    );

    Score {
        meta: ScoreMeta {
            title: config.title.clone(),
            key: scale.key_name.clone(),
            scale: scale.scale_name.clone(),
            bpm: config.bpm,
            bars: config.bars,
            beats_per_bar: config.beats_per_bar,
            ticks_per_beat: config.ticks_per_beat,
            fifths: scale.key_signature,
        },
        parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use etude_prng::{EtudeRng, FirstCandidate};

    #[test]
    fn test_same_seed_same_score() {
        let options = PracticeOptions::default();
        let a = generate(&options, &mut EtudeRng::new(42));
        let b = generate(&options, &mut EtudeRng::new(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_meta_reflects_config() {
        let options = PracticeOptions {
            key: Some("Bb Major".into()),
            scale: Some("dorian".into()),
            bars: Some(6),
            bpm: Some(120),
            title: Some("Warmup".into()),
            ..Default::default()
        };
        let score = generate(&options, &mut EtudeRng::new(1));
        assert_eq!(score.meta.key, "Bb");
        assert_eq!(score.meta.scale, "dorian");
        assert_eq!(score.meta.fifths, -2);
        assert_eq!(score.meta.bars, 6);
        assert_eq!(score.meta.bpm, 120);
        assert_eq!(score.meta.title, "Warmup");
        assert_eq!(score.treble().measures.len(), 6);
        assert_eq!(score.bass().measures.len(), 6);
    }

    #[test]
    fn test_explicit_progression_drives_bass() {
        let options = PracticeOptions {
            bars: Some(3),
            progression: Some(vec!["V".into(), "vi".into()]),
            cadence: Some("none".into()),
            ..Default::default()
        };
        let score = generate(&options, &mut FirstCandidate);
        // V vi, with vi held into the third bar.
        let expected: [[u8; 3]; 3] = [[7, 11, 2], [9, 0, 4], [9, 0, 4]];
        for (measure, classes) in score.bass().measures.iter().zip(expected) {
            let pitches = measure.events[0].pitches();
            assert!(!pitches.is_empty());
            assert!(pitches.iter().all(|p| classes.contains(&(p % 12))));
        }
    }

    #[test]
    fn test_zero_phrase_length_is_one_bar_windows() {
        let config = Config {
            phrase_length: 0,
            bars: 3,
            ..Config::default()
        };
        let score = compose(
            &config,
            &TheoryTables::default(),
            &ProgressionTable::default(),
            &mut EtudeRng::new(2),
        );
        assert_eq!(score.treble().measures.len(), 3);
        assert!(score.treble().measures.iter().all(|m| m.is_full(4)));
    }

    #[test]
    fn test_disabled_treble_is_silent() {
        let options = PracticeOptions {
            treble_enabled: Some(false),
            ..Default::default()
        };
        let score = generate(&options, &mut EtudeRng::new(8));
        assert!(score.treble().events().all(Event::is_rest));
        assert!(score.bass().events().any(|e| !e.is_rest()));
    }

    #[test]
    fn test_full_motif_repetition_repeats_rhythm() {
        let options = PracticeOptions {
            bars: Some(8),
            phrase_length: Some(4),
            motif_repetition: Some(1.0),
            cadence: Some("none".into()),
            ..Default::default()
        };
        let score = generate(&options, &mut EtudeRng::new(21));
        let rhythm = |bars: std::ops::Range<usize>| -> Vec<Duration> {
            score.treble().measures[bars]
                .iter()
                .flat_map(|m| m.events.iter().map(Event::duration))
                .collect()
        };
        assert_eq!(rhythm(0..4), rhythm(4..8));
    }
}
