// Phrase generation: one voice, one phrase window, bar by bar.
//
// For every bar the generator looks up the bar's chord, gathers its chord
// tones inside the voice's range, and writes events until the bar is full.
//
// The bass renders each bar as one sustained block chord built upward from a
// chord-tone root chosen near the previous root. A root near the top of the
// range borrows the missing tones from below.
//
// The treble walks beat by beat. Durations come from a pool chosen by rhythm
// complexity (or, when the piece repeats its rhythmic motif, from the first
// window's rhythm), shortened by an ordered fallback when they would spill
// over the bar line. Pitches are drawn from chord tones within `max_leap`
// of the previous pitch: the downbeat targets the current chord, later beats
// target the current and next chords together so the line can lean into the
// coming harmony, and occasionally a later beat jumps straight to a current
// chord tone. The leap limit is a preference. When nothing lies within it,
// the closest target wins.
//
// State between steps (previous pitch, beat position) is local and threaded
// explicitly; the caller carries the previous pitch from window to window.
//
// Consumed by compose.rs; output goes straight into quantize.rs.

use crate::config::{Config, RhythmComplexity, VoiceSettings};
use crate::event::{BEAT_EPSILON, Duration, Event};
use crate::progression::Roman;
use crate::score::Voice;
use crate::theory::{ScaleInfo, nearest};
use etude_prng::RandomSource;

/// Chance that a later beat abandons voice leading for a current chord tone.
pub const CHORD_JUMP_PROBABILITY: f64 = 0.2;

/// Durations tried, in order, when the drawn one overflows the bar.
const FIT_FALLBACK: [Duration; 5] = [
    Duration::Half,
    Duration::DottedQuarter,
    Duration::Quarter,
    Duration::DottedEighth,
    Duration::Eighth,
];

/// The multiset of durations each complexity draws from.
pub fn duration_pool(complexity: RhythmComplexity) -> &'static [Duration] {
    use Duration::*;
    match complexity {
        RhythmComplexity::Simple => &[Quarter, Quarter, Quarter, Half],
        RhythmComplexity::Medium => &[Quarter, Quarter, Eighth, DottedQuarter, Half],
        RhythmComplexity::Complex => &[Quarter, Eighth, Eighth, DottedQuarter, Quarter, Eighth],
    }
}

/// What to generate for one voice over one phrase window.
#[derive(Debug, Clone)]
pub struct PhraseRequest<'a> {
    pub voice: Voice,
    /// One chord per bar of the window.
    pub chords: &'a [Roman],
    /// First chord after the window, for anticipation in the last bar.
    pub following: Option<Roman>,
    /// Last pitch of the previous window, if any.
    pub previous_pitch: Option<u8>,
    /// Rhythm to reuse instead of drawing from the pool.
    pub rhythm_motif: Option<&'a [Duration]>,
    /// True for the window that opens the piece.
    pub opening: bool,
}

/// A generated phrase and the state to carry into the next window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Phrase {
    pub events: Vec<Event>,
    pub last_pitch: Option<u8>,
    /// Durations of the events, in order.
    pub rhythm: Vec<Duration>,
}

/// Generate one phrase window for one voice.
pub fn generate_phrase(
    scale: &ScaleInfo,
    config: &Config,
    request: &PhraseRequest<'_>,
    rng: &mut impl RandomSource,
) -> Phrase {
    let settings = config.voice(request.voice);
    let beats_per_bar = config.beats_per_bar as f64;
    let mut phrase = Phrase {
        last_pitch: request.previous_pitch,
        ..Phrase::default()
    };
    let mut motif_pos = 0;

    for bar in 0..request.chords.len() {
        let chord = chord_at(request.chords, bar);
        let next_chord = request
            .chords
            .get(bar + 1)
            .copied()
            .or(request.following)
            .unwrap_or(chord);
        let tones = voice_chord_tones(scale, chord, settings);

        if request.voice == Voice::Bass {
            let (root, pitches) = bass_voicing(&tones, phrase.last_pitch, settings, config, rng);
            let duration = Duration::largest_fitting(beats_per_bar).unwrap_or(Duration::Eighth);
            push(&mut phrase, Event::chord(&pitches, duration, config.velocity));
            for rest in Event::rests_for(beats_per_bar - duration.beats()) {
                push(&mut phrase, rest);
            }
            phrase.last_pitch = root.or(phrase.last_pitch);
            continue;
        }

        let mut beat = 0.0;
        while beat < beats_per_bar - BEAT_EPSILON {
            let downbeat = beat < BEAT_EPSILON;
            let drawn = match request.rhythm_motif {
                Some(motif) if !motif.is_empty() => {
                    motif_pos += 1;
                    motif[(motif_pos - 1) % motif.len()]
                }
                _ => pick_duration(config, downbeat, rng),
            };
            let duration = fit_duration(drawn, beats_per_bar - beat);

            let choice = if downbeat {
                let opening_note = request.opening
                    && bar == 0
                    && phrase.last_pitch.is_none()
                    && config.start_on_tonic;
                let home = if opening_note {
                    scale.home_pitch(settings.low, settings.high)
                } else {
                    None
                };
                home.or_else(|| {
                    next_pitch(&tones, phrase.last_pitch, settings.max_leap, config, rng)
                })
            } else {
                let mut targets = tones.clone();
                targets.extend(scale.chord_tones_in(
                    next_chord.degree(),
                    settings.low,
                    settings.high,
                ));
                targets.sort_unstable();
                targets.dedup();
                if targets.is_empty() {
                    targets = scale.pitches_in_range(settings.low, settings.high);
                }
                let mut pick =
                    next_pitch(&targets, phrase.last_pitch, settings.max_leap, config, rng);
                if !tones.is_empty() && rng.chance(CHORD_JUMP_PROBABILITY) {
                    pick = rng.choose(&tones).copied();
                }
                pick
            };

            let pitch = settle_pitch(choice, phrase.last_pitch, scale, settings);
            push(&mut phrase, Event::note(pitch, duration, config.velocity));
            phrase.last_pitch = Some(pitch);
            beat += duration.beats();
        }
    }

    tracing::debug!(
        voice = ?request.voice,
        chords = ?request.chords.iter().map(|c| c.symbol()).collect::<Vec<_>>(),
        pitches = ?phrase.events.iter().filter_map(Event::lead_pitch).collect::<Vec<_>>(),
        "generated phrase"
    );
    phrase
}

fn push(phrase: &mut Phrase, event: Event) {
    phrase.rhythm.push(event.duration());
    phrase.events.push(event);
}

/// The chord for `bar`, holding the last known chord past the end and the
/// tonic for an empty slice.
fn chord_at(chords: &[Roman], bar: usize) -> Roman {
    chords
        .get(bar)
        .or_else(|| chords.last())
        .copied()
        .unwrap_or(Roman::I)
}

/// Chord tones of `chord` in the voice's range, falling back to every
/// in-range scale pitch and then to the range's lowest pitch.
pub fn voice_chord_tones(scale: &ScaleInfo, chord: Roman, settings: &VoiceSettings) -> Vec<u8> {
    let tones = scale.chord_tones_in(chord.degree(), settings.low, settings.high);
    if !tones.is_empty() {
        return tones;
    }
    let in_range = scale.pitches_in_range(settings.low, settings.high);
    if !in_range.is_empty() {
        tracing::debug!(chord = chord.symbol(), "no chord tones in range, using scale pitches");
        return in_range;
    }
    tracing::debug!(chord = chord.symbol(), "no scale pitches in range, using range floor");
    vec![settings.low]
}

/// A root chosen near the previous root, and up to three consecutive chord
/// tones stacked upward from it. When the root sits too near the top of the
/// range the stack takes tones from below instead.
fn bass_voicing(
    tones: &[u8],
    previous: Option<u8>,
    settings: &VoiceSettings,
    config: &Config,
    rng: &mut impl RandomSource,
) -> (Option<u8>, Vec<u8>) {
    let root = next_pitch(tones, previous, settings.max_leap, config, rng);
    let at = root
        .and_then(|r| tones.iter().position(|&t| t == r))
        .unwrap_or(0);
    let start = at.min(tones.len().saturating_sub(3));
    (root, tones.iter().skip(start).take(3).copied().collect())
}

/// Draw a duration from the complexity pool. On a downbeat, a roll against
/// `long_note_frequency` narrows the pool to its long values.
pub fn pick_duration(config: &Config, prefer_long: bool, rng: &mut impl RandomSource) -> Duration {
    let pool = duration_pool(config.rhythm_complexity);
    if prefer_long && rng.chance(config.long_note_frequency) {
        let long: Vec<Duration> = pool.iter().copied().filter(|d| d.is_long()).collect();
        if let Some(&d) = rng.choose(&long) {
            return d;
        }
    }
    rng.choose(pool).copied().unwrap_or(Duration::Quarter)
}

/// Keep `drawn` if it fits in `remaining` beats, else the first fallback
/// that does.
pub fn fit_duration(drawn: Duration, remaining: f64) -> Duration {
    if drawn.beats() <= remaining + BEAT_EPSILON {
        return drawn;
    }
    FIT_FALLBACK
        .into_iter()
        .find(|d| d.beats() <= remaining + BEAT_EPSILON)
        .unwrap_or(Duration::Eighth)
}

/// Choose the next pitch from `targets`.
///
/// Without a previous pitch any target may open. Otherwise candidates are
/// the targets within `max_leap`; if there are none, the closest target is
/// taken. A non-zero direction bias first rolls a direction and keeps only
/// candidates on that side when any exist.
pub fn next_pitch(
    targets: &[u8],
    previous: Option<u8>,
    max_leap: u8,
    config: &Config,
    rng: &mut impl RandomSource,
) -> Option<u8> {
    let Some(prev) = previous else {
        return rng.choose(targets).copied();
    };
    let within: Vec<u8> = targets
        .iter()
        .copied()
        .filter(|&p| leap(prev, p) <= max_leap as u16)
        .collect();
    if within.is_empty() {
        return nearest(targets, prev);
    }

    let bias = config.melodic_direction_bias;
    if bias != 0.0 {
        let upward = rng.next_unit() - 0.5 + bias * 0.75 > 0.0;
        let directed: Vec<u8> = within
            .iter()
            .copied()
            .filter(|&p| if upward { p > prev } else { p < prev })
            .collect();
        if !directed.is_empty() {
            return rng.choose(&directed).copied();
        }
    }
    rng.choose(&within).copied()
}

/// Resolve an empty choice through previous pitch, any in-range scale pitch,
/// then the voice's home tonic, and clamp into range as a last resort.
fn settle_pitch(
    choice: Option<u8>,
    previous: Option<u8>,
    scale: &ScaleInfo,
    settings: &VoiceSettings,
) -> u8 {
    let pitch = choice
        .or(previous)
        .or_else(|| scale.pitches_in_range(settings.low, settings.high).first().copied())
        .or_else(|| scale.home_pitch(settings.low, settings.high))
        .unwrap_or(scale.tonic);
    settings.clamp(pitch)
}

/// Absolute distance in semitones.
pub fn leap(a: u8, b: u8) -> u16 {
    (a as i16 - b as i16).unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::TheoryTables;
    use etude_prng::{EtudeRng, FirstCandidate};

    fn c_major() -> ScaleInfo {
        TheoryTables::default().resolve_scale("C", "major")
    }

    fn request<'a>(voice: Voice, chords: &'a [Roman]) -> PhraseRequest<'a> {
        PhraseRequest {
            voice,
            chords,
            following: None,
            previous_pitch: None,
            rhythm_motif: None,
            opening: true,
        }
    }

    fn bar_sums(events: &[Event], beats_per_bar: f64) -> Vec<f64> {
        let mut sums = Vec::new();
        let mut acc = 0.0;
        for ev in events {
            acc += ev.beats();
            if (acc - beats_per_bar).abs() < BEAT_EPSILON {
                sums.push(acc);
                acc = 0.0;
            }
        }
        assert!(acc.abs() < BEAT_EPSILON, "phrase ends mid-bar with {acc} beats");
        sums
    }

    #[test]
    fn test_fit_duration_fallback_order() {
        assert_eq!(fit_duration(Duration::Quarter, 3.0), Duration::Quarter);
        assert_eq!(fit_duration(Duration::Whole, 3.0), Duration::Half);
        assert_eq!(fit_duration(Duration::Half, 1.5), Duration::DottedQuarter);
        assert_eq!(fit_duration(Duration::DottedQuarter, 1.0), Duration::Quarter);
        assert_eq!(fit_duration(Duration::Quarter, 0.75), Duration::DottedEighth);
        assert_eq!(fit_duration(Duration::Quarter, 0.5), Duration::Eighth);
        assert_eq!(fit_duration(Duration::Quarter, 0.25), Duration::Eighth);
    }

    #[test]
    fn test_next_pitch_respects_leap_when_possible() {
        let cfg = Config::default();
        let mut rng = EtudeRng::new(11);
        let targets = [60, 64, 67, 72, 76];
        for _ in 0..200 {
            let p = next_pitch(&targets, Some(65), 3, &cfg, &mut rng);
            assert!(matches!(p, Some(64) | Some(67)), "got {p:?}");
        }
    }

    #[test]
    fn test_next_pitch_relaxes_to_closest() {
        let cfg = Config::default();
        let p = next_pitch(&[48, 79], Some(70), 2, &cfg, &mut FirstCandidate);
        assert_eq!(p, Some(79));
        assert_eq!(next_pitch(&[], Some(70), 2, &cfg, &mut FirstCandidate), None);
    }

    #[test]
    fn test_direction_bias_steers_motion() {
        let cfg = Config {
            melodic_direction_bias: 1.0,
            ..Config::default()
        };
        let mut rng = EtudeRng::new(5);
        let targets = [60, 62, 64, 65, 67];
        // With full upward bias the roll is up unless u < 0.5 - 0.75, never.
        for _ in 0..100 {
            let p = next_pitch(&targets, Some(64), 4, &cfg, &mut rng);
            assert!(matches!(p, Some(65) | Some(67)), "got {p:?}");
        }
    }

    #[test]
    fn test_bass_writes_one_chord_per_bar() {
        let scale = c_major();
        let cfg = Config::default();
        let chords = [Roman::I, Roman::IV, Roman::V, Roman::I];
        let req = request(Voice::Bass, &chords);
        let phrase = generate_phrase(&scale, &cfg, &req, &mut FirstCandidate);
        assert_eq!(phrase.events.len(), 4);
        let expected_classes: [[u8; 3]; 4] = [[0, 4, 7], [5, 9, 0], [7, 11, 2], [0, 4, 7]];
        for (ev, classes) in phrase.events.iter().zip(expected_classes) {
            let Event::Chord { pitches, duration, .. } = ev else {
                panic!("bass bar should be a chord, got {ev:?}");
            };
            assert_eq!(*duration, Duration::Whole);
            assert!(!pitches.is_empty() && pitches.len() <= 3);
            assert!(pitches.iter().all(|p| (36..=60).contains(p)));
            assert!(pitches.iter().all(|p| classes.contains(&(p % 12))));
        }
    }

    #[test]
    fn test_bass_in_three_four_fills_with_rest() {
        let scale = c_major();
        let cfg = Config {
            beats_per_bar: 3,
            ..Config::default()
        };
        let chords = [Roman::I, Roman::V];
        let req = request(Voice::Bass, &chords);
        let phrase = generate_phrase(&scale, &cfg, &req, &mut FirstCandidate);
        assert_eq!(bar_sums(&phrase.events, 3.0).len(), 2);
        assert!(matches!(phrase.events[0], Event::Chord { duration: Duration::Half, .. }));
        assert_eq!(phrase.events[1], Event::rest(Duration::Quarter));
    }

    #[test]
    fn test_treble_fills_every_bar_exactly() {
        let scale = c_major();
        let complexities = [
            RhythmComplexity::Simple,
            RhythmComplexity::Medium,
            RhythmComplexity::Complex,
        ];
        for complexity in complexities {
            for beats in [2, 3, 4, 5, 7] {
                let cfg = Config {
                    rhythm_complexity: complexity,
                    beats_per_bar: beats,
                    long_note_frequency: 0.5,
                    ..Config::default()
                };
                let chords = [Roman::I, Roman::VI, Roman::IV, Roman::V];
                let mut rng = EtudeRng::new(beats as u64);
                let req = request(Voice::Treble, &chords);
                let phrase = generate_phrase(&scale, &cfg, &req, &mut rng);
                assert_eq!(bar_sums(&phrase.events, beats as f64).len(), 4);
                assert!(phrase.events.iter().all(|e| {
                    matches!(e, Event::Note { pitch, .. } if (60..=84).contains(pitch))
                }));
            }
        }
    }

    #[test]
    fn test_treble_downbeats_are_chord_tones() {
        let scale = c_major();
        let cfg = Config::default();
        let chords = [Roman::I, Roman::IV, Roman::V, Roman::I];
        let mut rng = EtudeRng::new(77);
        let phrase = generate_phrase(&scale, &cfg, &request(Voice::Treble, &chords), &mut rng);
        let mut acc = 0.0;
        let mut bar = 0;
        for ev in &phrase.events {
            if acc < BEAT_EPSILON {
                let classes = scale.triad_classes(chords[bar].degree()).unwrap();
                let pitch = ev.lead_pitch().unwrap();
                assert!(
                    classes.contains(&scale.relative_class(pitch)),
                    "bar {bar} downbeat {pitch}"
                );
            }
            acc += ev.beats();
            if (acc - 4.0).abs() < BEAT_EPSILON {
                acc = 0.0;
                bar += 1;
            }
        }
    }

    #[test]
    fn test_start_on_tonic() {
        let scale = c_major();
        let cfg = Config {
            start_on_tonic: true,
            ..Config::default()
        };
        let chords = [Roman::V];
        let mut rng = EtudeRng::new(1);
        let phrase = generate_phrase(&scale, &cfg, &request(Voice::Treble, &chords), &mut rng);
        assert_eq!(phrase.events[0].lead_pitch(), Some(72));
    }

    #[test]
    fn test_start_on_tonic_without_tonic_in_range() {
        let scale = c_major();
        // C#4..D#4 holds no C and no tone of I, only the scale pitch D4.
        let cfg = Config {
            start_on_tonic: true,
            treble: VoiceSettings {
                low: 61,
                high: 63,
                max_leap: 4,
                enabled: true,
            },
            ..Config::default()
        };
        let chords = [Roman::I];
        let req = request(Voice::Treble, &chords);
        let phrase = generate_phrase(&scale, &cfg, &req, &mut FirstCandidate);
        assert_eq!(phrase.events[0].lead_pitch(), Some(62));
        assert!(phrase.events.iter().all(|e| e.lead_pitch() == Some(62)));
    }

    #[test]
    fn test_bass_root_at_top_keeps_three_tones() {
        let cfg = Config::default();
        let settings = VoiceSettings {
            low: 48,
            high: 60,
            max_leap: 0,
            enabled: true,
        };
        let tones = [48, 52, 55, 60];
        let (root, pitches) = bass_voicing(&tones, Some(60), &settings, &cfg, &mut FirstCandidate);
        assert_eq!(root, Some(60));
        assert_eq!(pitches, [52, 55, 60]);

        let (root, pitches) = bass_voicing(&tones, Some(48), &settings, &cfg, &mut FirstCandidate);
        assert_eq!(root, Some(48));
        assert_eq!(pitches, [48, 52, 55]);

        let (_, pitches) = bass_voicing(&[50, 55], Some(55), &settings, &cfg, &mut FirstCandidate);
        assert_eq!(pitches, [50, 55]);
    }

    #[test]
    fn test_rhythm_motif_is_reused() {
        let scale = c_major();
        let cfg = Config::default();
        let motif = [Duration::DottedQuarter, Duration::Eighth, Duration::Half];
        let chords = [Roman::I, Roman::V];
        let req = PhraseRequest {
            rhythm_motif: Some(&motif),
            ..request(Voice::Treble, &chords)
        };
        let phrase = generate_phrase(&scale, &cfg, &req, &mut EtudeRng::new(9));
        assert_eq!(phrase.rhythm, [motif, motif].concat());
    }

    #[test]
    fn test_sparse_range_falls_back() {
        let scale = c_major();
        // C#4..C#4 holds no scale pitch at all.
        let cfg = Config {
            treble: VoiceSettings {
                low: 61,
                high: 61,
                max_leap: 2,
                enabled: true,
            },
            ..Config::default()
        };
        let chords = [Roman::I, Roman::V];
        let req = request(Voice::Treble, &chords);
        let phrase = generate_phrase(&scale, &cfg, &req, &mut EtudeRng::new(4));
        assert!(phrase.events.iter().all(|e| e.lead_pitch() == Some(61)));
    }
}
