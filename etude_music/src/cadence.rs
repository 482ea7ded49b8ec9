// Cadence finalization: overwrite the last bar with the closing chord.
//
// Runs after quantization. For a cadence style with a final chord (I for
// authentic and plagal, vi for deceptive), the last measure of every enabled
// part is replaced by one block chord of the lowest three chord tones in
// that voice's range, held for the whole bar. If no chord tone fits the
// range the bar becomes silence. In meters where no single duration spans
// the bar, the chord takes the longest duration that fits and rests
// complete it.
//
// Disabled parts stay silent, and the "none" style leaves both parts as
// generated.

use crate::config::{CadenceStyle, Config};
use crate::event::{Duration, Event};
use crate::score::{Measure, Part};
use crate::theory::ScaleInfo;

/// Replace the final measure of each enabled part with the cadence chord.
pub fn finalize_cadence(
    parts: &mut [Part; 2],
    style: CadenceStyle,
    scale: &ScaleInfo,
    config: &Config,
) {
    let Some(chord) = style.final_chord() else {
        return;
    };
    for part in parts.iter_mut() {
        let settings = config.voice(part.voice_id);
        if !settings.enabled {
            continue;
        }
        let Some(last) = part.measures.last_mut() else {
            continue;
        };
        let tones: Vec<u8> = scale
            .chord_tones_in(chord.degree(), settings.low, settings.high)
            .into_iter()
            .take(3)
            .collect();
        *last = cadence_measure(&tones, config.beats_per_bar, config.velocity);
        tracing::debug!(
            voice = ?part.voice_id,
            chord = chord.symbol(),
            pitches = ?tones,
            "wrote cadence"
        );
    }
}

/// One bar holding `tones` as a chord (or a rest when empty).
fn cadence_measure(tones: &[u8], beats_per_bar: u32, velocity: u8) -> Measure {
    let beats = beats_per_bar as f64;
    let duration = Duration::largest_fitting(beats).unwrap_or(Duration::Eighth);
    let mut events = vec![Event::chord(tones, duration, velocity)];
    events.extend(Event::rests_for(beats - duration.beats()));
    Measure::new(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::full_bar_rest;
    use crate::score::Voice;
    use crate::theory::TheoryTables;

    fn parts(bars: usize) -> [Part; 2] {
        let measures = vec![Measure::new(vec![Event::note(71, Duration::Whole, 90)]); bars];
        [
            Part::new(Voice::Treble, measures.clone()),
            Part::new(Voice::Bass, measures),
        ]
    }

    #[test]
    fn test_authentic_writes_tonic_chords() {
        let scale = TheoryTables::default().resolve_scale("C", "major");
        let cfg = Config::default();
        let mut parts = parts(2);
        finalize_cadence(&mut parts, CadenceStyle::Authentic, &scale, &cfg);

        let treble_last = &parts[0].measures[1].events;
        assert_eq!(treble_last, &vec![Event::chord(&[60, 64, 67], Duration::Whole, 90)]);
        let bass_last = &parts[1].measures[1].events;
        assert_eq!(bass_last, &vec![Event::chord(&[48, 52, 55], Duration::Whole, 90)]);
        // Earlier bars untouched.
        assert_eq!(parts[0].measures[0].events[0], Event::note(71, Duration::Whole, 90));
    }

    #[test]
    fn test_deceptive_lands_on_submediant() {
        let scale = TheoryTables::default().resolve_scale("C", "major");
        let cfg = Config::default();
        let mut parts = parts(1);
        finalize_cadence(&mut parts, CadenceStyle::Deceptive, &scale, &cfg);
        // vi = A C E; lowest three in the treble range are C4 E4 A4.
        assert_eq!(parts[0].measures[0].events[0].pitches(), &[60, 64, 69]);
    }

    #[test]
    fn test_none_is_noop() {
        let scale = TheoryTables::default().resolve_scale("C", "major");
        let cfg = Config::default();
        let mut p = parts(2);
        let before = p.clone();
        finalize_cadence(&mut p, CadenceStyle::Open, &scale, &cfg);
        assert_eq!(p, before);
    }

    #[test]
    fn test_empty_range_and_disabled_voice() {
        let scale = TheoryTables::default().resolve_scale("C", "major");
        let mut cfg = Config::default();
        cfg.treble.low = 61;
        cfg.treble.high = 62;
        cfg.bass.enabled = false;
        let mut p = parts(1);
        p[1].measures[0] = full_bar_rest(4);
        finalize_cadence(&mut p, CadenceStyle::Plagal, &scale, &cfg);
        assert_eq!(p[0].measures[0].events, vec![Event::rest(Duration::Whole)]);
        assert_eq!(p[1].measures[0], full_bar_rest(4));
    }

    #[test]
    fn test_three_four_cadence_fills_bar() {
        let scale = TheoryTables::default().resolve_scale("C", "major");
        let cfg = Config {
            beats_per_bar: 3,
            ..Config::default()
        };
        let mut p = parts(1);
        finalize_cadence(&mut p, CadenceStyle::Authentic, &scale, &cfg);
        assert!(p[0].measures[0].is_full(3));
        assert_eq!(p[0].measures[0].events.len(), 2);
    }
}
