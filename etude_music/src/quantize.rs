// Measure quantization: pack a voice's flat event stream into bars.
//
// Greedy first-fit with no backtracking. An event that would spill over the
// bar line closes the open measure and starts the next one. A measure closed
// short is padded with rests up to the bar line, and an event longer than a
// whole bar is cut to the longest duration that fits. Rests come no shorter
// than an eighth, so a sixteenth gap left by a dotted eighth is closed by
// lengthening that event instead. Every measure that leaves this module sums
// to exactly `beats_per_bar`.
//
// The result always has exactly `bars` measures: surplus measures are
// dropped and missing ones are filled with full-bar rests. Quantizing the
// flattened output again yields the same partition.

use crate::event::{BEAT_EPSILON, Duration, Event};
use crate::score::Measure;

/// Pack `events` into exactly `bars` complete measures.
pub fn quantize(events: &[Event], bars: usize, beats_per_bar: u32) -> Vec<Measure> {
    let capacity = beats_per_bar as f64;
    let mut measures: Vec<Measure> = Vec::with_capacity(bars);
    let mut open: Vec<Event> = Vec::new();
    let mut filled = 0.0;

    for event in events {
        let event = fit_to_bar(event.clone(), capacity);
        let beats = event.beats();

        if filled + beats > capacity + BEAT_EPSILON {
            measures.push(close_measure(std::mem::take(&mut open), capacity));
            filled = 0.0;
        }

        open.push(event);
        filled += beats;

        if (filled - capacity).abs() < BEAT_EPSILON {
            measures.push(Measure::new(std::mem::take(&mut open)));
            filled = 0.0;
        }
    }
    if !open.is_empty() {
        measures.push(close_measure(open, capacity));
    }

    if measures.len() != bars {
        tracing::debug!(
            produced = measures.len(),
            bars,
            "adjusting measure count to bar count"
        );
    }
    measures.truncate(bars);
    measures.resize_with(bars, || full_bar_rest(beats_per_bar));
    measures
}

/// All events of `measures` in order.
pub fn flatten(measures: &[Measure]) -> Vec<Event> {
    measures
        .iter()
        .flat_map(|m| m.events.iter().cloned())
        .collect()
}

/// A measure holding only silence for one full bar.
pub fn full_bar_rest(beats_per_bar: u32) -> Measure {
    Measure::new(Event::rests_for(beats_per_bar as f64))
}

/// Shorten an event that cannot fit in any bar.
fn fit_to_bar(event: Event, capacity: f64) -> Event {
    if event.beats() <= capacity + BEAT_EPSILON {
        return event;
    }
    let duration = Duration::largest_fitting(capacity).unwrap_or(Duration::Eighth);
    tracing::debug!(
        from = event.duration().token(),
        to = duration.token(),
        "event longer than a bar, shortening"
    );
    event.with_duration(duration)
}

/// Pad a partial measure with rests up to the bar line. An empty measure
/// becomes a full-bar rest.
fn close_measure(mut events: Vec<Event>, capacity: f64) -> Measure {
    if events.is_empty() {
        return Measure::new(Event::rests_for(capacity));
    }
    let gap = capacity - events.iter().map(Event::beats).sum::<f64>();
    let rests = Event::rests_for(gap);
    let leftover = gap - rests.iter().map(Event::beats).sum::<f64>();
    if leftover > BEAT_EPSILON {
        absorb_remainder(&mut events, leftover);
    }
    events.extend(rests);
    Measure::new(events)
}

/// Lengthen the latest event that becomes a whole token when `leftover`
/// beats are added to it.
fn absorb_remainder(events: &mut [Event], leftover: f64) {
    for event in events.iter_mut().rev() {
        let target = event.beats() + leftover;
        let Some(longer) = Duration::DESCENDING
            .into_iter()
            .find(|d| (d.beats() - target).abs() < BEAT_EPSILON)
        else {
            continue;
        };
        tracing::debug!(
            from = event.duration().token(),
            to = longer.token(),
            "lengthening event to close the bar"
        );
        *event = event.clone().with_duration(longer);
        return;
    }
    tracing::debug!(leftover, "no event can absorb the bar remainder");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pitch: u8) -> Event {
        Event::note(pitch, Duration::Quarter, 90)
    }

    fn boundaries(measures: &[Measure]) -> Vec<usize> {
        measures.iter().map(|m| m.events.len()).collect()
    }

    #[test]
    fn test_exact_bars() {
        let events: Vec<Event> = (0..8).map(|i| q(60 + i)).collect();
        let measures = quantize(&events, 2, 4);
        assert_eq!(boundaries(&measures), vec![4, 4]);
        assert!(measures.iter().all(|m| m.is_full(4)));
    }

    #[test]
    fn test_overflow_closes_and_pads() {
        let events = vec![
            Event::note(60, Duration::DottedQuarter, 90),
            Event::note(62, Duration::DottedQuarter, 90),
            Event::note(64, Duration::Half, 90),
        ];
        let measures = quantize(&events, 2, 4);
        // 1.5 + 1.5 = 3; the half note spills, so bar one gets a quarter rest.
        assert_eq!(measures[0].events.len(), 3);
        assert_eq!(measures[0].events[2], Event::rest(Duration::Quarter));
        assert_eq!(measures[1].events[0], Event::note(64, Duration::Half, 90));
        assert!(measures.iter().all(|m| m.is_full(4)));
    }

    #[test]
    fn test_pads_and_truncates_to_bar_count() {
        let measures = quantize(&[q(60)], 3, 4);
        assert_eq!(measures.len(), 3);
        assert!(measures.iter().all(|m| m.is_full(4)));
        assert_eq!(measures[2].events, vec![Event::rest(Duration::Whole)]);

        let events: Vec<Event> = (0..12).map(|i| q(60 + i)).collect();
        assert_eq!(quantize(&events, 2, 4).len(), 2);
        assert!(quantize(&[], 0, 4).is_empty());
    }

    #[test]
    fn test_whole_note_in_three_four() {
        let measures = quantize(&[Event::note(60, Duration::Whole, 90)], 1, 3);
        assert_eq!(
            measures[0].events,
            vec![
                Event::note(60, Duration::Half, 90),
                Event::rest(Duration::Quarter)
            ]
        );
    }

    #[test]
    fn test_empty_bar_rest_in_odd_meter() {
        let measures = quantize(&[], 1, 5);
        assert_eq!(
            measures[0].events,
            vec![Event::rest(Duration::Whole), Event::rest(Duration::Quarter)]
        );
    }

    #[test]
    fn test_dotted_eighth_gap_closes_bar() {
        let events = vec![
            q(60),
            q(62),
            q(64),
            Event::note(65, Duration::DottedEighth, 90),
            q(67),
        ];
        let measures = quantize(&events, 2, 4);
        assert!(measures.iter().all(|m| m.is_full(4)), "{measures:?}");
        assert_eq!(measures[0].events.len(), 4);
        assert_eq!(measures[0].events[3], Event::note(65, Duration::Quarter, 90));
        assert_eq!(
            measures[1].events,
            vec![
                q(67),
                Event::rest(Duration::Half),
                Event::rest(Duration::Quarter)
            ]
        );
        assert_eq!(quantize(&flatten(&measures), 2, 4), measures);

        // A trailing dotted eighth followed by padding rests.
        let lone = quantize(&[Event::note(60, Duration::DottedEighth, 90)], 1, 4);
        assert!(lone[0].is_full(4), "{lone:?}");
        assert_eq!(lone[0].events[0], Event::note(60, Duration::Quarter, 90));
    }

    #[test]
    fn test_requantize_is_stable() {
        let events = vec![
            Event::note(60, Duration::Half, 90),
            Event::note(62, Duration::DottedQuarter, 90),
            Event::note(64, Duration::Half, 90),
            Event::note(65, Duration::Eighth, 90),
            Event::chord(&[48, 52, 55], Duration::Whole, 90),
            Event::note(67, Duration::Eighth, 90),
        ];
        for beats in [3, 4, 6] {
            let first = quantize(&events, 4, beats);
            assert!(first.iter().all(|m| m.is_full(beats)));
            let second = quantize(&flatten(&first), 4, beats);
            assert_eq!(first, second, "unstable at {beats} beats per bar");
        }
    }
}
