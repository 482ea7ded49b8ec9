// Harmonic progressions: roman numerals and the table they are drawn from.
//
// A progression assigns one roman numeral (a scale-degree chord) to each bar.
// `ProgressionTable` maps a bar count to one or more registered progressions.
// Selection uses the entry for the largest registered count not exceeding
// the piece length (or the smallest entry when the piece is shorter than all
// of them) and breaks ties between several registered progressions with the
// injected random source. The result is then fitted to one numeral per bar:
// a piece longer than every registered entry cycles the progression, and
// otherwise the last numeral holds over the remaining bars.
//
// Consumed by compose.rs, which slices the fitted progression into phrase
// windows for phrase.rs.

use etude_prng::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A diatonic chord identified by its scale degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Roman {
    I,
    II,
    III,
    IV,
    V,
    VI,
    VII,
}

impl Roman {
    pub const ALL: [Roman; 7] = [
        Roman::I,
        Roman::II,
        Roman::III,
        Roman::IV,
        Roman::V,
        Roman::VI,
        Roman::VII,
    ];

    /// 1-based scale degree.
    pub fn degree(self) -> u8 {
        self as u8 + 1
    }

    /// Conventional major-key spelling (I ii iii IV V vi vii).
    pub fn symbol(self) -> &'static str {
        match self {
            Roman::I => "I",
            Roman::II => "ii",
            Roman::III => "iii",
            Roman::IV => "IV",
            Roman::V => "V",
            Roman::VI => "vi",
            Roman::VII => "vii",
        }
    }

    /// Parse a numeral in either case, ignoring quality marks such as "°".
    pub fn parse(name: &str) -> Option<Roman> {
        let letters: String = name
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        Roman::ALL
            .into_iter()
            .find(|r| r.symbol().eq_ignore_ascii_case(&letters))
    }

    /// Lenient parse: anything unrecognized is the tonic.
    pub fn parse_or_tonic(name: &str) -> Roman {
        Roman::parse(name).unwrap_or_else(|| {
            tracing::debug!(name, "unknown roman numeral, using I");
            Roman::I
        })
    }
}

impl From<String> for Roman {
    fn from(name: String) -> Self {
        Roman::parse_or_tonic(&name)
    }
}

impl From<Roman> for &'static str {
    fn from(r: Roman) -> Self {
        r.symbol()
    }
}

/// Registered progressions keyed by bar count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionTable {
    pub entries: BTreeMap<usize, Vec<Vec<Roman>>>,
}

impl Default for ProgressionTable {
    fn default() -> Self {
        use Roman::*;
        let mut entries = BTreeMap::new();
        entries.insert(2, vec![vec![I, V]]);
        entries.insert(4, vec![vec![I, IV, V, I], vec![I, VI, IV, V], vec![I, II, V, I]]);
        entries.insert(
            8,
            vec![
                vec![I, IV, V, I, VI, IV, V, I],
                vec![I, VI, II, V, I, IV, V, I],
            ],
        );
        ProgressionTable { entries }
    }
}

impl ProgressionTable {
    /// Choose a progression with exactly `bars` numerals.
    pub fn select(&self, bars: usize, rng: &mut impl RandomSource) -> Vec<Roman> {
        let entry = self
            .entries
            .range(..=bars)
            .next_back()
            .or_else(|| self.entries.iter().next());

        let chosen = entry.and_then(|(_, options)| match options.len() {
            0 => None,
            1 => options.first(),
            _ => rng.choose(options),
        });

        let longest = self.entries.keys().next_back().copied().unwrap_or(0);
        match chosen {
            Some(progression) if bars > longest => cycle_to_bars(progression, bars),
            Some(progression) => hold_to_bars(progression, bars),
            None => {
                tracing::debug!(bars, "no registered progression, holding the tonic");
                vec![Roman::I; bars]
            }
        }
    }
}

/// Truncate a progression to `bars` numerals, repeating the last numeral
/// when it runs short. An empty progression holds the tonic.
pub fn hold_to_bars(progression: &[Roman], bars: usize) -> Vec<Roman> {
    let last = progression.last().copied().unwrap_or(Roman::I);
    progression
        .iter()
        .copied()
        .chain(std::iter::repeat(last))
        .take(bars)
        .collect()
}

/// Cycle or truncate a progression to exactly `bars` numerals. An empty
/// progression holds the tonic.
pub fn cycle_to_bars(progression: &[Roman], bars: usize) -> Vec<Roman> {
    if progression.is_empty() {
        return vec![Roman::I; bars];
    }
    progression.iter().copied().cycle().take(bars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use etude_prng::{EtudeRng, FirstCandidate};

    #[test]
    fn test_parse_numerals() {
        assert_eq!(Roman::parse("IV"), Some(Roman::IV));
        assert_eq!(Roman::parse("vi"), Some(Roman::VI));
        assert_eq!(Roman::parse("VI"), Some(Roman::VI));
        assert_eq!(Roman::parse("vii°"), Some(Roman::VII));
        assert_eq!(Roman::parse("X"), None);
        assert_eq!(Roman::parse_or_tonic("?"), Roman::I);
        assert_eq!(Roman::V.degree(), 5);
    }

    #[test]
    fn test_select_exact_count() {
        let table = ProgressionTable::default();
        let prog = table.select(4, &mut FirstCandidate);
        assert_eq!(prog, vec![Roman::I, Roman::IV, Roman::V, Roman::I]);
    }

    #[test]
    fn test_select_holds_last_chord_within_table() {
        let table = ProgressionTable::default();
        // 6 bars -> 4-bar entry, final I held
        let prog = table.select(6, &mut FirstCandidate);
        assert_eq!(
            prog,
            vec![Roman::I, Roman::IV, Roman::V, Roman::I, Roman::I, Roman::I]
        );
        // 3 bars -> 2-bar entry, V held
        assert_eq!(
            table.select(3, &mut FirstCandidate),
            vec![Roman::I, Roman::V, Roman::V]
        );
    }

    #[test]
    fn test_select_cycles_past_longest_entry() {
        let table = ProgressionTable::default();
        let prog = table.select(10, &mut FirstCandidate);
        assert_eq!(prog.len(), 10);
        assert_eq!(prog[8..], [Roman::I, Roman::IV]);
    }

    #[test]
    fn test_hold_and_cycle_helpers() {
        use Roman::*;
        assert_eq!(hold_to_bars(&[I, V], 4), vec![I, V, V, V]);
        assert_eq!(hold_to_bars(&[I, IV, V], 2), vec![I, IV]);
        assert_eq!(hold_to_bars(&[], 2), vec![I, I]);
        assert_eq!(cycle_to_bars(&[I, V], 5), vec![I, V, I, V, I]);
        assert_eq!(cycle_to_bars(&[], 1), vec![I]);
    }

    #[test]
    fn test_select_shorter_than_table() {
        let table = ProgressionTable::default();
        assert_eq!(table.select(1, &mut FirstCandidate), vec![Roman::I]);
    }

    #[test]
    fn test_random_tie_break_reaches_every_option() {
        let table = ProgressionTable::default();
        let mut rng = EtudeRng::new(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(table.select(4, &mut rng));
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_empty_table_holds_tonic() {
        let table = ProgressionTable {
            entries: BTreeMap::new(),
        };
        assert_eq!(table.select(3, &mut FirstCandidate), vec![Roman::I; 3]);
    }
}
