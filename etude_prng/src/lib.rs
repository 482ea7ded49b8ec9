// Injectable randomness for the Etude composer.
//
// Every random decision the composition engine makes (duration pool picks,
// progression tie-breaking, pitch choice among leap-bounded candidates, the
// occasional chord-tone jump) goes through the `RandomSource` trait defined
// here. The engine never touches a global generator, so tests can drive it
// with a scripted source and production code with a seeded `EtudeRng`.
//
// `EtudeRng` implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64
// seeding. It is hand-rolled with zero external dependencies so the same seed
// yields the same exercise on every platform.
//
// `FirstCandidate` is the degenerate source used to pin generation down in
// tests: it always selects the first candidate and never fires a probability
// roll below 1.0.
//
// **Critical constraint: determinism.** The core generator must produce
// identical output given the same prior state, regardless of platform,
// compiler version, or optimization level. Floating point only appears when
// converting finished `u64` values to unit floats.

use serde::{Deserialize, Serialize};

/// The two operations the composer needs from a source of randomness.
///
/// `next_unit` backs the weighted rolls; `pick_index` backs uniform choice
/// among candidates. Implementors must return an index in `[0, len)` for any
/// `len > 0`; for `len == 0` the return value is unspecified and callers
/// must not use it.
pub trait RandomSource {
    /// A uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// A uniform index in `[0, len)`.
    fn pick_index(&mut self, len: usize) -> usize;

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` never fires and `p >= 1.0` always fires.
    fn chance(&mut self, p: f64) -> bool {
        self.next_unit() < p
    }

    /// Pick one element uniformly, or `None` for an empty slice.
    fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T>
    where
        Self: Sized,
    {
        if items.is_empty() {
            return None;
        }
        let idx = self.pick_index(items.len());
        items.get(idx)
    }
}

/// Xoshiro256++ PRNG, the composer's production source of randomness.
///
/// One generation call owns one `EtudeRng`; two generators created from the
/// same seed produce the same exercise.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EtudeRng {
    s: [u64; 4],
}

impl EtudeRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform random integer in `[0, bound)`.
    ///
    /// Rejection sampling avoids modulo bias. Returns 0 when `bound` is 0.
    pub fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        if bound.is_power_of_two() {
            return self.next_u64() & (bound - 1);
        }
        let threshold = bound.wrapping_neg() % bound; // = (2^64 - bound) % bound
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return r % bound;
            }
        }
    }
}

impl RandomSource for EtudeRng {
    fn next_unit(&mut self) -> f64 {
        self.next_f64()
    }

    fn pick_index(&mut self, len: usize) -> usize {
        self.below(len as u64) as usize
    }
}

/// A source that always takes the first candidate.
///
/// `pick_index` returns 0, `next_unit` returns 0.0 and `chance` only fires
/// for `p >= 1.0`. Generation driven by this source is fully deterministic
/// and skips every optional embellishment.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstCandidate;

impl RandomSource for FirstCandidate {
    fn next_unit(&mut self) -> f64 {
        0.0
    }

    fn pick_index(&mut self, _len: usize) -> usize {
        0
    }

    fn chance(&mut self, p: f64) -> bool {
        p >= 1.0
    }
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
