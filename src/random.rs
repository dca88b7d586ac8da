//! Seedable random source with capturable state.
//!
//! A [`RandomSource`] runs ChaCha12, the generator behind `rand`'s `StdRng`.
//! Its state is the seed plus the stream position in 32-bit words, so a
//! restored source jumps straight to where the captured one left off.

use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use rand::{rngs::OsRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::{Error, Result};

/// Size in bytes of [`RandomSource::state`].
pub const STATE_SIZE: usize = SEED_SIZE + 16;

const SEED_SIZE: usize = 32;

pub struct RandomSource {
    rng: ChaCha12Rng,
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource {
    /// A source seeded with 1, so fresh sources produce the same stream.
    pub fn new() -> Self {
        Self::from_seed(seed_of(1))
    }

    fn from_seed(seed: [u8; SEED_SIZE]) -> Self {
        Self {
            rng: ChaCha12Rng::from_seed(seed),
        }
    }

    /// Reseed from the operating system.
    pub fn randomize(&mut self) {
        let mut seed = [0u8; SEED_SIZE];

        OsRng.fill_bytes(&mut seed);

        *self = Self::from_seed(seed);
    }

    /// Reseed deterministically from `seed`.
    pub fn pseudo_randomize(&mut self, seed: i64) {
        *self = Self::from_seed(seed_of(seed));
    }

    /// Uniform integer in `[0, bound)`.
    pub fn integer(&mut self, bound: i64) -> Result<i64> {
        if bound <= 0 {
            return Err(Error::InvalidBound(format!("{} is not positive", bound)));
        }

        Ok(self.rng.gen_range(0..bound))
    }

    /// Uniform integer in `[0, bound)` for a multi-word bound.
    ///
    /// `limbs` is the magnitude of the bound as little-endian 32-bit words.
    /// Every word below the top one is drawn directly; the top word is drawn
    /// over the top word of the bound, and the draw repeats if the result is
    /// not below the bound. The result is returned without leading zero words.
    pub fn big_integer(&mut self, negative: bool, limbs: &[u32]) -> Result<Vec<u32>> {
        let len = limbs.iter().rposition(|l| *l != 0).map_or(0, |top| top + 1);

        if len == 0 || negative {
            return Err(Error::InvalidBound(
                "bound must be a positive integer".to_owned(),
            ));
        }

        let bound = &limbs[..len];

        let top = bound[len - 1];

        let mut value = vec![0u32; len];

        loop {
            for limb in value.iter_mut().take(len - 1) {
                *limb = self.rng.next_u32();
            }

            value[len - 1] = self.rng.gen_range(0..=top);

            if less_than(&value, bound) {
                break;
            }
        }

        while value.last() == Some(&0) {
            value.pop();
        }

        Ok(value)
    }

    /// Uniform float in `[0, 1)`.
    pub fn real(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Capture the current state, [`STATE_SIZE`] bytes.
    pub fn state(&self) -> Vec<u8> {
        let mut state = Vec::with_capacity(STATE_SIZE);

        state.extend_from_slice(&self.rng.get_seed());
        state.extend_from_slice(&self.rng.get_word_pos().to_le_bytes());

        state
    }

    /// Restore a state captured by [`state`](Self::state).
    pub fn set_state(&mut self, state: &[u8]) -> Result<()> {
        if state.len() != STATE_SIZE {
            return Err(Error::NotSupported(format!(
                "random state must be {} bytes, got {}",
                STATE_SIZE,
                state.len()
            )));
        }

        let mut seed = [0u8; SEED_SIZE];
        seed.copy_from_slice(&state[..SEED_SIZE]);

        let mut word_pos = [0u8; 16];
        word_pos.copy_from_slice(&state[SEED_SIZE..]);

        let word_pos = u128::from_le_bytes(word_pos);

        log::trace!("restore random state at word {}", word_pos);

        let mut rng = ChaCha12Rng::from_seed(seed);

        rng.set_word_pos(word_pos);

        self.rng = rng;

        Ok(())
    }
}

fn seed_of(seed: i64) -> [u8; SEED_SIZE] {
    let mut bytes = [0u8; SEED_SIZE];

    bytes[..8].copy_from_slice(&seed.to_le_bytes());

    bytes
}

fn less_than(value: &[u32], bound: &[u32]) -> bool {
    for (v, b) in value.iter().rev().zip(bound.iter().rev()) {
        if v != b {
            return v < b;
        }
    }

    false
}

static DEFAULT_SOURCE: Lazy<Mutex<RandomSource>> = Lazy::new(|| {
    let mut source = RandomSource::new();

    source.randomize();

    Mutex::new(source)
});

/// Run `f` against the process-wide source, randomized on first use.
pub fn with_default_source<R, F: FnOnce(&mut RandomSource) -> R>(f: F) -> R {
    let mut source = DEFAULT_SOURCE.lock().unwrap_or_else(PoisonError::into_inner);

    f(&mut source)
}

/// [`RandomSource::integer`] on the default source.
pub fn random_integer(bound: i64) -> Result<i64> {
    with_default_source(|source| source.integer(bound))
}

/// [`RandomSource::real`] on the default source.
pub fn random_real() -> f64 {
    with_default_source(|source| source.real())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sources_agree() {
        let mut a = RandomSource::new();
        let mut b = RandomSource::new();

        for _ in 0..16 {
            assert_eq!(a.integer(1000).unwrap(), b.integer(1000).unwrap());
        }
    }

    #[test]
    fn integer_in_range() {
        let mut source = RandomSource::new();

        for _ in 0..1000 {
            let n = source.integer(7).unwrap();
            assert!((0..7).contains(&n));
        }

        assert_eq!(source.integer(1).unwrap(), 0);
        assert!(matches!(source.integer(0), Err(Error::InvalidBound(_))));
        assert!(matches!(source.integer(-3), Err(Error::InvalidBound(_))));
    }

    #[test]
    fn big_integer_below_bound() {
        let mut source = RandomSource::new();

        // 2^32 * 3 + 5
        let bound = [5u32, 3];

        for _ in 0..1000 {
            let value = source.big_integer(false, &bound).unwrap();

            assert!(value.len() <= 2);

            let as_u64 = value
                .iter()
                .rev()
                .fold(0u64, |acc, limb| (acc << 32) | *limb as u64);

            assert!(as_u64 < (3u64 << 32) + 5);
        }

        // Leading zero words in the bound are ignored.
        let value = source.big_integer(false, &[9, 0, 0]).unwrap();
        assert!(value.len() <= 1 && value.first().copied().unwrap_or(0) < 9);

        assert!(matches!(
            source.big_integer(false, &[0, 0]),
            Err(Error::InvalidBound(_))
        ));
        assert!(matches!(
            source.big_integer(true, &[1, 1]),
            Err(Error::InvalidBound(_))
        ));
    }

    #[test]
    fn real_in_unit_interval() {
        let mut source = RandomSource::new();

        for _ in 0..1000 {
            let x = source.real();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn state_round_trip_resumes_stream() {
        let mut source = RandomSource::new();

        source.pseudo_randomize(42);

        source.integer(100).unwrap();
        source.real();

        let state = source.state();

        assert_eq!(state.len(), STATE_SIZE);

        let expected: Vec<i64> = (0..8).map(|_| source.integer(1 << 40).unwrap()).collect();

        let mut restored = RandomSource::new();

        restored.set_state(&state).unwrap();

        let replayed: Vec<i64> = (0..8).map(|_| restored.integer(1 << 40).unwrap()).collect();

        assert_eq!(expected, replayed);

        assert!(matches!(
            restored.set_state(&state[..10]),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn set_state_jumps_to_any_position() {
        let mut state = RandomSource::new().state();

        state[SEED_SIZE..].copy_from_slice(&u128::from(u64::MAX).to_le_bytes());

        let mut source = RandomSource::new();

        source.set_state(&state).unwrap();

        assert!((0..10).contains(&source.integer(10).unwrap()));

        // Position survives a capture after the jump.
        let mut again = RandomSource::new();

        again.set_state(&source.state()).unwrap();

        assert_eq!(source.integer(1 << 40).unwrap(), again.integer(1 << 40).unwrap());
    }

    #[test]
    fn default_source() {
        assert!((0..10).contains(&random_integer(10).unwrap()));
        assert!((0.0..1.0).contains(&random_real()));
    }
}
