//! Enum and bit-flag generation.
//!
//! Rust enums carry no runtime list of their values, so types opt in by
//! declaring one: plain enums implement [`DummyEnum`] and flag sets
//! implement [`DummyFlags`]. The [`crate::dummy_enum!`] and
//! [`crate::dummy_flags!`] macros do both that and the [`crate::Dummy`]
//! wiring in one line.
//!
//! Draws carry no uniqueness tracking: the same value may come up twice in a
//! row.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::specimen::{Customization, Request, Specimen};

/// A fieldless enum whose values can be drawn at random.
pub trait DummyEnum: Copy + 'static {
    /// Every declared value, in declaration order.
    const VALUES: &'static [Self];
}

/// A bit-flag type whose combinations can be drawn at random.
pub trait DummyFlags: Copy + 'static {
    /// The individual flags.
    const FLAGS: &'static [Self];

    /// Raw bits of this value.
    fn bits(self) -> u64;

    /// Rebuilds a value from raw bits produced by OR-ing flags.
    fn from_bits(bits: u64) -> Self;
}

#[derive(Debug)]
struct EnumState {
    rng: ChaCha8Rng,
    composites: HashMap<Vec<u64>, Vec<u64>>,
}

/// Draws enum values and flag combinations uniformly.
///
/// For flag requests every non-empty subset of the individual flags is
/// OR-ed into a composite value and duplicates are removed, so combinations
/// are as likely to come up as single flags. The composite table is cached
/// per flag set.
#[derive(Debug)]
pub struct EnumGenerator {
    state: Mutex<EnumState>,
}

impl EnumGenerator {
    /// Creates a generator seeded from the thread RNG.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(ChaCha8Rng::from_rng(&mut rand::rng()))
    }

    pub(crate) fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            state: Mutex::new(EnumState {
                rng,
                composites: HashMap::new(),
            }),
        }
    }

    /// Draws one of `E`'s declared values, or `None` if it declares none.
    ///
    /// # Example
    ///
    /// ```
    /// use dummy_forge::{DummyEnum, EnumGenerator};
    ///
    /// #[derive(Debug, Clone, Copy, PartialEq)]
    /// enum Suit { Hearts, Spades }
    ///
    /// impl DummyEnum for Suit {
    ///     const VALUES: &'static [Self] = &[Self::Hearts, Self::Spades];
    /// }
    ///
    /// let suit = EnumGenerator::new().pick::<Suit>().expect("suit");
    /// assert!(Suit::VALUES.contains(&suit));
    /// ```
    #[must_use]
    pub fn pick<E: DummyEnum>(&self) -> Option<E> {
        let index = self.variant_index(E::VALUES.len())?;
        E::VALUES.get(index).copied()
    }

    /// Draws a non-empty combination of `F`'s flags, or `None` if it
    /// declares none.
    #[must_use]
    pub fn pick_flags<F: DummyFlags>(&self) -> Option<F> {
        let flags: Vec<u64> = F::FLAGS.iter().map(|flag| flag.bits()).collect();
        self.composite(&flags).map(F::from_bits)
    }

    fn variant_index(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Some(state.rng.random_range(0..count))
    }

    fn composite(&self, flags: &[u64]) -> Option<u64> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let EnumState { rng, composites } = &mut *state;
        let table = composites
            .entry(flags.to_vec())
            .or_insert_with(|| flag_combinations(flags));
        table.choose(rng).copied()
    }

    /// Answers variant and flag requests; declines everything else.
    #[must_use]
    pub fn create(&self, request: &Request) -> Option<Specimen> {
        match request {
            Request::Variant { count } => self.variant_index(*count).map(Specimen::Variant),
            Request::Flags { flags } => self.composite(flags).map(Specimen::Flags),
            _ => None,
        }
    }
}

impl Default for EnumGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Customization for EnumGenerator {
    fn create(&self, request: &Request) -> Option<Specimen> {
        Self::create(self, request)
    }
}

/// Every distinct OR of a non-empty subset of `flags`, in ascending order.
pub(crate) fn flag_combinations(flags: &[u64]) -> Vec<u64> {
    let mut composites = BTreeSet::new();
    for flag in flags {
        let extended: Vec<u64> = composites.iter().map(|bits| bits | flag).collect();
        composites.insert(*flag);
        composites.extend(extended);
    }
    composites.into_iter().collect()
}
