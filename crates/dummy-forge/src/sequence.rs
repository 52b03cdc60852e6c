//! Bounded unique-sequence generation for numeric primitives.
//!
//! A [`SequenceGenerator`] draws values from a half-open [`NumericRange`]
//! without repeating any of them until every value in the range has been
//! emitted. At that point the record of used values is cleared and a new
//! epoch starts, so uniqueness holds per epoch rather than forever.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::DummyError;
use crate::specimen::{Customization, Request, Specimen};

/// Half-open integer range `[inclusive_lower, exclusive_upper)`.
///
/// # Example
///
/// ```
/// use dummy_forge::NumericRange;
///
/// let range = NumericRange::new(-5, 5).expect("valid range");
/// assert_eq!(range.width(), 10);
/// assert!(NumericRange::new(3, 3).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawNumericRange")]
pub struct NumericRange {
    inclusive_lower: i64,
    exclusive_upper: i64,
}

impl NumericRange {
    /// `[0, 2)`, the range behind [`crate::BooleanGenerator`].
    pub const BINARY: Self = Self {
        inclusive_lower: 0,
        exclusive_upper: 2,
    };

    /// `[1, 256)`, the default range for numeric dummies.
    pub const DEFAULT: Self = Self {
        inclusive_lower: 1,
        exclusive_upper: 256,
    };

    /// Creates a range, rejecting empty or inverted bounds.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::InvalidRange`] when
    /// `inclusive_lower >= exclusive_upper`.
    pub const fn new(inclusive_lower: i64, exclusive_upper: i64) -> Result<Self, DummyError> {
        if inclusive_lower >= exclusive_upper {
            return Err(DummyError::InvalidRange {
                inclusive_lower,
                exclusive_upper,
            });
        }
        Ok(Self {
            inclusive_lower,
            exclusive_upper,
        })
    }

    /// Returns the inclusive lower bound.
    #[must_use]
    pub const fn inclusive_lower(&self) -> i64 {
        self.inclusive_lower
    }

    /// Returns the exclusive upper bound.
    #[must_use]
    pub const fn exclusive_upper(&self) -> i64 {
        self.exclusive_upper
    }

    /// Number of distinct values in the range.
    #[must_use]
    pub const fn width(&self) -> u64 {
        self.exclusive_upper.abs_diff(self.inclusive_lower)
    }

    /// Returns `true` when `value` lies inside the range.
    #[must_use]
    pub const fn contains(&self, value: i64) -> bool {
        value >= self.inclusive_lower && value < self.exclusive_upper
    }

    /// Maps `offset` (reduced modulo the width) onto the range.
    fn offset_value(&self, draw: u64) -> i64 {
        let offset = draw.checked_rem(self.width()).unwrap_or(0);
        self.inclusive_lower.wrapping_add_unsigned(offset)
    }
}

impl Default for NumericRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNumericRange {
    inclusive_lower: i64,
    exclusive_upper: i64,
}

impl TryFrom<RawNumericRange> for NumericRange {
    type Error = DummyError;

    fn try_from(raw: RawNumericRange) -> Result<Self, Self::Error> {
        Self::new(raw.inclusive_lower, raw.exclusive_upper)
    }
}

#[derive(Debug)]
struct SequenceState {
    used: HashSet<i64>,
    rng: ChaCha8Rng,
}

/// Draws numbers from a range without repeats until the range is exhausted.
///
/// The generator is shared safely between threads; the used-value record is
/// guarded by a mutex.
///
/// # Example
///
/// ```
/// use std::collections::HashSet;
///
/// use dummy_forge::SequenceGenerator;
///
/// let generator = SequenceGenerator::from_bounds(-5, 5).expect("valid range");
/// let drawn: HashSet<i64> = (0..10).map(|_| generator.next_value()).collect();
///
/// assert_eq!(drawn.len(), 10);
/// assert!(drawn.iter().all(|value| (-5..5).contains(value)));
/// ```
#[derive(Debug)]
pub struct SequenceGenerator {
    range: NumericRange,
    state: Mutex<SequenceState>,
}

impl SequenceGenerator {
    /// Creates a generator over `range` seeded from the thread RNG.
    #[must_use]
    pub fn new(range: NumericRange) -> Self {
        Self::with_rng(range, ChaCha8Rng::from_rng(&mut rand::rng()))
    }

    /// Creates a generator with a fixed seed for reproducible draws.
    #[must_use]
    pub fn seeded(range: NumericRange, seed: u64) -> Self {
        Self::with_rng(range, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Creates a generator over `[inclusive_lower, exclusive_upper)`.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::InvalidRange`] when the bounds are empty or
    /// inverted.
    pub fn from_bounds(inclusive_lower: i64, exclusive_upper: i64) -> Result<Self, DummyError> {
        NumericRange::new(inclusive_lower, exclusive_upper).map(Self::new)
    }

    pub(crate) fn with_rng(range: NumericRange, rng: ChaCha8Rng) -> Self {
        Self {
            range,
            state: Mutex::new(SequenceState {
                used: HashSet::new(),
                rng,
            }),
        }
    }

    /// Returns the range this generator draws from.
    #[must_use]
    pub const fn range(&self) -> NumericRange {
        self.range
    }

    /// Draws the next value of the current epoch.
    ///
    /// Candidates already emitted in this epoch are rejected and redrawn.
    /// Once every value of the range has been emitted the record is cleared,
    /// so the following draw may repeat an earlier value.
    #[must_use]
    pub fn next_value(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let SequenceState { used, rng } = &mut *state;

        let mut candidate = self.range.offset_value(rng.random());
        while used.contains(&candidate) {
            candidate = self.range.offset_value(rng.random());
        }
        used.insert(candidate);

        if u64::try_from(used.len()).is_ok_and(|count| count >= self.range.width()) {
            trace!(
                inclusive_lower = self.range.inclusive_lower,
                exclusive_upper = self.range.exclusive_upper,
                "sequence range exhausted; starting a new epoch"
            );
            used.clear();
        }
        candidate
    }

    /// Produces a numeric specimen, or `None` for non-numeric requests.
    ///
    /// The same generator serves every numeric width; narrower targets are
    /// narrowed with [`crate::NumericKind::narrow`].
    #[must_use]
    pub fn create(&self, request: &Request) -> Option<Specimen> {
        match request {
            Request::Numeric(kind) => Some(kind.narrow(self.next_value())),
            _ => None,
        }
    }
}

impl Customization for SequenceGenerator {
    fn create(&self, request: &Request) -> Option<Specimen> {
        Self::create(self, request)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use super::*;
    use crate::specimen::NumericKind;

    #[rstest]
    #[case(0, 0)]
    #[case(5, 4)]
    #[case(i64::MAX, i64::MIN)]
    fn rejects_empty_or_inverted_ranges(#[case] lower: i64, #[case] upper: i64) {
        assert_eq!(
            NumericRange::new(lower, upper),
            Err(DummyError::InvalidRange {
                inclusive_lower: lower,
                exclusive_upper: upper,
            })
        );
    }

    #[test]
    fn full_i64_range_has_maximal_width() {
        let range = NumericRange::new(i64::MIN, i64::MAX).expect("valid range");
        assert_eq!(range.width(), u64::MAX);
    }

    #[rstest]
    #[case(-5, 5)]
    #[case(0, 1)]
    #[case(1, 256)]
    #[case(i64::MAX - 3, i64::MAX)]
    fn one_epoch_yields_pairwise_distinct_values(#[case] lower: i64, #[case] upper: i64) {
        let generator = SequenceGenerator::seeded(
            NumericRange::new(lower, upper).expect("valid range"),
            7,
        );
        let width = usize::try_from(generator.range().width()).expect("small width");

        let drawn: HashSet<i64> = (0..width).map(|_| generator.next_value()).collect();

        assert_eq!(drawn.len(), width);
        assert!(drawn.iter().all(|value| generator.range().contains(*value)));
    }

    #[test]
    fn exhaustion_starts_a_new_epoch() {
        let generator = SequenceGenerator::from_bounds(10, 13).expect("valid range");

        let first: HashSet<i64> = (0..3).map(|_| generator.next_value()).collect();
        let second: HashSet<i64> = (0..3).map(|_| generator.next_value()).collect();

        assert_eq!(first, second, "each epoch covers the whole range");
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let range = NumericRange::new(0, 1_000).expect("valid range");
        let left = SequenceGenerator::seeded(range, 99);
        let right = SequenceGenerator::seeded(range, 99);

        let left_values: Vec<i64> = (0..20).map(|_| left.next_value()).collect();
        let right_values: Vec<i64> = (0..20).map(|_| right.next_value()).collect();

        assert_eq!(left_values, right_values);
    }

    #[rstest]
    #[case(Request::Bool)]
    #[case(Request::Text)]
    #[case(Request::Char)]
    #[case(Request::Variant { count: 3 })]
    fn declines_non_numeric_requests(#[case] request: Request) {
        let generator = SequenceGenerator::from_bounds(0, 10).expect("valid range");
        assert_eq!(generator.create(&request), None);
    }

    #[test]
    fn serves_every_numeric_width() {
        let generator = SequenceGenerator::from_bounds(1, 100).expect("valid range");
        for kind in [NumericKind::U8, NumericKind::I32, NumericKind::F32, NumericKind::Decimal] {
            let specimen = generator
                .create(&Request::Numeric(kind))
                .expect("numeric requests are served");
            assert_eq!(specimen.kind_name(), kind.name());
        }
    }

    #[test]
    fn deserializes_validated_ranges() {
        let range: NumericRange =
            serde_json::from_str(r#"{"inclusiveLower": -2, "exclusiveUpper": 2}"#)
                .expect("valid range JSON");
        assert_eq!(range.width(), 4);

        let inverted =
            serde_json::from_str::<NumericRange>(r#"{"inclusiveLower": 2, "exclusiveUpper": -2}"#);
        assert!(inverted.is_err());
    }
}
