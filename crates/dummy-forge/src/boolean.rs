//! Boolean generation on top of a two-value sequence.

use rand_chacha::ChaCha8Rng;

use crate::sequence::{NumericRange, SequenceGenerator};
use crate::specimen::{Customization, Request, Specimen};

/// Produces booleans from a `[0, 2)` sequence, so two consecutive draws
/// within an epoch are always `true` and `false` in some order.
///
/// # Example
///
/// ```
/// use dummy_forge::BooleanGenerator;
///
/// let generator = BooleanGenerator::new();
/// let first = generator.next_bool();
/// let second = generator.next_bool();
/// assert_ne!(first, second);
/// ```
#[derive(Debug)]
pub struct BooleanGenerator {
    sequence: SequenceGenerator,
}

impl BooleanGenerator {
    /// Creates a generator seeded from the thread RNG.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sequence: SequenceGenerator::new(NumericRange::BINARY),
        }
    }

    pub(crate) fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            sequence: SequenceGenerator::with_rng(NumericRange::BINARY, rng),
        }
    }

    /// Draws the next boolean; `0` maps to `false` and `1` to `true`.
    #[must_use]
    pub fn next_bool(&self) -> bool {
        self.sequence.next_value() == 1
    }

    /// Produces a boolean specimen, or `None` for any other request.
    #[must_use]
    pub fn create(&self, request: &Request) -> Option<Specimen> {
        matches!(request, Request::Bool).then(|| Specimen::Bool(self.next_bool()))
    }
}

impl Default for BooleanGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Customization for BooleanGenerator {
    fn create(&self, request: &Request) -> Option<Specimen> {
        Self::create(self, request)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::specimen::NumericKind;

    #[test]
    fn each_epoch_yields_both_values() {
        let generator = BooleanGenerator::new();
        for _ in 0..20 {
            let pair = (generator.next_bool(), generator.next_bool());
            assert!(pair == (true, false) || pair == (false, true), "{pair:?}");
        }
    }

    #[rstest]
    #[case(Request::Numeric(NumericKind::U8))]
    #[case(Request::Text)]
    #[case(Request::Variant { count: 2 })]
    fn declines_non_boolean_requests(#[case] request: Request) {
        assert_eq!(BooleanGenerator::new().create(&request), None);
    }

    #[test]
    fn answers_boolean_requests() {
        let specimen = BooleanGenerator::new().create(&Request::Bool);
        assert!(matches!(specimen, Some(Specimen::Bool(_))));
    }
}
