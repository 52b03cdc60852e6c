//! The general fixture engine behind ordinary dummy construction.
//!
//! The engine resolves primitive [`Request`]s. Caller customizations are
//! consulted first, in registration order, then the default customizations
//! installed at setup, and finally the engine's own plain random draws. The
//! first answer wins.
//!
//! Composite construction lives in [`crate::Dummy`] implementations; the
//! engine only contributes primitives, randomness and the
//! [`RecursionPolicy`].

use std::sync::Arc;

use fake::Fake;
use fake::faker::lorem::en::Word;
use rand::distr::Alphanumeric;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::boolean::BooleanGenerator;
use crate::enums::{EnumGenerator, flag_combinations};
use crate::sequence::{NumericRange, SequenceGenerator};
use crate::specimen::{Customization, NumericKind, Request, Specimen};

/// How the engine reacts when a type is requested while it is being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecursionPolicy {
    /// Fail with [`crate::DummyError::RecursiveObjectGraph`].
    Throw,
    /// Leave recursive members empty (`None`, empty collections) so
    /// self-referential types such as trees stay constructible.
    #[default]
    Omit,
}

/// Primitive resolution state shared by every request of a
/// [`crate::Dummies`] context.
pub(crate) struct FixtureEngine {
    customizations: Vec<Arc<dyn Customization>>,
    defaults: Vec<Arc<dyn Customization>>,
    recursion: RecursionPolicy,
    rng: ChaCha8Rng,
}

impl FixtureEngine {
    /// Creates an engine with no customizations at all.
    #[must_use]
    pub fn bare(recursion: RecursionPolicy, rng: ChaCha8Rng) -> Self {
        Self {
            customizations: Vec::new(),
            defaults: Vec::new(),
            recursion,
            rng,
        }
    }

    /// Creates an engine with the sequence, boolean and enum generators
    /// installed as default customizations.
    ///
    /// Each generator receives its own RNG derived from `rng`, so a seeded
    /// engine is reproducible end to end.
    #[must_use]
    pub fn with_defaults(
        sequence_range: NumericRange,
        recursion: RecursionPolicy,
        mut rng: ChaCha8Rng,
    ) -> Self {
        let sequence = SequenceGenerator::with_rng(sequence_range, ChaCha8Rng::from_rng(&mut rng));
        let boolean = BooleanGenerator::with_rng(ChaCha8Rng::from_rng(&mut rng));
        let enums = EnumGenerator::with_rng(ChaCha8Rng::from_rng(&mut rng));

        let mut engine = Self::bare(recursion, rng);
        engine.defaults = vec![Arc::new(sequence), Arc::new(boolean), Arc::new(enums)];
        engine
    }

    /// Adds a customization ahead of the defaults.
    ///
    /// Customizations added earlier keep precedence over later ones.
    pub fn customize(&mut self, customization: Arc<dyn Customization>) {
        self.customizations.push(customization);
    }

    /// Returns the recursion policy fixed at setup.
    #[must_use]
    pub const fn recursion(&self) -> RecursionPolicy {
        self.recursion
    }

    /// Gives access to the engine's own RNG for composite draws.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Resolves `request` to a specimen.
    ///
    /// Returns `None` only for requests that cannot be answered at all, such
    /// as a variant request over zero values.
    pub fn resolve(&mut self, request: &Request) -> Option<Specimen> {
        let customized = self
            .customizations
            .iter()
            .chain(&self.defaults)
            .find_map(|customization| customization.create(request));
        customized.or_else(|| self.draw(request))
    }

    fn draw(&mut self, request: &Request) -> Option<Specimen> {
        let rng = &mut self.rng;
        let specimen = match request {
            Request::Numeric(kind) => draw_numeric(*kind, rng),
            Request::Bool => Specimen::Bool(rng.random()),
            Request::Variant { count } => {
                if *count == 0 {
                    return None;
                }
                Specimen::Variant(rng.random_range(0..*count))
            }
            Request::Flags { flags } => {
                return flag_combinations(flags)
                    .choose(rng)
                    .copied()
                    .map(Specimen::Flags);
            }
            Request::Char => Specimen::Char(char::from(rng.sample(Alphanumeric))),
            Request::Text => {
                let word: String = Word().fake_with_rng(rng);
                let suffix = Uuid::from_u128(rng.random());
                Specimen::Text(format!("{word}{}", suffix.simple()))
            }
        };
        Some(specimen)
    }
}

fn draw_numeric(kind: NumericKind, rng: &mut ChaCha8Rng) -> Specimen {
    match kind {
        NumericKind::I8 => Specimen::I8(rng.random()),
        NumericKind::I16 => Specimen::I16(rng.random()),
        NumericKind::I32 => Specimen::I32(rng.random()),
        NumericKind::I64 => Specimen::I64(rng.random()),
        NumericKind::Isize | NumericKind::Usize => kind.narrow(rng.random()),
        NumericKind::U8 => Specimen::U8(rng.random()),
        NumericKind::U16 => Specimen::U16(rng.random()),
        NumericKind::U32 => Specimen::U32(rng.random()),
        NumericKind::U64 => Specimen::U64(rng.random()),
        NumericKind::F32 => Specimen::F32(rng.random()),
        NumericKind::F64 => Specimen::F64(rng.random()),
        NumericKind::Decimal => Specimen::Decimal(Decimal::from(rng.random::<i32>())),
    }
}

impl std::fmt::Debug for FixtureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureEngine")
            .field("customizations", &self.customizations.len())
            .field("defaults", &self.defaults.len())
            .field("recursion", &self.recursion)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    struct FixedText(&'static str);

    impl Customization for FixedText {
        fn create(&self, request: &Request) -> Option<Specimen> {
            matches!(request, Request::Text).then(|| Specimen::Text(self.0.to_owned()))
        }
    }

    #[fixture]
    fn engine() -> FixtureEngine {
        FixtureEngine::with_defaults(
            NumericRange::new(-5, 5).expect("valid range"),
            RecursionPolicy::Omit,
            ChaCha8Rng::seed_from_u64(11),
        )
    }

    #[rstest]
    fn numeric_requests_go_through_the_sequence(mut engine: FixtureEngine) {
        for _ in 0..50 {
            let Some(Specimen::I32(value)) = engine.resolve(&Request::Numeric(NumericKind::I32))
            else {
                panic!("expected an i32 specimen");
            };
            assert!((-5..5).contains(&value), "{value} outside the sequence range");
        }
    }

    #[rstest]
    fn earlier_customizations_win(mut engine: FixtureEngine) {
        engine.customize(Arc::new(FixedText("first")));
        engine.customize(Arc::new(FixedText("second")));

        assert_eq!(
            engine.resolve(&Request::Text),
            Some(Specimen::Text("first".to_owned()))
        );
    }

    #[rstest]
    fn text_falls_back_to_random_words(mut engine: FixtureEngine) {
        let Some(Specimen::Text(first)) = engine.resolve(&Request::Text) else {
            panic!("expected text");
        };
        let Some(Specimen::Text(second)) = engine.resolve(&Request::Text) else {
            panic!("expected text");
        };
        assert_ne!(first, second);
    }

    #[test]
    fn bare_engine_still_draws_primitives() {
        let mut engine = FixtureEngine::bare(RecursionPolicy::Throw, ChaCha8Rng::seed_from_u64(3));

        assert!(matches!(engine.resolve(&Request::Bool), Some(Specimen::Bool(_))));
        assert!(matches!(
            engine.resolve(&Request::Numeric(NumericKind::U64)),
            Some(Specimen::U64(_))
        ));
        assert!(matches!(
            engine.resolve(&Request::Char),
            Some(Specimen::Char(c)) if c.is_ascii_alphanumeric()
        ));
        assert_eq!(engine.resolve(&Request::Variant { count: 0 }), None);
        assert_eq!(engine.recursion(), RecursionPolicy::Throw);
    }

    #[rstest]
    #[case(NumericKind::Isize)]
    #[case(NumericKind::Usize)]
    fn bare_engine_draws_pointer_width_integers(#[case] kind: NumericKind) {
        let mut engine = FixtureEngine::bare(RecursionPolicy::Omit, ChaCha8Rng::seed_from_u64(5));

        let drawn: Vec<Specimen> = (0..20)
            .filter_map(|_| engine.resolve(&Request::Numeric(kind)))
            .collect();

        assert_eq!(drawn.len(), 20);
        assert!(drawn.iter().all(|specimen| specimen.kind_name() == kind.name()));
        let first = drawn.first().expect("a specimen");
        assert!(drawn.iter().any(|specimen| specimen != first));
    }

    #[test]
    fn recursion_policy_parses_lowercase() {
        let policy: RecursionPolicy = serde_json::from_str("\"throw\"").expect("policy");
        assert_eq!(policy, RecursionPolicy::Throw);
        assert_eq!(RecursionPolicy::default(), RecursionPolicy::Omit);
    }
}
