//! Tagged dummy collections.
//!
//! A [`SomeDummies`] remembers the [`Count`] and [`CreateWith`] it was built
//! with, so a constraint search over a collection regenerates collections of
//! the same shape instead of arbitrary ones.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::dispatch::Scope;
use crate::dummy::{Dummy, Regenerator};
use crate::error::DummyError;

/// How many elements a collection gets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Count {
    /// Exactly this many elements.
    Exactly(usize),
    /// A random length between one and twice the configured collection
    /// size, drawn on every construction.
    #[default]
    Random,
}

/// Which elements of a collection hold values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateWith {
    /// Every element holds a value.
    #[default]
    Values,
    /// At least one element is empty and, for two or more elements, at least
    /// one holds a value. Empty positions are random.
    ValuesAndNones,
    /// Every element is empty.
    Nones,
}

impl CreateWith {
    /// Name used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Values => "values",
            Self::ValuesAndNones => "values-and-nones",
            Self::Nones => "nones",
        }
    }
}

impl fmt::Display for CreateWith {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreateWith {
    type Err = DummyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "values" => Ok(Self::Values),
            "values-and-nones" => Ok(Self::ValuesAndNones),
            "nones" => Ok(Self::Nones),
            other => Err(DummyError::UnsupportedCreateWithPolicy {
                policy: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<u8> for CreateWith {
    type Error = DummyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Values),
            1 => Ok(Self::ValuesAndNones),
            2 => Ok(Self::Nones),
            other => Err(DummyError::UnsupportedCreateWithPolicy {
                policy: other.to_string(),
            }),
        }
    }
}

/// A collection of optional dummies tagged with how it was built.
///
/// # Example
///
/// ```
/// use dummy_forge::{Count, CreateWith, Dummies};
///
/// let dummies = Dummies::new();
/// let mixed = dummies
///     .some_dummies::<u32>(Count::Exactly(4), CreateWith::ValuesAndNones)
///     .expect("collection");
///
/// assert_eq!(mixed.len(), 4);
/// assert!(mixed.items().iter().any(Option::is_none));
/// assert!(mixed.items().iter().any(Option::is_some));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SomeDummies<T> {
    items: Vec<Option<T>>,
    count: Count,
    create_with: CreateWith,
}

impl<T> SomeDummies<T> {
    /// Every element, empty ones included.
    #[must_use]
    pub fn items(&self) -> &[Option<T>] {
        &self.items
    }

    /// Iterates over the elements that hold values.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter().flatten()
    }

    /// Number of elements, empty ones included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the collection has no elements at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The count tag the collection was built with.
    #[must_use]
    pub const fn count(&self) -> Count {
        self.count
    }

    /// The create-with tag the collection was built with.
    #[must_use]
    pub const fn create_with(&self) -> CreateWith {
        self.create_with
    }

    /// Consumes the collection, returning its elements.
    #[must_use]
    pub fn into_items(self) -> Vec<Option<T>> {
        self.items
    }
}

impl<T: Dummy> SomeDummies<T> {
    /// Builds a collection in `scope` honouring both tags.
    ///
    /// A collection whose element type is already being built comes back
    /// empty under the omit recursion policy.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while creating elements.
    pub fn create(
        scope: &Scope<'_>,
        count: Count,
        create_with: CreateWith,
    ) -> Result<Self, DummyError> {
        let empty = Self {
            items: Vec::new(),
            count,
            create_with,
        };
        if scope.omits::<T>() {
            return Ok(empty);
        }

        let len = match count {
            Count::Exactly(exact) => exact,
            Count::Random => {
                let upper = scope.collection_size().saturating_mul(2).max(1);
                scope.with_rng(|rng| rng.random_range(1..=upper))
            }
        };
        let nones = none_mask(scope, len, create_with);

        let mut items = Vec::with_capacity(len);
        for empty_slot in nones {
            if empty_slot {
                items.push(None);
                continue;
            }
            let Some(item) = scope.create_or_omit()? else {
                return Ok(empty);
            };
            items.push(Some(item));
        }
        Ok(Self {
            items,
            count,
            create_with,
        })
    }
}

/// Marks which of `len` positions stay empty.
fn none_mask(scope: &Scope<'_>, len: usize, create_with: CreateWith) -> Vec<bool> {
    match create_with {
        CreateWith::Values => vec![false; len],
        CreateWith::Nones => vec![true; len],
        CreateWith::ValuesAndNones if len < 2 => vec![true; len],
        CreateWith::ValuesAndNones => scope.with_rng(|rng| {
            let none_count = rng.random_range(1..len);
            let mut mask = vec![false; len];
            mask.iter_mut().take(none_count).for_each(|slot| *slot = true);
            mask.shuffle(rng);
            mask
        }),
    }
}

impl<T: Dummy> Dummy for SomeDummies<T> {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        Self::create(scope, Count::Random, scope.create_with())
    }

    fn regenerator(&self) -> Regenerator<Self> {
        let (count, create_with) = (self.count, self.create_with);
        Box::new(move |scope| Self::create(scope, count, create_with))
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{Dummies, DummiesConfig};

    #[fixture]
    fn dummies() -> Dummies {
        Dummies::with_config(&DummiesConfig::default().with_seed(17))
    }

    #[rstest]
    #[case::values("values", CreateWith::Values)]
    #[case::mixed("values-and-nones", CreateWith::ValuesAndNones)]
    #[case::nones("nones", CreateWith::Nones)]
    fn parses_policy_names(#[case] name: &str, #[case] expected: CreateWith) {
        assert_eq!(name.parse::<CreateWith>(), Ok(expected));
        assert_eq!(expected.to_string(), name);
    }

    #[rstest]
    #[case("sometimes")]
    #[case("Values")]
    #[case("")]
    fn rejects_unknown_policy_names(#[case] name: &str) {
        assert_eq!(
            name.parse::<CreateWith>(),
            Err(DummyError::UnsupportedCreateWithPolicy {
                policy: name.to_owned(),
            })
        );
    }

    #[rstest]
    #[case(0, Ok(CreateWith::Values))]
    #[case(2, Ok(CreateWith::Nones))]
    #[case(3, Err(DummyError::UnsupportedCreateWithPolicy { policy: "3".to_owned() }))]
    fn converts_policy_codes(#[case] code: u8, #[case] expected: Result<CreateWith, DummyError>) {
        assert_eq!(CreateWith::try_from(code), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(5)]
    fn exact_counts_are_honoured(dummies: Dummies, #[case] len: usize) {
        let collection = dummies
            .some_dummies::<u8>(Count::Exactly(len), CreateWith::Values)
            .expect("collection");

        assert_eq!(collection.len(), len);
        assert_eq!(collection.values().count(), len);
    }

    #[rstest]
    fn random_counts_stay_within_twice_the_collection_size(dummies: Dummies) {
        for _ in 0..50 {
            let collection = dummies
                .some_dummies::<bool>(Count::Random, CreateWith::Values)
                .expect("collection");
            assert!((1..=6).contains(&collection.len()));
        }
    }

    #[rstest]
    fn nones_are_all_empty(dummies: Dummies) {
        let collection = dummies
            .some_dummies::<String>(Count::Exactly(3), CreateWith::Nones)
            .expect("collection");

        assert!(collection.items().iter().all(Option::is_none));
    }

    #[rstest]
    fn single_element_mixed_collection_is_one_none(dummies: Dummies) {
        let collection = dummies
            .some_dummies::<u16>(Count::Exactly(1), CreateWith::ValuesAndNones)
            .expect("collection");

        assert_eq!(collection.into_items(), vec![None]);
    }

    #[rstest]
    fn mixed_collections_hold_both_kinds(dummies: Dummies) {
        for len in 2..8 {
            let collection = dummies
                .some_dummies::<u16>(Count::Exactly(len), CreateWith::ValuesAndNones)
                .expect("collection");

            let nones = collection.items().iter().filter(|item| item.is_none()).count();
            assert_eq!(collection.len(), len);
            assert!((1..len).contains(&nones), "{nones} nones out of {len}");
        }
    }

    #[rstest]
    fn regenerated_collections_keep_their_tags(dummies: Dummies) {
        let scope = dummies.scope();
        let reference = scope
            .some_dummies::<u32>(Count::Exactly(4), CreateWith::ValuesAndNones)
            .expect("collection");
        let mut regenerate = reference.regenerator();

        for _ in 0..10 {
            let fresh = regenerate(&scope).expect("regenerated collection");
            assert_eq!(fresh.count(), Count::Exactly(4));
            assert_eq!(fresh.create_with(), CreateWith::ValuesAndNones);
            assert_eq!(fresh.len(), 4);
        }
    }
}
