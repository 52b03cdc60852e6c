//! The [`Dummy`] trait and its implementations for standard types.
//!
//! Primitives are resolved through the engine's [`Request`] pipeline, so
//! customizations and the default generators see every one of them.
//! Containers build their elements through [`Scope::create`], which keeps
//! registered creators in play for nested values.
//!
//! Under [`crate::RecursionPolicy::Omit`] an `Option`, `Vec`, set or map
//! whose element would close a recursion cycle comes back empty; this is how
//! tree-shaped types terminate. `Box<T>` has no empty form, so a cycle
//! through a box is absorbed by the nearest enclosing `Option` or collection,
//! and reported as [`DummyError::RecursiveObjectGraph`] when there is none.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::dispatch::Scope;
use crate::enums::{DummyEnum, DummyFlags};
use crate::error::DummyError;
use crate::specimen::{NumericKind, Request, Specimen};

/// Replays the construction of a value, used to produce fresh candidates in
/// a constraint search.
pub type Regenerator<T> = Box<dyn FnMut(&Scope<'_>) -> Result<T, DummyError>>;

/// A type the general engine knows how to build.
///
/// # Example
///
/// ```
/// use dummy_forge::{Dummies, Dummy, DummyError, Scope};
///
/// #[derive(Debug)]
/// struct Person {
///     name: String,
///     age: u8,
///     nickname: Option<String>,
/// }
///
/// impl Dummy for Person {
///     fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
///         Ok(Self {
///             name: scope.create()?,
///             age: scope.create()?,
///             nickname: scope.create()?,
///         })
///     }
/// }
///
/// let person: Person = Dummies::new().create().expect("person");
/// assert!(!person.name.is_empty());
/// assert!(person.nickname.is_some());
/// ```
pub trait Dummy: Sized + 'static {
    /// Builds a value, making nested requests through `scope`.
    ///
    /// # Errors
    ///
    /// Returns whatever nested requests fail with, or
    /// [`DummyError::NotConstructible`] for abstract types.
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError>;

    /// Whether [`Dummy::dummy`] can succeed without a registered creator.
    #[must_use]
    fn constructible() -> bool {
        true
    }

    /// Produces a regenerator for constraint searches seeded with `self`.
    ///
    /// The default asks the scope for a fresh value of the same type.
    /// Types whose construction was parameterised override this to replay
    /// the same parameters.
    fn regenerator(&self) -> Regenerator<Self> {
        Box::new(|scope| scope.create::<Self>())
    }
}

fn unexpected(expected: &str, found: &Specimen) -> DummyError {
    DummyError::UnexpectedSpecimen {
        expected: expected.to_owned(),
        found: found.kind_name().to_owned(),
    }
}

macro_rules! numeric_dummy {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl Dummy for $ty {
                fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
                    match scope.resolve(&Request::Numeric(NumericKind::$kind))? {
                        Specimen::$kind(value) => Ok(value),
                        other => Err(unexpected(NumericKind::$kind.name(), &other)),
                    }
                }
            }
        )+
    };
}

numeric_dummy! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
}

impl Dummy for bool {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        match scope.resolve(&Request::Bool)? {
            Specimen::Bool(value) => Ok(value),
            other => Err(unexpected("bool", &other)),
        }
    }
}

impl Dummy for char {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        match scope.resolve(&Request::Char)? {
            Specimen::Char(value) => Ok(value),
            other => Err(unexpected("char", &other)),
        }
    }
}

impl Dummy for String {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        match scope.resolve(&Request::Text)? {
            Specimen::Text(value) => Ok(value),
            other => Err(unexpected("text", &other)),
        }
    }
}

impl Dummy for Uuid {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        let bytes: [u8; 16] = scope.with_rng(|rng| rng.random());
        Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}

impl Dummy for () {
    fn dummy(_scope: &Scope<'_>) -> Result<Self, DummyError> {
        Ok(())
    }
}

impl<T: Dummy> Dummy for Option<T> {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        scope.create_or_omit()
    }
}

impl<T: Dummy> Dummy for Box<T> {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        scope.create().map(Self::new)
    }
}

/// `collection_size` elements, or none at all once one of them is omitted.
fn elements<T: Dummy>(scope: &Scope<'_>) -> Result<Vec<T>, DummyError> {
    let size = scope.collection_size();
    let mut items = Vec::with_capacity(size);
    for _ in 0..size {
        let Some(item) = scope.create_or_omit()? else {
            return Ok(Vec::new());
        };
        items.push(item);
    }
    Ok(items)
}

impl<T: Dummy> Dummy for Vec<T> {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        elements(scope)
    }
}

impl<T, S> Dummy for HashSet<T, S>
where
    T: Dummy + Eq + Hash,
    S: BuildHasher + Default + 'static,
{
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        elements(scope).map(Self::from_iter)
    }
}

impl<T: Dummy + Ord> Dummy for BTreeSet<T> {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        elements(scope).map(Self::from_iter)
    }
}

impl<K, V, S> Dummy for HashMap<K, V, S>
where
    K: Dummy + Eq + Hash,
    V: Dummy,
    S: BuildHasher + Default + 'static,
{
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        elements::<(K, V)>(scope).map(Self::from_iter)
    }
}

impl<K: Dummy + Ord, V: Dummy> Dummy for BTreeMap<K, V> {
    fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
        elements::<(K, V)>(scope).map(Self::from_iter)
    }
}

macro_rules! tuple_dummy {
    ($($name:ident),+) => {
        impl<$($name: Dummy),+> Dummy for ($($name,)+) {
            fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
                Ok(($(scope.create::<$name>()?,)+))
            }
        }
    };
}

tuple_dummy!(A, B);
tuple_dummy!(A, B, C);
tuple_dummy!(A, B, C, D);

/// Draws one of `E`'s declared values through the engine.
///
/// Backs the [`Dummy`] implementations generated by [`crate::dummy_enum!`].
///
/// # Errors
///
/// Returns [`DummyError::InvalidArgument`] when `E` declares no values.
pub fn enum_dummy<E: DummyEnum>(scope: &Scope<'_>) -> Result<E, DummyError> {
    let count = E::VALUES.len();
    if count == 0 {
        return Err(no_values::<E>());
    }
    match scope.resolve(&Request::Variant { count })? {
        Specimen::Variant(index) => E::VALUES.get(index).copied().ok_or_else(|| {
            DummyError::invalid_argument(
                "variant",
                &format!("index {index} is out of range for {count} values"),
            )
        }),
        other => Err(unexpected("variant", &other)),
    }
}

/// Draws a non-empty combination of `F`'s flags through the engine.
///
/// Backs the [`Dummy`] implementations generated by [`crate::dummy_flags!`].
///
/// # Errors
///
/// Returns [`DummyError::InvalidArgument`] when `F` declares no flags.
pub fn flags_dummy<F: DummyFlags>(scope: &Scope<'_>) -> Result<F, DummyError> {
    if F::FLAGS.is_empty() {
        return Err(no_values::<F>());
    }
    let flags = F::FLAGS.iter().map(|flag| flag.bits()).collect();
    match scope.resolve(&Request::Flags { flags })? {
        Specimen::Flags(bits) => Ok(F::from_bits(bits)),
        other => Err(unexpected("flags", &other)),
    }
}

fn no_values<E>() -> DummyError {
    DummyError::invalid_argument(
        std::any::type_name::<E>(),
        "declares no values to draw from",
    )
}

/// Implements [`DummyEnum`] and [`Dummy`] for a fieldless enum.
///
/// ```
/// use dummy_forge::{Dummies, DummyEnum, dummy_enum};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Colour {
///     Red,
///     Green,
///     Blue,
/// }
///
/// dummy_enum!(Colour { Red, Green, Blue });
///
/// let colour: Colour = Dummies::new().create().expect("colour");
/// assert!(Colour::VALUES.contains(&colour));
/// ```
#[macro_export]
macro_rules! dummy_enum {
    ($name:ident { $($variant:ident),* $(,)? }) => {
        impl $crate::DummyEnum for $name {
            const VALUES: &'static [Self] = &[$($name::$variant),*];
        }

        impl $crate::Dummy for $name {
            fn dummy(scope: &$crate::Scope<'_>) -> ::std::result::Result<Self, $crate::DummyError> {
                $crate::enum_dummy::<Self>(scope)
            }
        }
    };
}

/// Implements [`DummyFlags`] and [`Dummy`] for a newtype over `u64` bits.
///
/// ```
/// use dummy_forge::{Dummies, dummy_flags};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// struct Access(u64);
///
/// impl Access {
///     const READ: Self = Self(0b01);
///     const WRITE: Self = Self(0b10);
/// }
///
/// dummy_flags!(Access { READ, WRITE });
///
/// let access: Access = Dummies::new().create().expect("access");
/// assert!((1..=3).contains(&access.0));
/// ```
#[macro_export]
macro_rules! dummy_flags {
    ($name:ident { $($flag:ident),* $(,)? }) => {
        impl $crate::DummyFlags for $name {
            const FLAGS: &'static [Self] = &[$($name::$flag),*];

            fn bits(self) -> u64 {
                self.0
            }

            fn from_bits(bits: u64) -> Self {
                Self(bits)
            }
        }

        impl $crate::Dummy for $name {
            fn dummy(scope: &$crate::Scope<'_>) -> ::std::result::Result<Self, $crate::DummyError> {
                $crate::flags_dummy::<Self>(scope)
            }
        }
    };
}

/// Implements [`Dummy`] for types the engine must never build on its own,
/// such as trait objects.
///
/// Such types report themselves as not constructible and can only be
/// created through a registered creator, typically installed with
/// [`crate::Dummies::use_random_implementation`].
#[macro_export]
macro_rules! abstract_dummy {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Dummy for $ty {
                fn dummy(
                    _scope: &$crate::Scope<'_>,
                ) -> ::std::result::Result<Self, $crate::DummyError> {
                    ::std::result::Result::Err($crate::DummyError::NotConstructible {
                        type_name: ::std::any::type_name::<Self>().to_owned(),
                    })
                }

                fn constructible() -> bool {
                    false
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::{Dummies, DummiesConfig, RecursionPolicy};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Weekday {
        Monday,
        Tuesday,
        Wednesday,
    }

    dummy_enum!(Weekday { Monday, Tuesday, Wednesday });

    #[derive(Debug, Clone, Copy)]
    enum Empty {}

    dummy_enum!(Empty {});

    #[derive(Debug)]
    struct Node {
        label: u32,
        children: Vec<Node>,
        parent: Option<Box<Node>>,
    }

    impl Dummy for Node {
        fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
            Ok(Self {
                label: scope.create()?,
                children: scope.create()?,
                parent: scope.create()?,
            })
        }
    }

    #[fixture]
    fn dummies() -> Dummies {
        Dummies::with_config(&DummiesConfig::default().with_seed(5))
    }

    #[rstest]
    fn integers_come_from_the_default_sequence(dummies: Dummies) {
        let values: HashSet<u32> = (0..255)
            .map(|_| dummies.create::<u32>().expect("u32"))
            .collect();

        assert_eq!(values.len(), 255, "one epoch of [1, 256) without repeats");
        assert!(values.iter().all(|value| (1..256).contains(value)));
    }

    #[rstest]
    fn strings_are_distinct_and_non_empty(dummies: Dummies) {
        let left: String = dummies.create().expect("string");
        let right: String = dummies.create().expect("string");

        assert!(!left.is_empty());
        assert_ne!(left, right);
    }

    #[rstest]
    fn collections_use_the_configured_size(dummies: Dummies) {
        let values: Vec<u8> = dummies.create().expect("vec");
        let pairs: HashMap<u16, String> = dummies.create().expect("map");

        assert_eq!(values.len(), 3);
        assert_eq!(pairs.len(), 3);
    }

    #[rstest]
    fn enum_values_are_drawn_from_declarations(dummies: Dummies) {
        let drawn: HashSet<Weekday> = (0..100)
            .map(|_| dummies.create::<Weekday>().expect("weekday"))
            .collect();
        assert_eq!(drawn.len(), Weekday::VALUES.len());
    }

    #[rstest]
    fn enums_without_values_are_rejected(dummies: Dummies) {
        assert!(matches!(
            dummies.create::<Empty>(),
            Err(DummyError::InvalidArgument { .. })
        ));
    }

    #[rstest]
    fn omitted_recursion_yields_a_finite_tree(dummies: Dummies) {
        let node: Node = dummies.create().expect("tree");

        assert!(node.children.is_empty());
        assert!(node.parent.is_none());
    }

    #[test]
    fn throwing_recursion_reports_the_cycle() {
        let dummies = Dummies::with_config(
            &DummiesConfig::default().with_recursion(RecursionPolicy::Throw),
        );

        assert!(matches!(
            dummies.create::<Node>(),
            Err(DummyError::RecursiveObjectGraph { .. })
        ));
    }

    #[rstest]
    fn uuids_are_version_four(dummies: Dummies) {
        let id: Uuid = dummies.create().expect("uuid");
        assert_eq!(id.get_version_num(), 4);
    }

    #[rstest]
    fn tuples_build_each_member(dummies: Dummies) {
        let (_, letter, amount): (bool, char, Decimal) = dummies.create().expect("tuple");
        assert!(letter.is_ascii_alphanumeric());
        assert!(amount >= Decimal::ONE);
    }

    #[test]
    fn wrong_specimen_kind_is_reported() {
        struct Liar;
        impl crate::Customization for Liar {
            fn create(&self, request: &Request) -> Option<Specimen> {
                matches!(request, Request::Bool).then(|| Specimen::Text("yes".to_owned()))
            }
        }

        let dummies = Dummies::new();
        dummies.customize(Liar);

        assert_eq!(
            dummies.create::<bool>(),
            Err(DummyError::UnexpectedSpecimen {
                expected: "bool".to_owned(),
                found: "text".to_owned(),
            })
        );
    }
}
