//! Randomised, constraint-aware dummy values for unit tests.
//!
//! Tests often need "some value of this type" without caring which one. This
//! crate produces such values through a general engine, lets tests override
//! construction per type, and can narrow generated values down to ones that
//! satisfy a predicate.
//!
//! # Overview
//!
//! The crate supports:
//!
//! - Numeric dummies that do not repeat until their range is exhausted
//! - Booleans, enums and flag combinations drawn uniformly
//! - Plain and constrained creators per type, where the last registration wins
//! - Constraint searches (`that_is`, `whose`, `that_is_not`) with an exact
//!   attempt budget
//! - Tagged collections that keep their shape across regeneration
//! - Random selection among concrete implementations of a trait object
//! - Versioned JSON configuration with an optional reproducible seed
//!
//! # Example
//!
//! ```
//! use dummy_forge::{Dummies, Dummy, DummyError, Scope};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Order {
//!     id: u32,
//!     quantity: u8,
//! }
//!
//! impl Dummy for Order {
//!     fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
//!         Ok(Self {
//!             id: scope.create()?,
//!             quantity: scope.create()?,
//!         })
//!     }
//! }
//!
//! let dummies = Dummies::new();
//! dummies.register_constrained_creator(|scope| {
//!     let order: Order = scope.create()?;
//!     scope.whose(order, |order| order.quantity, |quantity| *quantity > 10)
//! });
//!
//! let order: Order = dummies.create().expect("order");
//! assert!(order.quantity > 10);
//! ```

mod boolean;
mod collection;
mod config;
mod constraint;
mod dispatch;
mod dummy;
mod engine;
mod enums;
mod error;
mod sequence;
mod specimen;

pub use boolean::BooleanGenerator;
pub use collection::{Count, CreateWith, SomeDummies};
pub use config::DummiesConfig;
pub use constraint::{ConstraintRequest, DEFAULT_MAX_ATTEMPTS};
pub use dispatch::{Dummies, Implementations, Scope};
pub use dummy::{Dummy, Regenerator, enum_dummy, flags_dummy};
pub use engine::RecursionPolicy;
pub use enums::{DummyEnum, DummyFlags, EnumGenerator};
pub use error::{ConfigError, DummyError};
pub use sequence::{NumericRange, SequenceGenerator};
pub use specimen::{Customization, NumericKind, Request, Specimen};
