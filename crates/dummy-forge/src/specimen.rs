//! Low-level specimen requests exchanged with engine customizations.
//!
//! The general engine never asks a customization for a Rust type directly.
//! It describes the primitive it needs as a [`Request`] and expects a
//! [`Specimen`] of the matching shape back. Customizations answer `None`
//! when a request is not theirs so the engine can fall through to the next
//! one.

use std::fmt;

use rust_decimal::Decimal;

/// Numeric primitive widths understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `isize`
    Isize,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `usize`
    Usize,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// [`Decimal`]
    Decimal,
}

impl NumericKind {
    /// Rust name of the primitive this kind stands for.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Isize => "isize",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "decimal",
        }
    }

    /// Narrows a wide draw into a specimen of this kind.
    ///
    /// Integer targets keep the low bits of the two's-complement
    /// representation, so a value outside the target range wraps around
    /// (`300` as [`NumericKind::U8`] is `44`, `200` as [`NumericKind::I8`]
    /// is `-56`). Floating-point and decimal targets convert the value,
    /// rounding to the nearest representable float where needed.
    ///
    /// # Example
    ///
    /// ```
    /// use dummy_forge::{NumericKind, Specimen};
    ///
    /// assert_eq!(NumericKind::U8.narrow(300), Specimen::U8(44));
    /// assert_eq!(NumericKind::I8.narrow(200), Specimen::I8(-56));
    /// assert_eq!(NumericKind::I64.narrow(-5), Specimen::I64(-5));
    /// ```
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "wraparound narrowing is the documented policy for sequence values"
    )]
    pub fn narrow(self, value: i64) -> Specimen {
        match self {
            Self::I8 => Specimen::I8(value as i8),
            Self::I16 => Specimen::I16(value as i16),
            Self::I32 => Specimen::I32(value as i32),
            Self::I64 => Specimen::I64(value),
            Self::Isize => Specimen::Isize(value as isize),
            Self::U8 => Specimen::U8(value as u8),
            Self::U16 => Specimen::U16(value as u16),
            Self::U32 => Specimen::U32(value as u32),
            Self::U64 => Specimen::U64(value as u64),
            Self::Usize => Specimen::Usize(value as usize),
            Self::F32 => Specimen::F32(value as f32),
            Self::F64 => Specimen::F64(value as f64),
            Self::Decimal => Specimen::Decimal(Decimal::from(value)),
        }
    }
}

/// A primitive request issued by the general engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// A number of the given width.
    Numeric(NumericKind),
    /// A boolean.
    Bool,
    /// An index into an enum's declared values.
    Variant {
        /// Number of declared values; always non-zero.
        count: usize,
    },
    /// A non-empty combination of the given flag bits.
    Flags {
        /// Bits of the individual flags.
        flags: Vec<u64>,
    },
    /// A single character.
    Char,
    /// A string.
    Text,
}

/// A primitive value answering a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Specimen {
    /// An `i8`.
    I8(i8),
    /// An `i16`.
    I16(i16),
    /// An `i32`.
    I32(i32),
    /// An `i64`.
    I64(i64),
    /// An `isize`.
    Isize(isize),
    /// A `u8`.
    U8(u8),
    /// A `u16`.
    U16(u16),
    /// A `u32`.
    U32(u32),
    /// A `u64`.
    U64(u64),
    /// A `usize`.
    Usize(usize),
    /// An `f32`.
    F32(f32),
    /// An `f64`.
    F64(f64),
    /// A [`Decimal`].
    Decimal(Decimal),
    /// A boolean.
    Bool(bool),
    /// An enum value index.
    Variant(usize),
    /// A composite flag value.
    Flags(u64),
    /// A character.
    Char(char),
    /// A string.
    Text(String),
}

impl Specimen {
    /// Short name of the specimen's shape, used in diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::Isize(_) => "isize",
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::Usize(_) => "usize",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Decimal(_) => "decimal",
            Self::Bool(_) => "bool",
            Self::Variant(_) => "variant",
            Self::Flags(_) => "flags",
            Self::Char(_) => "char",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(kind) => f.write_str(kind.name()),
            Self::Bool => f.write_str("bool"),
            Self::Variant { .. } => f.write_str("variant"),
            Self::Flags { .. } => f.write_str("flags"),
            Self::Char => f.write_str("char"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// A low-level generation rule consulted by the engine before its defaults.
///
/// Implementations return `None` for requests they do not handle.
pub trait Customization: Send + Sync {
    /// Answers `request`, or declines with `None`.
    fn create(&self, request: &Request) -> Option<Specimen>;
}
