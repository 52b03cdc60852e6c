//! Error types for the dummy-forge crate.
//!
//! Generation failures are reported through [`DummyError`]; loading a
//! [`crate::DummiesConfig`] from JSON reports [`ConfigError`]. Both follow the
//! semantic-enum conventions used across the workspace with `thiserror`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while generating dummies or registering creators.
///
/// Every variant is raised synchronously where it is detected and propagates
/// unchanged to the caller. Nothing is retried except inside the bounded
/// loop of [`crate::ConstraintRequest::satisfy`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DummyError {
    /// A required argument was missing or unusable.
    #[error("invalid argument '{argument}': {reason}")]
    InvalidArgument {
        /// Name of the offending argument.
        argument: String,
        /// Why the argument was rejected.
        reason: String,
    },

    /// A numeric range with `inclusive_lower >= exclusive_upper`.
    #[error("invalid range: inclusive lower bound {inclusive_lower} must be below exclusive upper bound {exclusive_upper}")]
    InvalidRange {
        /// Requested inclusive lower bound.
        inclusive_lower: i64,
        /// Requested exclusive upper bound.
        exclusive_upper: i64,
    },

    /// The retry budget ran out before the predicate held.
    #[error("could not produce a {type_name} satisfying the constraint after {attempts} attempts")]
    ConstraintUnsatisfiable {
        /// Type that was being constrained.
        type_name: String,
        /// Number of predicate evaluations performed.
        attempts: u64,
    },

    /// The random-implementation helper was given no concrete candidates.
    #[error("no concrete implementation registered for {base}")]
    NoConcreteSubclass {
        /// Base type the helper was asked to cover.
        base: String,
    },

    /// A create-with policy name outside the recognised set.
    #[error("unsupported create-with policy: {policy}")]
    UnsupportedCreateWithPolicy {
        /// The unrecognised policy value.
        policy: String,
    },

    /// The general engine cannot build the type and no creator is registered.
    #[error("{type_name} is not constructible without a registered creator")]
    NotConstructible {
        /// The abstract type that was requested.
        type_name: String,
    },

    /// The type was requested again while it was still being built.
    #[error("recursive object graph detected while building {type_name}")]
    RecursiveObjectGraph {
        /// The type that closed the cycle.
        type_name: String,
    },

    /// A customization answered a request with the wrong kind of specimen.
    #[error("expected a {expected} specimen but a customization produced {found}")]
    UnexpectedSpecimen {
        /// Specimen kind the request asked for.
        expected: String,
        /// Specimen kind that was produced.
        found: String,
    },
}

impl DummyError {
    pub(crate) fn invalid_argument(argument: &str, reason: &str) -> Self {
        Self::InvalidArgument {
            argument: argument.to_owned(),
            reason: reason.to_owned(),
        }
    }

    pub(crate) fn unsatisfiable<T: ?Sized>(attempts: u64) -> Self {
        Self::ConstraintUnsatisfiable {
            type_name: std::any::type_name::<T>().to_owned(),
            attempts,
        }
    }

    pub(crate) fn not_constructible<T: ?Sized>() -> Self {
        Self::NotConstructible {
            type_name: std::any::type_name::<T>().to_owned(),
        }
    }

    pub(crate) fn recursive<T: ?Sized>() -> Self {
        Self::RecursiveObjectGraph {
            type_name: std::any::type_name::<T>().to_owned(),
        }
    }
}

/// Errors that can occur when loading a [`crate::DummiesConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file at '{path}': {message}")]
    IoError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// The configuration JSON is malformed.
    #[error("invalid config JSON: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },

    /// The configuration version is not supported.
    #[error("unsupported config version: expected {expected}, found {actual}")]
    UnsupportedVersion {
        /// Expected version number.
        expected: u32,
        /// Actual version found in the document.
        actual: u32,
    },

    /// A value in the document failed validation.
    #[error(transparent)]
    Invalid(#[from] DummyError),
}
