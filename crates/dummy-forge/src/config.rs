//! Configuration for a [`crate::Dummies`] context.
//!
//! Settings can be built in code or loaded from a versioned JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "sequence": { "inclusiveLower": 1, "exclusiveUpper": 256 },
//!   "collectionSize": 3,
//!   "maxAttempts": 100,
//!   "recursion": "omit",
//!   "createWith": "values",
//!   "seed": 42
//! }
//! ```
//!
//! Every field except `version` is optional and falls back to the default.

use std::num::NonZeroUsize;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs::Dir};
use serde::{Deserialize, Serialize};

use crate::collection::CreateWith;
use crate::constraint::DEFAULT_MAX_ATTEMPTS;
use crate::engine::RecursionPolicy;
use crate::error::{ConfigError, DummyError};
use crate::sequence::NumericRange;

const SUPPORTED_VERSION: u32 = 1;
const DEFAULT_COLLECTION_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(2);

/// Settings fixed when a [`crate::Dummies`] context is created.
///
/// # Example
///
/// ```
/// use dummy_forge::{DummiesConfig, RecursionPolicy};
///
/// let config = DummiesConfig::from_json(r#"{"version": 1, "recursion": "throw", "seed": 7}"#)
///     .expect("valid config");
///
/// assert_eq!(config.recursion(), RecursionPolicy::Throw);
/// assert_eq!(config.seed(), Some(7));
/// assert_eq!(config.collection_size(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummiesConfig {
    sequence_range: NumericRange,
    collection_size: NonZeroUsize,
    max_attempts: i32,
    recursion: RecursionPolicy,
    create_with: CreateWith,
    seed: Option<u64>,
}

impl Default for DummiesConfig {
    fn default() -> Self {
        Self {
            sequence_range: NumericRange::DEFAULT,
            collection_size: DEFAULT_COLLECTION_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            recursion: RecursionPolicy::default(),
            create_with: CreateWith::default(),
            seed: None,
        }
    }
}

impl DummiesConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - The JSON is malformed
    /// - The version is unsupported
    /// - The sequence range is empty or inverted
    /// - The collection size is zero
    /// - The create-with policy is not recognised
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawDummiesConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })?;

        Self::from_raw(raw)
    }

    /// Loads a configuration document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let io_error = |message: String| ConfigError::IoError {
            path: path.as_std_path().to_path_buf(),
            message,
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| io_error("config path must be a file".to_owned()))?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority())
            .map_err(|e| io_error(e.to_string()))?;
        let contents = dir
            .read_to_string(file_name)
            .map_err(|e| io_error(e.to_string()))?;

        Self::from_json(&contents)
    }

    /// Serialises the configuration as a versioned JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if serialisation fails.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(&RawDummiesConfig::from(*self)).map_err(|e| {
            ConfigError::ParseError {
                message: e.to_string(),
            }
        })
    }

    fn from_raw(raw: RawDummiesConfig) -> Result<Self, ConfigError> {
        if raw.version != SUPPORTED_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                expected: SUPPORTED_VERSION,
                actual: raw.version,
            });
        }

        let defaults = Self::default();
        let sequence_range = raw
            .sequence
            .map(|range| NumericRange::new(range.inclusive_lower, range.exclusive_upper))
            .transpose()?
            .unwrap_or(defaults.sequence_range);
        let collection_size = raw
            .collection_size
            .map_or(Ok(defaults.collection_size), |size| {
                NonZeroUsize::new(size).ok_or_else(|| {
                    DummyError::invalid_argument(
                        "collectionSize",
                        "collections need at least one element",
                    )
                })
            })?;
        let create_with = raw
            .create_with
            .as_deref()
            .map(str::parse)
            .transpose()?
            .unwrap_or(defaults.create_with);

        Ok(Self {
            sequence_range,
            collection_size,
            max_attempts: raw.max_attempts.unwrap_or(defaults.max_attempts),
            recursion: raw.recursion.unwrap_or(defaults.recursion),
            create_with,
            seed: raw.seed,
        })
    }

    /// Replaces the numeric sequence range.
    #[must_use]
    pub const fn with_sequence_range(mut self, range: NumericRange) -> Self {
        self.sequence_range = range;
        self
    }

    /// Replaces the default collection size.
    ///
    /// The size is non-zero for the same reason `collectionSize` must be
    /// positive in a configuration document.
    #[must_use]
    pub const fn with_collection_size(mut self, size: NonZeroUsize) -> Self {
        self.collection_size = size;
        self
    }

    /// Replaces the default constraint attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Replaces the recursion policy.
    #[must_use]
    pub const fn with_recursion(mut self, recursion: RecursionPolicy) -> Self {
        self.recursion = recursion;
        self
    }

    /// Replaces the default create-with policy for untagged collections.
    #[must_use]
    pub const fn with_create_with(mut self, create_with: CreateWith) -> Self {
        self.create_with = create_with;
        self
    }

    /// Seeds every generator for reproducible single-threaded runs.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Range numeric dummies are drawn from.
    #[must_use]
    pub const fn sequence_range(&self) -> NumericRange {
        self.sequence_range
    }

    /// Default collection size.
    #[must_use]
    pub const fn collection_size(&self) -> usize {
        self.collection_size.get()
    }

    /// Default constraint attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    /// Recursion policy.
    #[must_use]
    pub const fn recursion(&self) -> RecursionPolicy {
        self.recursion
    }

    /// Default create-with policy.
    #[must_use]
    pub const fn create_with(&self) -> CreateWith {
        self.create_with
    }

    /// Master seed, if any.
    #[must_use]
    pub const fn seed(&self) -> Option<u64> {
        self.seed
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDummiesConfig {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<RawSequence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_attempts: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recursion: Option<RecursionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    create_with: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSequence {
    inclusive_lower: i64,
    exclusive_upper: i64,
}

impl From<DummiesConfig> for RawDummiesConfig {
    fn from(config: DummiesConfig) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            sequence: Some(RawSequence {
                inclusive_lower: config.sequence_range.inclusive_lower(),
                exclusive_upper: config.sequence_range.exclusive_upper(),
            }),
            collection_size: Some(config.collection_size.get()),
            max_attempts: Some(config.max_attempts),
            recursion: Some(config.recursion),
            create_with: Some(config.create_with.as_str().to_owned()),
            seed: config.seed,
        }
    }
}
