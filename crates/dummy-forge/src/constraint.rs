//! Retry-based constraint satisfaction.
//!
//! A [`ConstraintRequest`] keeps producing candidates until a predicate
//! holds or the attempt budget runs out. The reference value handed to
//! [`ConstraintRequest::satisfy`] is attempt #1; every regenerated candidate
//! is one more attempt.
//!
//! A budget of zero or less means "retry forever". Nothing inside the loop
//! caps it: termination is up to the predicate and the regenerator.

use tracing::{debug, trace};

use crate::error::DummyError;

/// Attempt budget used when the caller does not pick one.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 100;

type Regenerate<'a, T> = Box<dyn FnMut() -> Result<T, DummyError> + 'a>;
type Predicate<'a, T> = Box<dyn FnMut(&T) -> bool + 'a>;

/// One constraint search: how to regenerate, what must hold, how often to
/// try.
///
/// # Example
///
/// ```
/// use dummy_forge::ConstraintRequest;
///
/// let mut next = 0_u32;
/// let even = ConstraintRequest::new(move || {
///     next += 1;
///     Ok(next)
/// })
/// .predicate(|value| value % 2 == 0)
/// .max_attempts(10)
/// .satisfy(Some(1))
/// .expect("an even number turns up");
///
/// assert_eq!(even, 2);
/// ```
pub struct ConstraintRequest<'a, T> {
    regenerate: Regenerate<'a, T>,
    predicate: Option<Predicate<'a, T>>,
    max_attempts: i32,
}

impl<'a, T> ConstraintRequest<'a, T> {
    /// Starts a request that produces fresh candidates with `regenerate`.
    #[must_use]
    pub fn new<R>(regenerate: R) -> Self
    where
        R: FnMut() -> Result<T, DummyError> + 'a,
    {
        Self {
            regenerate: Box::new(regenerate),
            predicate: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets the condition candidates must meet.
    #[must_use]
    pub fn predicate<P>(mut self, predicate: P) -> Self
    where
        P: FnMut(&T) -> bool + 'a,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Sets the attempt budget. Zero or negative means unbounded.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Runs the search.
    ///
    /// A present `reference` that already satisfies the predicate is returned
    /// untouched whatever the budget. An absent reference makes the first
    /// regenerated value attempt #1.
    ///
    /// # Errors
    ///
    /// - [`DummyError::InvalidArgument`] when no predicate was set; nothing
    ///   is generated in that case.
    /// - [`DummyError::ConstraintUnsatisfiable`] once `max_attempts`
    ///   candidates have failed the predicate.
    /// - Any error returned by the regenerator, unchanged.
    pub fn satisfy(self, reference: Option<T>) -> Result<T, DummyError> {
        let Self {
            mut regenerate,
            predicate,
            max_attempts,
        } = self;
        let Some(mut predicate) = predicate else {
            return Err(DummyError::invalid_argument(
                "predicate",
                "a constraint needs a predicate",
            ));
        };

        let limit = attempt_limit(max_attempts);
        if limit.is_none() {
            debug!(
                max_attempts,
                type_name = std::any::type_name::<T>(),
                "unbounded constraint search; termination relies on the predicate"
            );
        }

        let mut candidate = match reference {
            Some(value) => value,
            None => regenerate()?,
        };
        let mut attempts: u64 = 1;
        loop {
            if predicate(&candidate) {
                trace!(attempts, "constraint satisfied");
                return Ok(candidate);
            }
            if limit.is_some_and(|limit| attempts >= limit) {
                debug!(
                    attempts,
                    type_name = std::any::type_name::<T>(),
                    "constraint attempt budget exhausted"
                );
                return Err(DummyError::unsatisfiable::<T>(attempts));
            }
            candidate = regenerate()?;
            attempts = attempts.saturating_add(1);
        }
    }
}

impl<T> std::fmt::Debug for ConstraintRequest<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintRequest")
            .field("has_predicate", &self.predicate.is_some())
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// `Some(limit)` for positive budgets, `None` for unbounded ones.
fn attempt_limit(max_attempts: i32) -> Option<u64> {
    u64::try_from(max_attempts).ok().filter(|limit| *limit > 0)
}
