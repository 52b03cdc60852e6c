//! Creator registration and dispatch.
//!
//! [`Dummies`] is the long-lived context: it owns the creator registries and
//! the general engine, both behind mutexes, and is safe to share between
//! threads. Each top-level request runs inside a [`Scope`], the execution
//! context that carries the in-flight markers of constrained creators and
//! the stack of types the engine is currently building.
//!
//! While a creator runs, its scope is also the ambient context of the
//! current thread: a creator that calls back into [`Dummies::create`]
//! instead of using the scope it was handed still joins the running
//! request. Other threads never see that state, so concurrent requests for
//! the same constrained type do not see each other's markers.
//!
//! Dispatch for `T`:
//!
//! 1. a constrained creator for `T`, unless `T` is already in flight in
//!    this scope; the marker is set for the duration of the call;
//! 2. a plain creator for `T`;
//! 3. the general engine, through [`Dummy::dummy`].
//!
//! Step 1 being skipped for in-flight types is what lets a constrained
//! creator ask for an ordinary `T` as raw material without recursing into
//! itself. A constrained creator also starts with an empty build stack, so
//! the types its caller was building do not count as cycles inside it.

use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::collection::{Count, CreateWith, SomeDummies};
use crate::config::DummiesConfig;
use crate::constraint::ConstraintRequest;
use crate::dummy::{Dummy, Regenerator};
use crate::engine::{FixtureEngine, RecursionPolicy};
use crate::error::DummyError;
use crate::specimen::{Customization, Request, Specimen};

type CreatorFn<T> = Arc<dyn Fn(&Scope<'_>) -> Result<T, DummyError> + Send + Sync>;
type ErasedCreator = Box<dyn Any + Send + Sync>;

type ActiveScopes = Vec<(u64, Rc<ScopeState>)>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Scopes whose creators are running on this thread, innermost last,
    /// keyed by the id of the context they belong to.
    static ACTIVE_SCOPES: RefCell<ActiveScopes> = const { RefCell::new(Vec::new()) };
}

#[derive(Default)]
struct CreatorRegistry {
    creators: HashMap<TypeId, ErasedCreator>,
    constrained: HashMap<TypeId, ErasedCreator>,
}

fn lookup<T: 'static>(map: &HashMap<TypeId, ErasedCreator>) -> Option<CreatorFn<T>> {
    map.get(&TypeId::of::<T>())
        .and_then(|creator| creator.downcast_ref::<CreatorFn<T>>())
        .cloned()
}

/// The dummy generation context.
///
/// Construct one per test process (or per test) and pass it to whatever
/// needs dummies; it is `Send + Sync`.
///
/// # Example
///
/// ```
/// use dummy_forge::Dummies;
///
/// let dummies = Dummies::new();
/// dummies.register_creator(|_| Ok(String::from("fixed")));
///
/// assert_eq!(dummies.create::<String>().expect("string"), "fixed");
/// let number: u16 = dummies.create().expect("number");
/// assert!((1..256).contains(&number));
/// ```
pub struct Dummies {
    id: u64,
    registry: Mutex<CreatorRegistry>,
    engine: Mutex<FixtureEngine>,
    collection_size: usize,
    max_attempts: i32,
    create_with: CreateWith,
}

impl Dummies {
    /// Creates a context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&DummiesConfig::default())
    }

    /// Creates a context from `config`.
    ///
    /// A configured seed makes every generator reproducible for
    /// single-threaded use.
    #[must_use]
    pub fn with_config(config: &DummiesConfig) -> Self {
        let rng = config.seed().map_or_else(
            || ChaCha8Rng::from_rng(&mut rand::rng()),
            ChaCha8Rng::seed_from_u64,
        );
        let engine = FixtureEngine::with_defaults(config.sequence_range(), config.recursion(), rng);
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            registry: Mutex::new(CreatorRegistry::default()),
            engine: Mutex::new(engine),
            collection_size: config.collection_size(),
            max_attempts: config.max_attempts(),
            create_with: config.create_with(),
        }
    }

    /// Registers `creator` as the way to build `T`, replacing any earlier
    /// plain creator for `T`.
    pub fn register_creator<T, F>(&self, creator: F)
    where
        T: 'static,
        F: Fn(&Scope<'_>) -> Result<T, DummyError> + Send + Sync + 'static,
    {
        let shared: CreatorFn<T> = Arc::new(creator);
        self.lock_registry()
            .creators
            .insert(TypeId::of::<T>(), Box::new(shared));
        debug!(type_name = type_name::<T>(), "registered creator");
    }

    /// Registers a constrained creator for `T`, replacing any earlier one.
    ///
    /// While the creator runs, requests for `T` made from inside it (directly
    /// or transitively) skip it and receive an ordinary `T`.
    pub fn register_constrained_creator<T, F>(&self, creator: F)
    where
        T: 'static,
        F: Fn(&Scope<'_>) -> Result<T, DummyError> + Send + Sync + 'static,
    {
        let shared: CreatorFn<T> = Arc::new(creator);
        self.lock_registry()
            .constrained
            .insert(TypeId::of::<T>(), Box::new(shared));
        debug!(type_name = type_name::<T>(), "registered constrained creator");
    }

    /// Registers a creator for `B` that picks one of `implementations`
    /// uniformly at random on every call and builds it with the general
    /// engine.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::NoConcreteSubclass`] when `implementations`
    /// holds no constructible candidate.
    ///
    /// # Example
    ///
    /// ```
    /// use dummy_forge::{Dummies, Dummy, DummyError, Implementations, Scope, abstract_dummy};
    ///
    /// trait Shape {
    ///     fn sides(&self) -> u8;
    /// }
    ///
    /// struct Triangle;
    /// impl Shape for Triangle {
    ///     fn sides(&self) -> u8 { 3 }
    /// }
    /// impl Dummy for Triangle {
    ///     fn dummy(_: &Scope<'_>) -> Result<Self, DummyError> { Ok(Self) }
    /// }
    ///
    /// abstract_dummy!(Box<dyn Shape>);
    ///
    /// let dummies = Dummies::new();
    /// assert!(!dummies.can_create::<Box<dyn Shape>>());
    ///
    /// dummies
    ///     .use_random_implementation(
    ///         Implementations::<Box<dyn Shape>>::new().with::<Triangle>(|t| Box::new(t)),
    ///     )
    ///     .expect("one implementation");
    ///
    /// let shape: Box<dyn Shape> = dummies.create().expect("shape");
    /// assert_eq!(shape.sides(), 3);
    /// ```
    pub fn use_random_implementation<B: 'static>(
        &self,
        implementations: Implementations<B>,
    ) -> Result<(), DummyError> {
        if implementations.is_empty() {
            return Err(DummyError::NoConcreteSubclass {
                base: type_name::<B>().to_owned(),
            });
        }
        debug!(
            base = type_name::<B>(),
            candidates = ?implementations.names,
            "registered random implementation creator"
        );
        let builders = implementations.builders;
        self.register_creator(move |scope| {
            let index = scope.with_rng(|rng| rng.random_range(0..builders.len()));
            builders.get(index).map_or_else(
                || {
                    Err(DummyError::NoConcreteSubclass {
                        base: type_name::<B>().to_owned(),
                    })
                },
                |build| build(scope),
            )
        });
        Ok(())
    }

    /// Adds an engine customization ahead of the default generators.
    ///
    /// Customizations added earlier keep precedence over later ones.
    pub fn customize<C>(&self, customization: C)
    where
        C: Customization + 'static,
    {
        self.lock_engine().customize(Arc::new(customization));
    }

    /// Returns `true` when `T` has a registered creator or the general engine
    /// can build it.
    #[must_use]
    pub fn can_create<T: Dummy>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        let registry = self.lock_registry();
        registry.creators.contains_key(&type_id)
            || registry.constrained.contains_key(&type_id)
            || T::constructible()
    }

    /// Creates a `T` in the scope returned by [`Dummies::scope`].
    ///
    /// # Errors
    ///
    /// Propagates any error raised by a creator or the engine.
    pub fn create<T: Dummy>(&self) -> Result<T, DummyError> {
        self.scope().create()
    }

    /// Creates a tagged collection in the scope returned by
    /// [`Dummies::scope`].
    ///
    /// # Errors
    ///
    /// Propagates any error raised while creating elements.
    pub fn some_dummies<T: Dummy>(
        &self,
        count: Count,
        create_with: CreateWith,
    ) -> Result<SomeDummies<T>, DummyError> {
        self.scope().some_dummies(count, create_with)
    }

    /// Returns the execution context for a request made on this thread.
    ///
    /// Called from inside a creator of this context, the scope joins the
    /// request that creator serves, in-flight markers included. Anywhere
    /// else it opens a new execution context. Requests made through the
    /// same scope share in-flight markers; use one scope per logical
    /// request.
    #[must_use]
    pub fn scope(&self) -> Scope<'_> {
        let state = ACTIVE_SCOPES.with_borrow(|active| {
            active
                .iter()
                .rev()
                .find(|(id, _)| *id == self.id)
                .map(|(_, state)| Rc::clone(state))
        });
        Scope {
            dummies: self,
            state: state.unwrap_or_default(),
        }
    }

    /// Attempt budget used by the constraint helpers that take none.
    #[must_use]
    pub const fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    fn constrained_creator<T: 'static>(&self) -> Option<CreatorFn<T>> {
        lookup(&self.lock_registry().constrained)
    }

    fn creator<T: 'static>(&self) -> Option<CreatorFn<T>> {
        lookup(&self.lock_registry().creators)
    }

    fn lock_registry(&self) -> MutexGuard<'_, CreatorRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_engine(&self) -> MutexGuard<'_, FixtureEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recursion(&self) -> RecursionPolicy {
        self.lock_engine().recursion()
    }
}

impl Default for Dummies {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dummies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock_registry();
        f.debug_struct("Dummies")
            .field("creators", &registry.creators.len())
            .field("constrained_creators", &registry.constrained.len())
            .field("engine", &*self.lock_engine())
            .field("collection_size", &self.collection_size)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Concrete candidates for [`Dummies::use_random_implementation`].
pub struct Implementations<B> {
    builders: Vec<CreatorFn<B>>,
    names: Vec<&'static str>,
}

impl<B: 'static> Implementations<B> {
    /// Starts an empty candidate list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            builders: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Adds `C` as a candidate, converted to `B` with `into_base`.
    ///
    /// Candidates that report themselves as not constructible are skipped.
    #[must_use]
    pub fn with<C: Dummy>(mut self, into_base: fn(C) -> B) -> Self {
        if C::constructible() {
            let build: CreatorFn<B> = Arc::new(move |scope| scope.build::<C>().map(into_base));
            self.builders.push(build);
            self.names.push(type_name::<C>());
        }
        self
    }

    /// Number of usable candidates.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.builders.len()
    }

    /// Returns `true` when no usable candidate was added.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

impl<B: 'static> Default for Implementations<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for Implementations<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementations")
            .field("names", &self.names)
            .finish()
    }
}

/// One logical request's execution context.
///
/// Creators receive the scope they run in and should make nested requests
/// through it, so the in-flight markers and the recursion tracking follow
/// the call chain.
pub struct Scope<'d> {
    dummies: &'d Dummies,
    state: Rc<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    in_flight: RefCell<HashSet<TypeId>>,
    building: RefCell<Vec<TypeId>>,
}

impl Scope<'_> {
    /// Creates a `T`, dispatching through the registered creators.
    ///
    /// # Errors
    ///
    /// Propagates any error raised by a creator or the engine.
    pub fn create<T: Dummy>(&self) -> Result<T, DummyError> {
        let type_id = TypeId::of::<T>();
        if let Some(creator) = self.dummies.constrained_creator::<T>() {
            if self.is_marked(type_id) {
                trace!(
                    type_name = type_name::<T>(),
                    "constrained creator in flight; serving an ordinary dummy"
                );
            } else {
                trace!(type_name = type_name::<T>(), "invoking constrained creator");
                let _marker = InFlightMarker::mark(&self.state, type_id);
                let _active = ActiveScope::enter(self);
                return creator(self);
            }
        }
        if let Some(creator) = self.dummies.creator::<T>() {
            let _active = ActiveScope::enter(self);
            return creator(self);
        }
        self.build()
    }

    /// Creates a `T` for an optional or repeated member, or `None` when the
    /// member closes a recursion cycle that the policy says to omit.
    ///
    /// # Errors
    ///
    /// Propagates every error except an omitted recursion.
    pub fn create_or_omit<T: Dummy>(&self) -> Result<Option<T>, DummyError> {
        if self.omits::<T>() {
            trace!(type_name = type_name::<T>(), "omitting recursive member");
            return Ok(None);
        }
        match self.create() {
            Err(DummyError::RecursiveObjectGraph { type_name: cycle })
                if self.dummies.recursion() == RecursionPolicy::Omit =>
            {
                trace!(%cycle, "omitting member that closes a cycle");
                Ok(None)
            }
            other => other.map(Some),
        }
    }

    /// Creates a tagged collection of `T`.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while creating elements.
    pub fn some_dummies<T: Dummy>(
        &self,
        count: Count,
        create_with: CreateWith,
    ) -> Result<SomeDummies<T>, DummyError> {
        SomeDummies::create(self, count, create_with)
    }

    /// Returns `reference` if it satisfies `predicate`, otherwise the first
    /// regenerated `T` that does, within the context's default budget.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::ConstraintUnsatisfiable`] when the budget runs
    /// out.
    pub fn that_is<T, P>(&self, reference: T, predicate: P) -> Result<T, DummyError>
    where
        T: Dummy,
        P: FnMut(&T) -> bool,
    {
        self.that_is_within(reference, predicate, self.dummies.max_attempts)
    }

    /// [`Scope::that_is`] with an explicit budget; zero or less retries
    /// forever.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::ConstraintUnsatisfiable`] when the budget runs
    /// out.
    pub fn that_is_within<T, P>(
        &self,
        reference: T,
        predicate: P,
        max_attempts: i32,
    ) -> Result<T, DummyError>
    where
        T: Dummy,
        P: FnMut(&T) -> bool,
    {
        self.satisfying(Some(reference), predicate, max_attempts)
    }

    /// Runs a constraint search, starting from `reference` when present.
    ///
    /// Candidates are regenerated with [`Dummy::regenerator`] of the
    /// reference, so tagged collections keep their shape across attempts.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::ConstraintUnsatisfiable`] when the budget runs
    /// out, or whatever regeneration raised.
    pub fn satisfying<T, P>(
        &self,
        reference: Option<T>,
        predicate: P,
        max_attempts: i32,
    ) -> Result<T, DummyError>
    where
        T: Dummy,
        P: FnMut(&T) -> bool,
    {
        let mut regenerate: Regenerator<T> = reference
            .as_ref()
            .map_or_else(|| Box::new(fresh::<T>) as Regenerator<T>, Dummy::regenerator);
        ConstraintRequest::new(|| regenerate(self))
            .predicate(predicate)
            .max_attempts(max_attempts)
            .satisfy(reference)
    }

    /// Constrains a projection of the value, e.g. a field.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::ConstraintUnsatisfiable`] when the default
    /// budget runs out.
    pub fn whose<T, U, F, P>(
        &self,
        reference: T,
        projection: F,
        predicate: P,
    ) -> Result<T, DummyError>
    where
        T: Dummy,
        F: FnMut(&T) -> U,
        P: FnMut(&U) -> bool,
    {
        self.whose_within(reference, projection, predicate, self.dummies.max_attempts)
    }

    /// [`Scope::whose`] with an explicit budget.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::ConstraintUnsatisfiable`] when the budget runs
    /// out.
    pub fn whose_within<T, U, F, P>(
        &self,
        reference: T,
        mut projection: F,
        mut predicate: P,
        max_attempts: i32,
    ) -> Result<T, DummyError>
    where
        T: Dummy,
        F: FnMut(&T) -> U,
        P: FnMut(&U) -> bool,
    {
        self.that_is_within(
            reference,
            |value| predicate(&projection(value)),
            max_attempts,
        )
    }

    /// Returns a value different from `comparison`, within the default
    /// budget.
    ///
    /// An absent reference yields `None` without generating anything; an
    /// absent comparison returns the reference unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::ConstraintUnsatisfiable`] when the budget runs
    /// out.
    pub fn that_is_not<T>(
        &self,
        reference: Option<T>,
        comparison: Option<&T>,
    ) -> Result<Option<T>, DummyError>
    where
        T: Dummy + PartialEq,
    {
        self.that_is_not_within(reference, comparison, self.dummies.max_attempts)
    }

    /// [`Scope::that_is_not`] with an explicit budget.
    ///
    /// # Errors
    ///
    /// Returns [`DummyError::ConstraintUnsatisfiable`] when the budget runs
    /// out.
    pub fn that_is_not_within<T>(
        &self,
        reference: Option<T>,
        comparison: Option<&T>,
        max_attempts: i32,
    ) -> Result<Option<T>, DummyError>
    where
        T: Dummy + PartialEq,
    {
        match (reference, comparison) {
            (Some(value), Some(excluded)) if value == *excluded => self
                .satisfying(Some(value), |candidate| candidate != excluded, max_attempts)
                .map(Some),
            (reference, _) => Ok(reference),
        }
    }

    /// Returns `true` while a constrained creator for `T` runs in this scope.
    #[must_use]
    pub fn is_in_flight<T: 'static>(&self) -> bool {
        self.is_marked(TypeId::of::<T>())
    }

    /// Returns `true` when containers of `T` should come back empty because
    /// `T` is already being built and recursion is omitted.
    #[must_use]
    pub fn omits<T: 'static>(&self) -> bool {
        self.is_building(TypeId::of::<T>()) && self.dummies.recursion() == RecursionPolicy::Omit
    }

    /// Default size of generated collections.
    #[must_use]
    pub const fn collection_size(&self) -> usize {
        self.dummies.collection_size
    }

    /// Default create-with policy for untagged collection requests.
    #[must_use]
    pub const fn create_with(&self) -> CreateWith {
        self.dummies.create_with
    }

    /// Builds `T` with the general engine, bypassing every registered
    /// creator.
    pub(crate) fn build<T: Dummy>(&self) -> Result<T, DummyError> {
        let type_id = TypeId::of::<T>();
        if self.is_building(type_id) {
            return Err(DummyError::recursive::<T>());
        }
        let _frame = BuildFrame::push(&self.state.building, type_id);
        T::dummy(self)
    }

    /// Resolves a primitive request under the engine lock.
    pub(crate) fn resolve(&self, request: &Request) -> Result<Specimen, DummyError> {
        self.dummies
            .lock_engine()
            .resolve(request)
            .ok_or_else(|| {
                DummyError::invalid_argument(
                    "request",
                    &format!("no specimen can answer a {request} request"),
                )
            })
    }

    /// Runs `draw` with the engine RNG under the engine lock.
    pub(crate) fn with_rng<R>(&self, draw: impl FnOnce(&mut ChaCha8Rng) -> R) -> R {
        draw(self.dummies.lock_engine().rng())
    }

    fn is_marked(&self, type_id: TypeId) -> bool {
        self.state.in_flight.borrow().contains(&type_id)
    }

    fn is_building(&self, type_id: TypeId) -> bool {
        self.state.building.borrow().contains(&type_id)
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("in_flight", &self.state.in_flight.borrow().len())
            .field("building", &self.state.building.borrow().len())
            .finish_non_exhaustive()
    }
}

fn fresh<T: Dummy>(scope: &Scope<'_>) -> Result<T, DummyError> {
    scope.create()
}

/// Marks a constrained creator as in flight and sets the caller's build
/// stack aside while it runs.
///
/// Dropping the marker clears the mark and restores the stack, including on
/// error or unwind.
struct InFlightMarker<'s> {
    state: &'s ScopeState,
    type_id: TypeId,
    outer_building: Vec<TypeId>,
}

impl<'s> InFlightMarker<'s> {
    fn mark(state: &'s ScopeState, type_id: TypeId) -> Self {
        state.in_flight.borrow_mut().insert(type_id);
        let outer_building = state.building.take();
        Self {
            state,
            type_id,
            outer_building,
        }
    }
}

impl Drop for InFlightMarker<'_> {
    fn drop(&mut self) {
        self.state.in_flight.borrow_mut().remove(&self.type_id);
        *self.state.building.borrow_mut() = std::mem::take(&mut self.outer_building);
    }
}

/// Publishes a scope as the current thread's context for its [`Dummies`]
/// while a creator runs.
struct ActiveScope;

impl ActiveScope {
    fn enter(scope: &Scope<'_>) -> Self {
        ACTIVE_SCOPES.with_borrow_mut(|active| {
            active.push((scope.dummies.id, Rc::clone(&scope.state)));
        });
        Self
    }
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        ACTIVE_SCOPES.with_borrow_mut(|active| {
            drop(active.pop());
        });
    }
}

/// Pops the build stack when dropped.
struct BuildFrame<'s> {
    stack: &'s RefCell<Vec<TypeId>>,
}

impl<'s> BuildFrame<'s> {
    fn push(stack: &'s RefCell<Vec<TypeId>>, type_id: TypeId) -> Self {
        stack.borrow_mut().push(type_id);
        Self { stack }
    }
}

impl Drop for BuildFrame<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    //! Dispatch-order and reentrancy coverage.

    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::{fixture, rstest};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Marker(&'static str);

    impl Dummy for Marker {
        fn dummy(_scope: &Scope<'_>) -> Result<Self, DummyError> {
            Ok(Self("engine"))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Wrapper(Marker);

    impl Dummy for Wrapper {
        fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
            Ok(Self(scope.create()?))
        }
    }

    #[fixture]
    fn dummies() -> Dummies {
        Dummies::new()
    }

    fn assert_scope_is_idle(scope: &Scope<'_>) {
        assert!(!scope.is_in_flight::<Marker>());
        assert!(scope.state.building.borrow().is_empty());
        assert!(ACTIVE_SCOPES.with_borrow(Vec::is_empty));
    }

    #[rstest]
    fn falls_back_to_the_engine(dummies: Dummies) {
        assert_eq!(dummies.create::<Marker>(), Ok(Marker("engine")));
    }

    #[rstest]
    fn last_plain_registration_wins(dummies: Dummies) {
        dummies.register_creator(|_| Ok(Marker("first")));
        dummies.register_creator(|_| Ok(Marker("second")));

        for _ in 0..5 {
            assert_eq!(dummies.create::<Marker>(), Ok(Marker("second")));
        }
    }

    #[rstest]
    fn last_constrained_registration_wins(dummies: Dummies) {
        dummies.register_constrained_creator(|_| Ok(Marker("first")));
        dummies.register_constrained_creator(|_| Ok(Marker("second")));

        for _ in 0..5 {
            assert_eq!(dummies.create::<Marker>(), Ok(Marker("second")));
        }
    }

    #[rstest]
    fn constrained_creator_takes_precedence(dummies: Dummies) {
        dummies.register_creator(|_| Ok(Marker("plain")));
        dummies.register_constrained_creator(|_| Ok(Marker("constrained")));

        assert_eq!(dummies.create::<Marker>(), Ok(Marker("constrained")));
    }

    #[rstest]
    fn inner_request_skips_the_in_flight_constrained_creator(dummies: Dummies) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        dummies.register_constrained_creator(move |scope| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert!(scope.is_in_flight::<Marker>());
            let raw: Marker = scope.create()?;
            assert_eq!(raw, Marker("engine"));
            Ok(Marker("constrained"))
        });

        assert_eq!(dummies.create::<Marker>(), Ok(Marker("constrained")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn marker_is_cleared_after_a_failing_creator(dummies: Dummies) {
        dummies.register_constrained_creator::<Marker, _>(|_| {
            Err(DummyError::not_constructible::<Marker>())
        });
        let scope = dummies.scope();

        assert!(scope.create::<Marker>().is_err());
        assert!(!scope.is_in_flight::<Marker>());
        assert!(scope.create::<Marker>().is_err(), "constrained path used again");
    }

    #[rstest]
    fn constrained_creator_starts_with_an_empty_build_stack(dummies: Dummies) {
        dummies.register_constrained_creator(|scope| {
            assert!(!scope.omits::<Wrapper>());
            let raw: Wrapper = scope.create()?;
            assert_eq!(raw, Wrapper(Marker("engine")));
            Ok(Marker("constrained"))
        });
        let scope = dummies.scope();

        assert_eq!(
            scope.create::<Wrapper>(),
            Ok(Wrapper(Marker("constrained")))
        );
        assert_scope_is_idle(&scope);
    }

    #[rstest]
    fn marker_and_build_stack_are_restored_after_a_panicking_creator(dummies: Dummies) {
        dummies.register_constrained_creator::<Marker, _>(|_| panic!("creator gave up"));
        let scope = dummies.scope();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| scope.create::<Wrapper>()));

        assert!(outcome.is_err());
        assert_scope_is_idle(&scope);
    }

    #[rstest]
    fn scope_joins_the_request_of_a_running_creator(dummies: Dummies) {
        dummies.register_creator(|scope: &Scope<'_>| {
            let joined = scope.dummies.scope();
            assert!(Rc::ptr_eq(&joined.state, &scope.state));
            Ok(Marker("plain"))
        });

        assert_eq!(dummies.create::<Marker>(), Ok(Marker("plain")));
        let outside = dummies.scope();
        assert!(!Rc::ptr_eq(&outside.state, &dummies.scope().state));
    }

    #[test]
    fn scopes_of_other_contexts_are_not_joined() {
        let outer = Dummies::new();
        let other = Dummies::new();
        outer.register_constrained_creator(move |_| {
            assert!(!other.scope().is_in_flight::<Marker>());
            Ok(Marker("outer"))
        });

        assert_eq!(outer.create::<Marker>(), Ok(Marker("outer")));
    }

    #[rstest]
    fn can_create_reports_registrations(dummies: Dummies) {
        assert!(dummies.can_create::<Marker>());
        assert!(dummies.can_create::<u32>());
    }

    #[test]
    fn empty_implementations_are_rejected() {
        let dummies = Dummies::new();
        let result = dummies.use_random_implementation(Implementations::<Marker>::new());

        assert!(matches!(result, Err(DummyError::NoConcreteSubclass { .. })));
    }

    #[test]
    fn build_rejects_direct_reentry() {
        struct Loop;
        impl Dummy for Loop {
            fn dummy(scope: &Scope<'_>) -> Result<Self, DummyError> {
                scope.build::<Self>()
            }
        }

        let dummies = Dummies::new();
        assert_eq!(
            dummies.create::<Loop>().map(|_| ()),
            Err(DummyError::recursive::<Loop>())
        );
    }
}
