//! Step trait, shared dynamic wrapper, and step registry.

use std::collections::HashMap;
use std::sync::Arc;

use tabula_types::{Accumulator, ListState, Result, StepKind, StepOptions};

use crate::query::ListQuery;

// ---------------------------------------------------------------------------
// Step trait
// ---------------------------------------------------------------------------

pub trait Step<Q: Accumulator>: Send + Sync {
    /// The implementation identifier (e.g. "sort", "paginate", "retrieve").
    fn implementation(&self) -> &str;

    /// Retrieval steps are the only ones allowed to mark a state as loaded.
    fn kind(&self) -> StepKind {
        StepKind::Transform
    }

    /// Produce the next state for the step declared as `step_name`.
    fn execute(
        &self,
        state: ListState<Q>,
        step_name: &str,
        options: &StepOptions,
    ) -> Result<ListState<Q>>;
}

// ---------------------------------------------------------------------------
// DynStep: shared, object-safe handle
// ---------------------------------------------------------------------------

/// A step implementation that can be shared by several declarations and
/// several pipelines.
pub struct DynStep<Q: Accumulator>(Arc<dyn Step<Q>>);

impl<Q: Accumulator> DynStep<Q> {
    pub fn new(step: impl Step<Q> + 'static) -> Self {
        Self(Arc::new(step))
    }

    pub fn implementation(&self) -> &str {
        self.0.implementation()
    }

    pub fn kind(&self) -> StepKind {
        self.0.kind()
    }

    pub fn execute(
        &self,
        state: ListState<Q>,
        step_name: &str,
        options: &StepOptions,
    ) -> Result<ListState<Q>> {
        self.0.execute(state, step_name, options)
    }
}

impl<Q: Accumulator> Clone for DynStep<Q> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<Q: Accumulator> std::fmt::Debug for DynStep<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DynStep").field(&self.implementation()).finish()
    }
}

// ---------------------------------------------------------------------------
// StepRegistry
// ---------------------------------------------------------------------------

/// Maps names to step implementations.
///
/// Consulted when a declaration carries no explicit implementation: the
/// declared step name is looked up here.
pub struct StepRegistry<Q: Accumulator> {
    steps: HashMap<String, DynStep<Q>>,
}

impl<Q: Accumulator> StepRegistry<Q> {
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
        }
    }

    /// Register under the step's own implementation name.
    pub fn register(&mut self, step: impl Step<Q> + 'static) {
        let step = DynStep::new(step);
        self.steps.insert(step.implementation().to_string(), step);
    }

    /// Register under an explicit name, e.g. to make one implementation the
    /// default for several step names.
    pub fn register_as(&mut self, name: impl Into<String>, step: DynStep<Q>) {
        self.steps.insert(name.into(), step);
    }

    pub fn get(&self, name: &str) -> Option<&DynStep<Q>> {
        self.steps.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<Q: Accumulator> Default for StepRegistry<Q> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Default registry factory
// ---------------------------------------------------------------------------

/// Registry holding the built-in `sort`, `filter`, `paginate` and `retrieve`
/// steps for any [`ListQuery`] accumulator.
pub fn default_registry<Q: ListQuery>() -> StepRegistry<Q> {
    let mut reg = StepRegistry::new();
    reg.register(crate::steps::SortStep);
    reg.register(crate::steps::FilterStep);
    reg.register(crate::steps::PaginateStep);
    reg.register(crate::steps::RetrieveStep);
    reg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
