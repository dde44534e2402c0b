//! Pipeline engine: ordered step declarations and their two entry forms.
//!
//! Every declared step can be run *from parameters* (a fresh state is built
//! and every earlier step runs first) or *from state* (only that step runs,
//! on a state the caller already advanced through the earlier steps).

use std::time::Instant;

use tabula_types::{Accumulator, ListError, ListState, Params, Result, StepKind, StepOptions};

use crate::events::{EventEmitter, ListEvent};
use crate::query::ListQuery;
use crate::step::{default_registry, DynStep, Step, StepRegistry};
use crate::validation::validate_or_raise;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One entry of a pipeline recipe: a unique name, an optional explicit
/// implementation and that implementation's options.
#[derive(Debug)]
pub struct StepDeclaration<Q: Accumulator> {
    pub name: String,
    pub implementation: Option<DynStep<Q>>,
    pub options: StepOptions,
}

impl<Q: Accumulator> StepDeclaration<Q> {
    pub fn new(name: impl Into<String>, step: DynStep<Q>, options: StepOptions) -> Self {
        Self {
            name: name.into(),
            implementation: Some(step),
            options,
        }
    }

    /// A declaration whose implementation is looked up by name at build time.
    pub fn by_name(name: impl Into<String>, options: StepOptions) -> Self {
        Self {
            name: name.into(),
            implementation: None,
            options,
        }
    }
}

/// Either raw parameters or an existing state; selects the entry form used
/// by [`Pipeline::step`].
#[derive(Debug)]
pub enum StepInput<Q: Accumulator> {
    Params(Params),
    State(ListState<Q>),
}

impl<Q: Accumulator> From<Params> for StepInput<Q> {
    fn from(params: Params) -> Self {
        StepInput::Params(params)
    }
}

impl<Q: Accumulator> From<ListState<Q>> for StepInput<Q> {
    fn from(state: ListState<Q>) -> Self {
        StepInput::State(state)
    }
}

#[derive(Debug)]
struct ResolvedStep<Q: Accumulator> {
    name: String,
    step: DynStep<Q>,
    options: StepOptions,
}

/// A built, immutable pipeline. Shareable across threads; every call works
/// on its own state value.
#[derive(Debug)]
pub struct Pipeline<Q: Accumulator> {
    name: String,
    steps: Vec<ResolvedStep<Q>>,
    events: Option<EventEmitter>,
}

/// Convenience accessor for one declared step.
#[derive(Debug)]
pub struct StepHandle<'a, Q: Accumulator> {
    pipeline: &'a Pipeline<Q>,
    index: usize,
}

// ---------------------------------------------------------------------------
// PipelineBuilder
// ---------------------------------------------------------------------------

/// Collects step declarations and resolves them into a [`Pipeline`].
pub struct PipelineBuilder<Q: Accumulator> {
    name: String,
    declarations: Vec<StepDeclaration<Q>>,
    registry: StepRegistry<Q>,
    events: Option<EventEmitter>,
}

impl<Q: Accumulator> PipelineBuilder<Q> {
    /// A builder with an empty registry: every step needs an explicit
    /// implementation unless one is supplied via [`with_registry`](Self::with_registry).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
            registry: StepRegistry::new(),
            events: None,
        }
    }

    /// Registry consulted for declarations without an implementation.
    pub fn with_registry(mut self, registry: StepRegistry<Q>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_events(mut self, emitter: EventEmitter) -> Self {
        self.events = Some(emitter);
        self
    }

    /// Declare a step with its own implementation.
    pub fn step(
        self,
        name: impl Into<String>,
        step: impl Step<Q> + 'static,
        options: StepOptions,
    ) -> Self {
        self.declare(StepDeclaration::new(name, DynStep::new(step), options))
    }

    /// Declare a step backed by an implementation shared with other
    /// declarations or pipelines.
    pub fn shared_step(self, name: impl Into<String>, step: DynStep<Q>, options: StepOptions) -> Self {
        self.declare(StepDeclaration::new(name, step, options))
    }

    /// Declare a step whose implementation is the registry entry of the same
    /// name.
    pub fn default_step(self, name: impl Into<String>, options: StepOptions) -> Self {
        self.declare(StepDeclaration::by_name(name, options))
    }

    pub fn declare(mut self, declaration: StepDeclaration<Q>) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Resolve every declaration and lint the recipe.
    ///
    /// Fails with [`ListError::Configuration`] naming the first step that has
    /// neither an implementation nor a registry default, and with
    /// [`ListError::Validation`] for any other error-severity lint.
    pub fn build(self) -> Result<Pipeline<Q>> {
        let mut steps = Vec::with_capacity(self.declarations.len());
        for decl in &self.declarations {
            let step = decl
                .implementation
                .clone()
                .or_else(|| self.registry.get(&decl.name).cloned())
                .ok_or_else(|| ListError::Configuration {
                    step: decl.name.clone(),
                    message: "no implementation declared and no default registered for this name"
                        .into(),
                })?;
            steps.push(ResolvedStep {
                name: decl.name.clone(),
                step,
                options: decl.options.clone(),
            });
        }

        let diagnostics = validate_or_raise(&self.declarations, &self.registry)?;
        for diag in &diagnostics {
            tracing::warn!(
                pipeline = %self.name,
                rule = %diag.rule,
                step = diag.step.as_deref().unwrap_or(""),
                "{}",
                diag.message
            );
        }

        tracing::debug!(
            pipeline = %self.name,
            steps = ?steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "Pipeline built"
        );

        Ok(Pipeline {
            name: self.name,
            steps,
            events: self.events,
        })
    }
}

impl<Q: ListQuery> PipelineBuilder<Q> {
    /// A builder whose registry holds the built-in steps.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name).with_registry(default_registry())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

impl<Q: Accumulator> Pipeline<Q> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared step names in execution order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.name.as_str())
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name == name)
    }

    pub fn handle(&self, name: &str) -> Option<StepHandle<'_, Q>> {
        self.index_of(name).ok().map(|index| StepHandle {
            pipeline: self,
            index,
        })
    }

    /// From-state form: run only `name` on a state that already went
    /// through every earlier step.
    pub fn run_from_state(&self, name: &str, state: ListState<Q>) -> Result<ListState<Q>> {
        let index = self.index_of(name)?;
        self.execute_at(index, state)
    }

    /// From-parameters form: build a fresh state from `params`, run every
    /// step declared before `name` in order, then `name` itself.
    pub fn run_from_params(&self, name: &str, params: Params) -> Result<ListState<Q>> {
        let index = self.index_of(name)?;
        self.run_prefix(index, params)
    }

    /// Run `name` using whichever entry form matches `input`.
    pub fn step(&self, input: impl Into<StepInput<Q>>, name: &str) -> Result<ListState<Q>> {
        match input.into() {
            StepInput::Params(params) => self.run_from_params(name, params),
            StepInput::State(state) => self.run_from_state(name, state),
        }
    }

    /// Same as [`step`](Self::step) with the step name first.
    pub fn run_through(&self, name: &str, input: impl Into<StepInput<Q>>) -> Result<ListState<Q>> {
        self.step(input, name)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.steps
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| ListError::UnknownStep(name.to_string()))
    }

    fn run_prefix(&self, index: usize, params: Params) -> Result<ListState<Q>> {
        (0..=index).try_fold(ListState::new(params), |state, i| self.execute_at(i, state))
    }

    fn execute_at(&self, index: usize, state: ListState<Q>) -> Result<ListState<Q>> {
        let resolved = &self.steps[index];
        let span = tracing::info_span!("list_step", pipeline = %self.name, step = %resolved.name);
        let _guard = span.enter();

        self.emit(|| ListEvent::StepStarted {
            pipeline: self.name.clone(),
            step: resolved.name.clone(),
            implementation: resolved.step.implementation().to_string(),
        });

        let started = Instant::now();
        let was_loaded = state.is_loaded();
        let result = resolved
            .step
            .execute(state, &resolved.name, &resolved.options)
            .and_then(|next| {
                if next.is_loaded() && !was_loaded && resolved.step.kind() != StepKind::Retrieve {
                    return Err(ListError::Configuration {
                        step: resolved.name.clone(),
                        message: format!(
                            "implementation '{}' loaded results but is not a retrieval step",
                            resolved.step.implementation()
                        ),
                    });
                }
                Ok(next.record_step(&resolved.name))
            });

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                tracing::debug!(duration_ms, "Step completed");
                self.emit(|| ListEvent::StepCompleted {
                    pipeline: self.name.clone(),
                    step: resolved.name.clone(),
                    duration_ms,
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "Step failed");
                self.emit(|| ListEvent::StepFailed {
                    pipeline: self.name.clone(),
                    step: resolved.name.clone(),
                    error: err.to_string(),
                });
            }
        }
        result
    }

    fn emit(&self, event: impl FnOnce() -> ListEvent) {
        if let Some(ref emitter) = self.events {
            emitter.emit(event());
        }
    }
}

// ---------------------------------------------------------------------------
// StepHandle
// ---------------------------------------------------------------------------

impl<'a, Q: Accumulator> StepHandle<'a, Q> {
    pub fn name(&self) -> &'a str {
        &self.pipeline.steps[self.index].name
    }

    pub fn implementation(&self) -> &'a str {
        self.pipeline.steps[self.index].step.implementation()
    }

    pub fn options(&self) -> &'a StepOptions {
        &self.pipeline.steps[self.index].options
    }

    pub fn from_params(&self, params: Params) -> Result<ListState<Q>> {
        self.pipeline.run_prefix(self.index, params)
    }

    pub fn from_state(&self, state: ListState<Q>) -> Result<ListState<Q>> {
        self.pipeline.execute_at(self.index, state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
