//! Shared types, errors, parameters, and list state for the Tabula pipeline.
//!
//! This crate provides the foundational types used by the other Tabula crates:
//! - `ListError`: unified error taxonomy
//! - `Params` / `StepOptions`: caller input and per-step configuration
//! - `Pagination`: the page/offset/navigation descriptor
//! - `ListState`: the value threaded through every pipeline step

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unified error type for pipeline construction and execution.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    // === Configuration Errors ===
    #[error("Step '{step}' is misconfigured: {message}")]
    Configuration { step: String, message: String },

    #[error("Step '{step}' requires option '{option}'")]
    MissingOption { step: String, option: String },

    #[error("Pipeline validation failed: {0}")]
    Validation(String),

    // === Input Errors ===
    #[error("Invalid {field} '{value}': expected a positive integer within range")]
    InvalidPageInput { field: String, value: String },

    #[error("Invalid parameter for step '{step}': {message}")]
    InvalidParameter { step: String, message: String },

    #[error("Invalid filter expression: {0}")]
    FilterSyntax(String),

    // === Execution Errors ===
    #[error("Step '{step}' ran before any step installed a query")]
    MissingAccumulator { step: String },

    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ListError {
    /// Returns `true` for errors caused by how a pipeline or step was declared,
    /// as opposed to what a caller passed in.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ListError::Configuration { .. }
                | ListError::MissingOption { .. }
                | ListError::Validation(_)
        )
    }

    /// Returns `true` for errors caused by caller-supplied parameters.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            ListError::InvalidPageInput { .. }
                | ListError::InvalidParameter { .. }
                | ListError::FilterSyntax(_)
        )
    }
}

/// A convenience alias for `Result<T, ListError>`.
pub type Result<T> = std::result::Result<T, ListError>;

// ---------------------------------------------------------------------------
// Params: caller-supplied input
// ---------------------------------------------------------------------------

/// Caller-supplied parameters: string keys mapping to scalars or nested maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from key/value pairs, keeping insertion order.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a dotted path (`"filter.status"`) through nested maps.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.0.get(first)?, |value, seg| value.get(seg))
    }

    /// String value for `key`, if present and a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// StepOptions: declared per-step configuration
// ---------------------------------------------------------------------------

/// Implementation-specific options attached to a step declaration.
///
/// Keys keep their declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepOptions(Map<String, Value>);

impl StepOptions {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// A list option given either as a JSON array of strings or as a
    /// comma-separated string.
    pub fn get_str_list(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            ),
            Value::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for StepOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ---------------------------------------------------------------------------
// Pagination: page boundaries and navigation
// ---------------------------------------------------------------------------

/// Offsets and navigation for one page of a record list.
///
/// Only the pagination calculator constructs these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub per_page: u64,
    pub current_page: u64,
    pub records_count: u64,
    pub records_offset: u64,
    pub total_pages: u64,
    pub next_page: Option<u64>,
    pub previous_page: Option<u64>,
    /// 1-based position of the first record on this page; 0 when there are
    /// no records.
    pub records_from: u64,
    pub records_to: Option<u64>,
}

// ---------------------------------------------------------------------------
// Accumulator: the step-defined work-in-progress value
// ---------------------------------------------------------------------------

/// The value steps build up before results are materialized, typically an
/// unexecuted query.
pub trait Accumulator: Clone + fmt::Debug + Send + Sync + 'static {
    /// The record type a retrieval step materializes.
    type Record: Clone + fmt::Debug + PartialEq + Serialize + Send + Sync + 'static;
}

impl<T> Accumulator for Vec<T>
where
    T: Clone + fmt::Debug + PartialEq + Serialize + Send + Sync + 'static,
{
    type Record = T;
}

/// Category of a step. Only `Retrieve` steps may mark a state as loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    #[default]
    Transform,
    Retrieve,
}

// ---------------------------------------------------------------------------
// ListState: the value threaded through the pipeline
// ---------------------------------------------------------------------------

/// State of a record list under construction.
///
/// Steps consume a `ListState` and return a new one; the `with_*` methods
/// build that new value. Parameters cannot be changed after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = ""))]
pub struct ListState<Q: Accumulator> {
    #[serde(skip)]
    accumulator: Option<Q>,
    params: Params,
    pagination: Option<Pagination>,
    loaded: bool,
    results: Vec<Q::Record>,
    executed_steps: Vec<String>,
    extra: Map<String, Value>,
}

impl<Q: Accumulator> ListState<Q> {
    /// A fresh state holding only the caller's parameters.
    pub fn new(params: Params) -> Self {
        Self {
            accumulator: None,
            params,
            pagination: None,
            loaded: false,
            results: Vec::new(),
            executed_steps: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn accumulator(&self) -> Option<&Q> {
        self.accumulator.as_ref()
    }

    /// The accumulator, or `MissingAccumulator` naming `step`.
    pub fn require_accumulator(&self, step: &str) -> Result<&Q> {
        self.accumulator
            .as_ref()
            .ok_or_else(|| ListError::MissingAccumulator {
                step: step.to_string(),
            })
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn results(&self) -> &[Q::Record] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Q::Record> {
        self.results
    }

    /// Step names, most recently executed first.
    pub fn executed_steps(&self) -> &[String] {
        &self.executed_steps
    }

    pub fn has_executed(&self, step: &str) -> bool {
        self.executed_steps.iter().any(|s| s == step)
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn with_accumulator(self, accumulator: Q) -> Self {
        Self {
            accumulator: Some(accumulator),
            ..self
        }
    }

    pub fn with_pagination(self, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..self
        }
    }

    /// Install materialized results and mark the state as loaded.
    pub fn with_results(self, results: Vec<Q::Record>) -> Self {
        Self {
            results,
            loaded: true,
            ..self
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Record `step` as the most recently executed step.
    ///
    /// Only the head of the history is checked: repeating the most recent
    /// step is a no-op, while a step found further back is pushed again.
    pub fn record_step(mut self, step: &str) -> Self {
        if self.executed_steps.first().map(String::as_str) != Some(step) {
            self.executed_steps.insert(0, step.to_string());
        }
        self
    }
}
