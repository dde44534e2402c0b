//! Step pipeline engine for list endpoints.
//!
//! A pipeline is an ordered list of named steps that turn request parameters
//! into a page of records: a base step installs a query, transforms such as
//! sort, filter and paginate refine it, and a retrieval step runs it. Each
//! step can be entered from raw parameters (earlier steps run first) or from
//! an existing state (only that step runs).

pub mod condition;
pub mod definition;
pub mod engine;
pub mod events;
pub mod memory;
pub mod pagination;
pub mod query;
pub mod step;
pub mod steps;
pub mod validation;

pub use condition::{evaluate_condition, parse_condition, Clause, ConditionExpr, Operator};
pub use definition::{PipelineDefinition, StepDefinition};
pub use engine::{Pipeline, PipelineBuilder, StepDeclaration, StepHandle, StepInput};
pub use events::{EventEmitter, ListEvent};
pub use memory::{MemoryBase, MemoryQuery};
pub use pagination::PageArg;
pub use query::{ListQuery, SortDirection};
pub use step::{default_registry, DynStep, Step, StepRegistry};
pub use steps::{FilterStep, PaginateStep, RetrieveStep, SortStep};
pub use validation::{validate, validate_or_raise, Diagnostic, LintRule, Severity};
