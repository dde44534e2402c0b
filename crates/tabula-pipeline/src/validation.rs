//! Pipeline validation: lint rules and diagnostics.
//!
//! Rules inspect the declared step list before a pipeline is built. Call
//! [`validate`] for advisory diagnostics or [`validate_or_raise`] to fail on
//! any `Error`-severity issue.

use std::collections::HashSet;

use tabula_types::{Accumulator, ListError, StepKind};

use crate::engine::StepDeclaration;
use crate::step::StepRegistry;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub step: Option<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A declaration as the rules see it, with its implementation resolved
/// where possible.
#[derive(Debug, Clone)]
pub struct DeclaredStep<'a> {
    pub name: &'a str,
    /// Implementation name; `None` when nothing resolves.
    pub implementation: Option<&'a str>,
    pub kind: Option<StepKind>,
}

impl DeclaredStep<'_> {
    fn is_retrieve(&self) -> bool {
        self.kind == Some(StepKind::Retrieve)
    }

    fn is_paginate(&self) -> bool {
        self.implementation == Some("paginate")
    }
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, steps: &[DeclaredStep<'_>]) -> Vec<Diagnostic>;
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct NonEmptyRule;
impl LintRule for NonEmptyRule {
    fn name(&self) -> &str { "non_empty" }
    fn apply(&self, steps: &[DeclaredStep<'_>]) -> Vec<Diagnostic> {
        if !steps.is_empty() {
            return vec![];
        }
        vec![Diagnostic {
            rule: self.name().into(),
            severity: Severity::Error,
            message: "Pipeline declares no steps".into(),
            step: None,
            fix: Some("Declare at least a base step that installs the query".into()),
        }]
    }
}

struct UniqueNamesRule;
impl LintRule for UniqueNamesRule {
    fn name(&self) -> &str { "unique_names" }
    fn apply(&self, steps: &[DeclaredStep<'_>]) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        steps
            .iter()
            .filter(|s| !seen.insert(s.name) && reported.insert(s.name))
            .map(|s| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!("Step '{}' is declared more than once", s.name),
                step: Some(s.name.to_string()),
                fix: Some(format!("Rename one of the '{}' declarations", s.name)),
            })
            .collect()
    }
}

struct ResolvableRule;
impl LintRule for ResolvableRule {
    fn name(&self) -> &str { "resolvable" }
    fn apply(&self, steps: &[DeclaredStep<'_>]) -> Vec<Diagnostic> {
        steps
            .iter()
            .filter(|s| s.implementation.is_none())
            .map(|s| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!(
                    "Step '{}' has no implementation and no default is registered under that name",
                    s.name
                ),
                step: Some(s.name.to_string()),
                fix: Some("Pass an implementation or register one under the step name".into()),
            })
            .collect()
    }
}

struct RetrieveLastRule;
impl LintRule for RetrieveLastRule {
    fn name(&self) -> &str { "retrieve_last" }
    fn apply(&self, steps: &[DeclaredStep<'_>]) -> Vec<Diagnostic> {
        let Some(first) = steps.iter().position(|s| s.is_retrieve()) else {
            return vec![];
        };
        let retrieve = steps[first].name;
        steps[first + 1..]
            .iter()
            .filter(|s| !s.is_retrieve() && !s.is_paginate())
            .map(|s| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!(
                    "Step '{}' runs after retrieval step '{retrieve}'; query changes will not reach the results",
                    s.name
                ),
                step: Some(s.name.to_string()),
                fix: Some(format!("Move '{}' before '{retrieve}'", s.name)),
            })
            .collect()
    }
}

struct PaginateBeforeRetrieveRule;
impl LintRule for PaginateBeforeRetrieveRule {
    fn name(&self) -> &str { "paginate_before_retrieve" }
    fn apply(&self, steps: &[DeclaredStep<'_>]) -> Vec<Diagnostic> {
        let Some(first) = steps.iter().position(|s| s.is_retrieve()) else {
            return vec![];
        };
        steps[first + 1..]
            .iter()
            .filter(|s| s.is_paginate())
            .map(|s| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!(
                    "Paginate step '{}' is declared after retrieval; results will not be windowed",
                    s.name
                ),
                step: Some(s.name.to_string()),
                fix: Some(format!("Declare '{}' before '{}'", s.name, steps[first].name)),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve each declaration the way the builder does: explicit
/// implementation first, then the registry entry under the step name.
pub fn declared_steps<'a, Q: Accumulator>(
    declarations: &'a [StepDeclaration<Q>],
    registry: &'a StepRegistry<Q>,
) -> Vec<DeclaredStep<'a>> {
    declarations
        .iter()
        .map(|decl| {
            let step = decl.implementation.as_ref().or_else(|| registry.get(&decl.name));
            DeclaredStep {
                name: &decl.name,
                implementation: step.map(|s| s.implementation()),
                kind: step.map(|s| s.kind()),
            }
        })
        .collect()
}

/// Run every built-in rule over already-resolved declarations.
pub fn lint(steps: &[DeclaredStep<'_>]) -> Vec<Diagnostic> {
    let rules: Vec<Box<dyn LintRule>> = vec![
        Box::new(NonEmptyRule),
        Box::new(UniqueNamesRule),
        Box::new(ResolvableRule),
        Box::new(RetrieveLastRule),
        Box::new(PaginateBeforeRetrieveRule),
    ];

    let mut diagnostics = Vec::new();
    for rule in &rules {
        diagnostics.extend(rule.apply(steps));
    }
    diagnostics
}

/// Run all lint rules over a declaration list.
pub fn validate<Q: Accumulator>(
    declarations: &[StepDeclaration<Q>],
    registry: &StepRegistry<Q>,
) -> Vec<Diagnostic> {
    lint(&declared_steps(declarations, registry))
}

/// Run all lint rules; return `Err` if any `Error`-severity diagnostic found.
pub fn validate_or_raise<Q: Accumulator>(
    declarations: &[StepDeclaration<Q>],
    registry: &StepRegistry<Q>,
) -> tabula_types::Result<Vec<Diagnostic>> {
    let diagnostics = validate(declarations, registry);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(ListError::Validation(errors.join("; ")));
    }
    Ok(diagnostics)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
