//! JSON pipeline definitions.
//!
//! A definition names a pipeline and lists its steps, each with an optional
//! registry implementation name and its options:
//!
//! ```json
//! { "name": "people",
//!   "steps": [ { "name": "base" },
//!              { "name": "page", "implementation": "paginate", "options": { "per_page": 20 } },
//!              { "name": "retrieve" } ] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tabula_types::{Accumulator, ListError, Result, StepOptions};

use crate::engine::{Pipeline, PipelineBuilder, StepDeclaration};
use crate::events::EventEmitter;
use crate::step::StepRegistry;
use crate::validation::{validate, Diagnostic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    /// Registry name of the implementation; the step name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    #[serde(default, skip_serializing_if = "StepOptions::is_empty")]
    pub options: StepOptions,
}

impl PipelineDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let definition = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.display(),
            pipeline = %definition.name,
            steps = definition.steps.len(),
            "Pipeline definition loaded"
        );
        Ok(definition)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Turn every step into a declaration. An explicit implementation name
    /// must exist in `registry`; steps without one are resolved by name when
    /// the pipeline is built.
    pub fn declarations<Q: Accumulator>(
        &self,
        registry: &StepRegistry<Q>,
    ) -> Result<Vec<StepDeclaration<Q>>> {
        self.steps
            .iter()
            .map(|step| match &step.implementation {
                Some(implementation) => registry
                    .get(implementation)
                    .cloned()
                    .map(|found| StepDeclaration::new(&step.name, found, step.options.clone()))
                    .ok_or_else(|| ListError::Configuration {
                        step: step.name.clone(),
                        message: format!("implementation '{implementation}' is not registered"),
                    }),
                None => Ok(StepDeclaration::by_name(&step.name, step.options.clone())),
            })
            .collect()
    }

    /// Lint the definition without building it.
    pub fn validate<Q: Accumulator>(&self, registry: &StepRegistry<Q>) -> Result<Vec<Diagnostic>> {
        let declarations = self.declarations(registry)?;
        Ok(validate(&declarations, registry))
    }

    pub fn build<Q: Accumulator>(&self, registry: StepRegistry<Q>) -> Result<Pipeline<Q>> {
        self.builder(registry)?.build()
    }

    pub fn build_with_events<Q: Accumulator>(
        &self,
        registry: StepRegistry<Q>,
        events: EventEmitter,
    ) -> Result<Pipeline<Q>> {
        self.builder(registry)?.with_events(events).build()
    }

    fn builder<Q: Accumulator>(&self, registry: StepRegistry<Q>) -> Result<PipelineBuilder<Q>> {
        let declarations = self.declarations(&registry)?;
        Ok(declarations
            .into_iter()
            .fold(PipelineBuilder::new(&self.name).with_registry(registry), |builder, decl| {
                builder.declare(decl)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBase, MemoryQuery};
    use crate::step::{default_registry, DynStep};
    use serde_json::json;
    use tabula_types::Params;

    fn registry() -> StepRegistry<MemoryQuery> {
        let mut registry = default_registry();
        let records = (1..=7).map(|id| json!({"id": id})).collect();
        registry.register_as("base", DynStep::new(MemoryBase::new(records)));
        registry
    }

    const PEOPLE: &str = r#"{
        "name": "people",
        "steps": [
            { "name": "base" },
            { "name": "page", "implementation": "paginate", "options": { "per_page": 3 } },
            { "name": "retrieve" }
        ]
    }"#;

    #[test]
    fn parses_optional_fields() {
        let def = PipelineDefinition::from_json(PEOPLE).unwrap();
        assert_eq!(def.name, "people");
        assert_eq!(def.steps.len(), 3);
        assert_eq!(def.steps[0].implementation, None);
        assert!(def.steps[0].options.is_empty());
        assert_eq!(def.steps[1].implementation.as_deref(), Some("paginate"));
        assert_eq!(def.steps[1].options.get("per_page"), Some(&json!(3)));
    }

    #[test]
    fn builds_and_runs() {
        let pipeline = PipelineDefinition::from_json(PEOPLE).unwrap().build(registry()).unwrap();
        let state = pipeline
            .run_from_params("retrieve", Params::new().with("page", 3))
            .unwrap();
        assert_eq!(state.results(), [json!({"id": 7})]);
        assert_eq!(state.pagination().unwrap().total_pages, 3);
        assert_eq!(state.executed_steps(), ["retrieve", "page", "base"]);
    }

    #[test]
    fn unknown_implementation_is_configuration_error() {
        let def = PipelineDefinition::from_json(
            r#"{"name": "x", "steps": [{"name": "base"}, {"name": "mix", "implementation": "shuffle"}]}"#,
        )
        .unwrap();
        match def.build(registry()) {
            Err(ListError::Configuration { step, message }) => {
                assert_eq!(step, "mix");
                assert!(message.contains("shuffle"));
            }
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn unresolvable_step_name_is_configuration_error() {
        let def = PipelineDefinition::from_json(r#"{"name": "x", "steps": [{"name": "tidy"}]}"#).unwrap();
        let err = def.build(registry()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn validate_reports_without_building() {
        let def = PipelineDefinition::from_json(
            r#"{"name": "x", "steps": [{"name": "base"}, {"name": "retrieve"}, {"name": "sort"}]}"#,
        )
        .unwrap();
        let diags = def.validate(&registry()).unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].rule, "retrieve_last");
    }

    #[test]
    fn malformed_json_is_json_error() {
        let err = PipelineDefinition::from_json("{\"steps\": []}").unwrap_err();
        assert!(matches!(err, ListError::Json(_)));
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.json");
        let def = PipelineDefinition::from_json(PEOPLE).unwrap();
        def.save(&path).unwrap();

        let loaded = PipelineDefinition::load(&path).unwrap();
        assert_eq!(loaded, def);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("\"implementation\": null"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineDefinition::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ListError::Io(_)));
    }
}
