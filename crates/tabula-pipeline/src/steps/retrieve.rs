//! RetrieveStep: executes the query and materializes results.

use tabula_types::{ListState, Result, StepKind, StepOptions};

use crate::query::ListQuery;
use crate::step::Step;

pub struct RetrieveStep;

impl<Q: ListQuery> Step<Q> for RetrieveStep {
    fn implementation(&self) -> &str {
        "retrieve"
    }

    fn kind(&self) -> StepKind {
        StepKind::Retrieve
    }

    fn execute(
        &self,
        state: ListState<Q>,
        step_name: &str,
        _options: &StepOptions,
    ) -> Result<ListState<Q>> {
        let records = state.require_accumulator(step_name)?.fetch()?;
        tracing::info!(step = %step_name, records = records.len(), "Retrieved records");
        Ok(state.with_results(records))
    }
}
