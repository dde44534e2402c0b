//! FilterStep: narrows the query with caller-supplied conditions.

use serde_json::Value;
use tabula_types::{ListError, ListState, Result, StepOptions};

use crate::condition::{parse_condition, ConditionExpr};
use crate::query::ListQuery;
use crate::step::Step;

use super::{param_key, scalar_text};

/// Applies the `filter` parameter, given either as an expression
/// (`status=open && score>=3`) or as a map of field to expected value.
///
/// Options:
/// - `filterable`: allow-list of fields a clause may reference
/// - `filter_param`: parameter key (default `filter`)
pub struct FilterStep;

impl<Q: ListQuery> Step<Q> for FilterStep {
    fn implementation(&self) -> &str {
        "filter"
    }

    fn execute(
        &self,
        state: ListState<Q>,
        step_name: &str,
        options: &StepOptions,
    ) -> Result<ListState<Q>> {
        state.require_accumulator(step_name)?;

        let key = param_key(options, "filter_param", "filter");
        let condition = match state.params().get(key) {
            None | Some(Value::Null) => ConditionExpr::default(),
            Some(Value::String(expr)) => parse_condition(expr)?,
            Some(Value::Object(fields)) => fields.iter().try_fold(
                ConditionExpr::default(),
                |acc, (field, value)| match scalar_text(value) {
                    Some(text) => Ok(acc.and(ConditionExpr::equals(field.as_str(), text))),
                    None => Err(ListError::InvalidParameter {
                        step: step_name.to_string(),
                        message: format!("filter value for '{field}' must be a scalar"),
                    }),
                },
            )?,
            Some(other) => {
                return Err(ListError::InvalidParameter {
                    step: step_name.to_string(),
                    message: format!("unsupported filter value {other}"),
                })
            }
        };

        if condition.clauses.is_empty() {
            tracing::debug!(step = %step_name, "No filter requested");
            return Ok(state);
        }

        if let Some(allowed) = options.get_str_list("filterable") {
            if let Some(field) = condition.keys().find(|k| !allowed.iter().any(|a| a == *k)) {
                return Err(ListError::InvalidParameter {
                    step: step_name.to_string(),
                    message: format!("field '{field}' is not filterable"),
                });
            }
        }

        tracing::debug!(step = %step_name, clauses = condition.clauses.len(), "Applying filter");
        let query = state.require_accumulator(step_name)?.clone();
        Ok(state.with_accumulator(query.filter(&condition)))
    }
}
