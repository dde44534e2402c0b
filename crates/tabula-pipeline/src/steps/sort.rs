//! SortStep: orders the query by a caller-chosen field.

use tabula_types::{ListError, ListState, Result, StepOptions};

use crate::query::{ListQuery, SortDirection};
use crate::step::Step;

use super::{param_key, scalar_text};

/// Orders by the `sort` parameter (`name` or `-name` for descending) and the
/// optional `order` parameter.
///
/// Options:
/// - `default_sort`, `default_order`: used when the caller asks for nothing
///   or for a field outside `sortable`
/// - `sortable`: allow-list of fields
/// - `sort_param`, `order_param`: parameter keys (default `sort`, `order`)
pub struct SortStep;

impl<Q: ListQuery> Step<Q> for SortStep {
    fn implementation(&self) -> &str {
        "sort"
    }

    fn execute(
        &self,
        state: ListState<Q>,
        step_name: &str,
        options: &StepOptions,
    ) -> Result<ListState<Q>> {
        state.require_accumulator(step_name)?;

        let sort_key = param_key(options, "sort_param", "sort");
        let order_key = param_key(options, "order_param", "order");

        let requested = state
            .params()
            .get(sort_key)
            .and_then(scalar_text)
            .filter(|s| !s.trim().is_empty());
        let requested_order = state.params().get(order_key).and_then(scalar_text);

        let allowed = options.get_str_list("sortable");
        let requested = requested.and_then(|raw| {
            let (field, descending) = match raw.trim().strip_prefix('-') {
                Some(field) => (field.to_string(), true),
                None => (raw.trim().to_string(), false),
            };
            match allowed {
                Some(ref allowed) if !allowed.iter().any(|a| *a == field) => {
                    tracing::warn!(step = %step_name, field = %field, "Sort field not allowed, using default");
                    None
                }
                _ => Some((field, descending)),
            }
        });

        let (field, direction) = match requested {
            Some((field, descending)) => {
                let direction = match requested_order {
                    Some(order) => parse_direction(step_name, &order)?,
                    None if descending => SortDirection::Desc,
                    None => SortDirection::Asc,
                };
                (field, direction)
            }
            None => match options.get_str("default_sort") {
                Some(field) => {
                    let direction = match options.get_str("default_order") {
                        Some(order) => parse_direction(step_name, order)?,
                        None => SortDirection::Asc,
                    };
                    (field.to_string(), direction)
                }
                None => {
                    tracing::debug!(step = %step_name, "No sort requested");
                    return Ok(state);
                }
            },
        };

        tracing::debug!(step = %step_name, field = %field, direction = %direction, "Applying sort");
        let query = state.require_accumulator(step_name)?.clone();
        Ok(state.with_accumulator(query.order_by(&field, direction)))
    }
}

fn parse_direction(step_name: &str, raw: &str) -> Result<SortDirection> {
    raw.parse::<SortDirection>().map_err(|_| ListError::InvalidParameter {
        step: step_name.to_string(),
        message: format!("unknown sort direction '{raw}'"),
    })
}
