//! PaginateStep: counts matching records and windows the query to one page.

use serde_json::Value;
use tabula_types::{ListError, ListState, Result, StepOptions};

use crate::pagination::{self, PageArg};
use crate::query::ListQuery;
use crate::step::Step;

use super::param_key;

/// Reads `page` and `per_page` from the parameters, counts the records the
/// query matches, stores the resulting [`Pagination`](tabula_types::Pagination)
/// and restricts the query to that page.
///
/// Options:
/// - `per_page`: page size when the caller gives none
/// - `max_per_page`: upper bound on the page size
/// - `page_param`, `per_page_param`: parameter keys (default `page`, `per_page`)
pub struct PaginateStep;

impl<Q: ListQuery> Step<Q> for PaginateStep {
    fn implementation(&self) -> &str {
        "paginate"
    }

    fn execute(
        &self,
        state: ListState<Q>,
        step_name: &str,
        options: &StepOptions,
    ) -> Result<ListState<Q>> {
        let page_key = param_key(options, "page_param", "page");
        let per_page_key = param_key(options, "per_page_param", "per_page");

        let current_page = state
            .params()
            .get(page_key)
            .map_or(PageArg::Absent, PageArg::from);

        let per_page = match state.params().get(per_page_key) {
            Some(value) if !value.is_null() => PageArg::from(value),
            _ => match options.get("per_page") {
                Some(value) if !value.is_null() => PageArg::from(value),
                _ => {
                    return Err(ListError::MissingOption {
                        step: step_name.to_string(),
                        option: "per_page".into(),
                    })
                }
            },
        };
        let per_page = cap_per_page(step_name, per_page, options.get("max_per_page"))?;

        let query = state.require_accumulator(step_name)?.clone();
        let records_count = query.count()?;
        let page = pagination::build(current_page, per_page, records_count)?;

        tracing::debug!(
            step = %step_name,
            page = page.current_page,
            per_page = page.per_page,
            records = records_count,
            "Paginating"
        );

        let query = query.window(page.records_offset, page.per_page);
        Ok(state.with_accumulator(query).with_pagination(page))
    }
}

fn cap_per_page(step_name: &str, per_page: PageArg, max: Option<&Value>) -> Result<PageArg> {
    let Some(max) = max.filter(|v| !v.is_null()) else {
        return Ok(per_page);
    };
    let max = max
        .as_i64()
        .filter(|m| *m >= 1)
        .ok_or_else(|| ListError::Configuration {
            step: step_name.to_string(),
            message: format!("max_per_page must be a positive integer, got {max}"),
        })?;
    match per_page.resolve("per_page")? {
        Some(n) if n > i128::from(max) => {
            tracing::warn!(step = %step_name, requested = %n, max, "Page size capped");
            Ok(PageArg::Int(max))
        }
        _ => Ok(per_page),
    }
}
