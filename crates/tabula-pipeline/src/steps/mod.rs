//! Built-in steps for any [`ListQuery`](crate::query::ListQuery) accumulator.

pub mod filter;
pub mod paginate;
pub mod retrieve;
pub mod sort;

pub use filter::FilterStep;
pub use paginate::PaginateStep;
pub use retrieve::RetrieveStep;
pub use sort::SortStep;

use serde_json::Value;

/// Read a parameter key from options, falling back to `default`.
pub(crate) fn param_key<'a>(
    options: &'a tabula_types::StepOptions,
    option: &str,
    default: &'a str,
) -> &'a str {
    options.get_str(option).unwrap_or(default)
}

/// Text form of a scalar parameter; `None` for null, maps and arrays.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::{json, Value};
    use tabula_types::{ListState, Params};

    use crate::memory::MemoryQuery;

    pub fn records() -> Vec<Value> {
        (1..=25)
            .map(|i| {
                json!({
                    "id": i,
                    "name": format!("item-{i:02}"),
                    "status": if i % 2 == 0 { "open" } else { "closed" },
                })
            })
            .collect()
    }

    pub fn state_with(params: Params) -> ListState<MemoryQuery> {
        ListState::new(params).with_accumulator(MemoryQuery::new(records()))
    }

    pub fn ids(records: &[Value]) -> Vec<i64> {
        records.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }
}
