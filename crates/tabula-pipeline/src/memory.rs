//! In-memory query over JSON records, and the base step that installs it.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;
use tabula_types::{Accumulator, ListState, Result, StepOptions};

use crate::condition::{evaluate_condition, ConditionExpr};
use crate::query::{ListQuery, SortDirection};
use crate::step::Step;

/// A lazy query over a shared vector of JSON records.
///
/// Filters, sort keys and the window are only applied by `count` and `fetch`.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryQuery {
    records: Arc<Vec<Value>>,
    conditions: Vec<ConditionExpr>,
    order: Vec<(String, SortDirection)>,
    window: Option<(u64, u64)>,
}

impl MemoryQuery {
    pub fn new(records: Vec<Value>) -> Self {
        Self::from_shared(Arc::new(records))
    }

    pub fn from_shared(records: Arc<Vec<Value>>) -> Self {
        Self {
            records,
            conditions: Vec::new(),
            order: Vec::new(),
            window: None,
        }
    }

    pub fn order(&self) -> &[(String, SortDirection)] {
        &self.order
    }

    pub fn window_bounds(&self) -> Option<(u64, u64)> {
        self.window
    }

    fn matches(&self, record: &Value) -> bool {
        let resolve = |key: &str| field_text(record, key);
        self.conditions
            .iter()
            .all(|cond| evaluate_condition(cond, &resolve))
    }
}

impl Accumulator for MemoryQuery {
    type Record = Value;
}

impl ListQuery for MemoryQuery {
    fn filter(mut self, condition: &ConditionExpr) -> Self {
        self.conditions.push(condition.clone());
        self
    }

    fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order.push((field.to_string(), direction));
        self
    }

    fn window(mut self, offset: u64, limit: u64) -> Self {
        self.window = Some((offset, limit));
        self
    }

    fn count(&self) -> Result<u64> {
        Ok(self.records.iter().filter(|r| self.matches(r)).count() as u64)
    }

    fn fetch(&self) -> Result<Vec<Value>> {
        let mut rows: Vec<&Value> = self.records.iter().filter(|r| self.matches(r)).collect();

        if !self.order.is_empty() {
            rows.sort_by(|a, b| {
                self.order
                    .iter()
                    .map(|(field, direction)| {
                        let ord = compare_values(lookup(a, field), lookup(b, field));
                        match direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let (offset, limit) = self.window.unwrap_or((0, u64::MAX));
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).cloned().collect())
    }
}

/// Resolve a dotted path (`"owner.name"`) inside a record.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |value, seg| value.get(seg))
}

fn field_text(record: &Value, path: &str) -> String {
    match lookup(record, path) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over optional JSON values: missing and null first, then
/// booleans, numbers, strings, arrays and objects.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) if type_rank(a) >= 4 && type_rank(a) == type_rank(b) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// ---------------------------------------------------------------------------
// MemoryBase: installs a MemoryQuery as the accumulator
// ---------------------------------------------------------------------------

/// Base step that starts every list from the same shared record set.
#[derive(Debug, Clone)]
pub struct MemoryBase {
    records: Arc<Vec<Value>>,
}

impl MemoryBase {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }
}

impl Step<MemoryQuery> for MemoryBase {
    fn implementation(&self) -> &str {
        "base"
    }

    fn execute(
        &self,
        state: ListState<MemoryQuery>,
        step_name: &str,
        _options: &StepOptions,
    ) -> Result<ListState<MemoryQuery>> {
        tracing::debug!(step = %step_name, records = self.records.len(), "Installing in-memory query");
        Ok(state.with_accumulator(MemoryQuery::from_shared(Arc::clone(&self.records))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parse_condition;
    use serde_json::json;
    use tabula_types::Params;

    fn people() -> Vec<Value> {
        vec![
            json!({"name": "cy", "age": 41, "team": {"name": "blue"}}),
            json!({"name": "ada", "age": 36, "team": {"name": "red"}}),
            json!({"name": "bo", "age": 36, "team": {"name": "blue"}}),
            json!({"name": "di"}),
        ]
    }

    fn names(rows: &[Value]) -> Vec<&str> {
        rows.iter().map(|r| r["name"].as_str().unwrap()).collect()
    }

    #[test]
    fn fetch_without_operations_returns_everything_in_order() {
        let rows = MemoryQuery::new(people()).fetch().unwrap();
        assert_eq!(names(&rows), vec!["cy", "ada", "bo", "di"]);
    }

    #[test]
    fn multi_key_sort_is_stable_and_puts_missing_first() {
        let rows = MemoryQuery::new(people())
            .order_by("age", SortDirection::Asc)
            .order_by("name", SortDirection::Desc)
            .fetch()
            .unwrap();
        assert_eq!(names(&rows), vec!["di", "bo", "ada", "cy"]);
    }

    #[test]
    fn sort_by_nested_field() {
        let rows = MemoryQuery::new(people())
            .order_by("team.name", SortDirection::Desc)
            .fetch()
            .unwrap();
        assert_eq!(names(&rows), vec!["ada", "cy", "bo", "di"]);
    }

    #[test]
    fn count_applies_filters_but_not_window() {
        let query = MemoryQuery::new(people())
            .filter(&parse_condition("team.name=blue").unwrap())
            .window(0, 1);
        assert_eq!(query.count().unwrap(), 2);
        assert_eq!(query.fetch().unwrap().len(), 1);
    }

    #[test]
    fn window_skips_and_limits() {
        let rows = MemoryQuery::new(people())
            .order_by("name", SortDirection::Asc)
            .window(1, 2)
            .fetch()
            .unwrap();
        assert_eq!(names(&rows), vec!["bo", "cy"]);
    }

    #[test]
    fn window_past_end_is_empty() {
        let rows = MemoryQuery::new(people()).window(10, 5).fetch().unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn numeric_filters_use_number_comparison() {
        let rows = MemoryQuery::new(people())
            .filter(&parse_condition("age>=37").unwrap())
            .fetch()
            .unwrap();
        assert_eq!(names(&rows), vec!["cy"]);
    }

    #[test]
    fn compare_values_orders_across_types() {
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2)), Some(&json!(10))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!(1)), Some(&json!("1"))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(null)), None), Ordering::Equal);
    }

    #[test]
    fn base_step_installs_query() {
        let base = MemoryBase::new(people());
        let state = base
            .execute(ListState::new(Params::new()), "base", &StepOptions::new())
            .unwrap();
        assert_eq!(state.accumulator().unwrap().count().unwrap(), 4);
    }
}
