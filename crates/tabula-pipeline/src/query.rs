//! The query-builder seam used by the built-in steps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tabula_types::{Accumulator, ListError, Result};

use crate::condition::ConditionExpr;

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = ListError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(ListError::InvalidParameter {
                step: "sort".into(),
                message: format!("unknown sort direction '{other}'"),
            }),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

/// An unexecuted, composable query over some record store.
///
/// Builder methods consume and return the query so a step can hand back a
/// new accumulator without touching the one it was given. Only `count` and
/// `fetch` perform I/O.
pub trait ListQuery: Accumulator {
    /// Keep only records matching `condition`.
    fn filter(self, condition: &ConditionExpr) -> Self;

    /// Add a sort key. Earlier keys take precedence.
    fn order_by(self, field: &str, direction: SortDirection) -> Self;

    /// Restrict results to `limit` records starting at `offset`.
    fn window(self, offset: u64, limit: u64) -> Self;

    /// Number of matching records, ignoring any window.
    fn count(&self) -> Result<u64>;

    /// Materialize the records selected by this query.
    fn fetch(&self) -> Result<Vec<Self::Record>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!(" asc ".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!(
            "descending".parse::<SortDirection>().unwrap(),
            SortDirection::Desc
        );
    }

    #[test]
    fn unknown_direction_is_input_error() {
        let err = "sideways".parse::<SortDirection>().unwrap_err();
        assert!(err.is_input());
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn direction_display_round_trips() {
        for dir in [SortDirection::Asc, SortDirection::Desc] {
            assert_eq!(dir.to_string().parse::<SortDirection>().unwrap(), dir);
        }
    }
}
