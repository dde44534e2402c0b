//! Pagination calculator.
//!
//! Turns a requested page, a page size and a total record count into a
//! [`Pagination`] descriptor. Page numbers may arrive as integers, as
//! numeric text (decoded query strings) or as JSON values.

use serde_json::Value;
use tabula_types::{ListError, Pagination, Result};

/// A page number or page size as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageArg {
    Absent,
    Int(i64),
    /// Unsigned values above `i64::MAX`.
    UInt(u64),
    Text(String),
}

impl PageArg {
    /// Parse into an integer. `Absent` yields `None`; text that is not an
    /// integer is an `InvalidPageInput` error naming `field`.
    pub fn resolve(&self, field: &str) -> Result<Option<i128>> {
        match self {
            PageArg::Absent => Ok(None),
            PageArg::Int(n) => Ok(Some(i128::from(*n))),
            PageArg::UInt(n) => Ok(Some(i128::from(*n))),
            PageArg::Text(s) => {
                s.trim()
                    .parse::<i128>()
                    .map(Some)
                    .map_err(|_| ListError::InvalidPageInput {
                        field: field.to_string(),
                        value: s.clone(),
                    })
            }
        }
    }

    fn display(&self) -> String {
        match self {
            PageArg::Absent => String::new(),
            PageArg::Int(n) => n.to_string(),
            PageArg::UInt(n) => n.to_string(),
            PageArg::Text(s) => s.clone(),
        }
    }
}

macro_rules! page_arg_from_signed {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PageArg {
                fn from(n: $t) -> Self {
                    PageArg::Int(i64::from(n))
                }
            }
        )*
    };
}

macro_rules! page_arg_from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PageArg {
                fn from(n: $t) -> Self {
                    let n = n as u64;
                    i64::try_from(n).map_or(PageArg::UInt(n), PageArg::Int)
                }
            }
        )*
    };
}

page_arg_from_signed!(i32, i64, u32);
page_arg_from_unsigned!(u64, usize);

impl From<&str> for PageArg {
    fn from(s: &str) -> Self {
        PageArg::Text(s.to_string())
    }
}

impl From<String> for PageArg {
    fn from(s: String) -> Self {
        PageArg::Text(s)
    }
}

impl From<&Value> for PageArg {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => PageArg::Absent,
            Value::String(s) => PageArg::Text(s.clone()),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => PageArg::Int(i),
                (None, Some(u)) => PageArg::UInt(u),
                _ => PageArg::Text(n.to_string()),
            },
            other => PageArg::Text(other.to_string()),
        }
    }
}

impl<T: Into<PageArg>> From<Option<T>> for PageArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(PageArg::Absent, Into::into)
    }
}

/// Build the descriptor for `current_page` of a result set of
/// `records_count` rows split into pages of `per_page`.
///
/// `current_page` defaults to 1 when absent and is raised to 1 when lower.
/// It is not clamped to `total_pages`. `per_page` has no default. A page
/// whose bounds do not fit in `u64` is an `InvalidPageInput` error.
pub fn build(
    current_page: impl Into<PageArg>,
    per_page: impl Into<PageArg>,
    records_count: u64,
) -> Result<Pagination> {
    let page_arg = current_page.into();
    let out_of_range = || ListError::InvalidPageInput {
        field: "current_page".into(),
        value: page_arg.display(),
    };
    let current_page = page_arg.resolve("current_page")?.unwrap_or(1).max(1);
    let current_page = u64::try_from(current_page).map_err(|_| out_of_range())?;

    let per_page = match per_page.into() {
        PageArg::Absent => {
            return Err(ListError::MissingOption {
                step: "pagination".into(),
                option: "per_page".into(),
            })
        }
        arg => match arg.resolve("per_page")?.map(u64::try_from) {
            Some(Ok(n)) if n >= 1 => n,
            _ => {
                return Err(ListError::InvalidPageInput {
                    field: "per_page".into(),
                    value: arg.display(),
                })
            }
        },
    };

    let records_offset = (current_page - 1)
        .checked_mul(per_page)
        .ok_or_else(out_of_range)?;
    let total_pages = records_count.div_ceil(per_page);

    if records_count == 0 {
        return Ok(Pagination {
            per_page,
            current_page,
            records_count,
            records_offset,
            total_pages,
            next_page: None,
            previous_page: None,
            records_from: 0,
            records_to: None,
        });
    }

    let next_page = if current_page != total_pages {
        Some(current_page.checked_add(1).ok_or_else(out_of_range)?)
    } else {
        None
    };
    let previous_page = (current_page > 1).then(|| current_page - 1);

    let records_from = records_offset.checked_add(1).ok_or_else(out_of_range)?;

    let records_to = if records_count < per_page || next_page.is_none() {
        records_count
    } else {
        current_page.checked_mul(per_page).ok_or_else(out_of_range)?
    };

    Ok(Pagination {
        per_page,
        current_page,
        records_count,
        records_offset,
        total_pages,
        next_page,
        previous_page,
        records_from,
        records_to: Some(records_to),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_page_of_hundred() {
        let p = build(1, 10, 100).unwrap();
        assert_eq!(p.records_offset, 0);
        assert_eq!(p.records_from, 1);
        assert_eq!(p.records_to, Some(10));
        assert_eq!(p.total_pages, 10);
        assert_eq!(p.previous_page, None);
        assert_eq!(p.next_page, Some(2));
    }

    #[test]
    fn last_page_of_hundred() {
        let p = build(10, 10, 100).unwrap();
        assert_eq!(p.records_offset, 90);
        assert_eq!(p.records_from, 91);
        assert_eq!(p.records_to, Some(100));
        assert_eq!(p.next_page, None);
        assert_eq!(p.previous_page, Some(9));
    }

    #[test]
    fn string_inputs_match_integer_inputs() {
        let from_text = build("2", "10", 100).unwrap();
        let from_int = build(2, 10, 100).unwrap();
        assert_eq!(from_text, from_int);
        assert_eq!(from_text.records_offset, 10);
        assert_eq!(from_text.records_from, 11);
        assert_eq!(from_text.records_to, Some(20));
        assert_eq!(from_text.next_page, Some(3));
        assert_eq!(from_text.previous_page, Some(1));
    }

    #[test]
    fn padded_text_is_trimmed() {
        let p = build(" 3 ", "10 ", 100).unwrap();
        assert_eq!(p.current_page, 3);
        assert_eq!(p.per_page, 10);
    }

    #[test]
    fn zero_records() {
        for page in [1, 2, 7] {
            let p = build(page, 10, 0).unwrap();
            assert_eq!(p.records_from, 0);
            assert_eq!(p.records_to, None);
            assert_eq!(p.total_pages, 0);
            assert_eq!(p.next_page, None);
            assert_eq!(p.previous_page, None);
        }
    }

    #[test]
    fn fewer_records_than_page_size() {
        let p = build(1, 10, 5).unwrap();
        assert_eq!(p.records_to, Some(5));
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.next_page, None);
        assert_eq!(p.previous_page, None);
    }

    #[test]
    fn partial_last_page() {
        let p = build(3, 10, 25).unwrap();
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.records_from, 21);
        assert_eq!(p.records_to, Some(25));
        assert_eq!(p.next_page, None);
    }

    #[test]
    fn absent_current_page_defaults_to_one() {
        let p = build(PageArg::Absent, 10, 100).unwrap();
        assert_eq!(p.current_page, 1);
        let p = build(None::<i64>, 10, 100).unwrap();
        assert_eq!(p.current_page, 1);
    }

    #[test]
    fn current_page_below_one_is_floored() {
        assert_eq!(build(0, 10, 100).unwrap().current_page, 1);
        assert_eq!(build(-4, 10, 100).unwrap().current_page, 1);
        assert_eq!(build("-1", 10, 100).unwrap().records_offset, 0);
    }

    #[test]
    fn page_beyond_total_is_not_clamped() {
        let p = build(5, 10, 20).unwrap();
        assert_eq!(p.current_page, 5);
        assert_eq!(p.records_offset, 40);
        assert_eq!(p.records_from, 41);
        assert_eq!(p.next_page, Some(6));
        assert_eq!(p.previous_page, Some(4));
    }

    #[test]
    fn offset_matches_records_from() {
        for count in [0_u64, 1, 9, 10, 11, 99, 100, 101] {
            for per_page in [1_u64, 3, 10] {
                for page in 1_u64..=12 {
                    let p = build(page, per_page, count).unwrap();
                    assert_eq!(p.records_offset, (page - 1) * per_page);
                    if p.records_from > 0 {
                        assert_eq!(p.records_offset, p.records_from - 1);
                    }
                    if page == 1 {
                        assert_eq!(p.previous_page, None);
                    }
                    if page == p.total_pages {
                        assert_eq!(p.next_page, None);
                    }
                }
            }
        }
    }

    #[test]
    fn missing_per_page_is_configuration_error() {
        let err = build(1, PageArg::Absent, 10).unwrap_err();
        assert!(err.is_configuration(), "got {err:?}");
    }

    #[test]
    fn non_numeric_input_is_rejected() {
        match build("two", 10, 100) {
            Err(ListError::InvalidPageInput { field, value }) => {
                assert_eq!(field, "current_page");
                assert_eq!(value, "two");
            }
            other => panic!("expected InvalidPageInput, got {other:?}"),
        }
        match build(1, "ten", 100) {
            Err(ListError::InvalidPageInput { field, .. }) => assert_eq!(field, "per_page"),
            other => panic!("expected InvalidPageInput, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_per_page_is_rejected() {
        assert!(matches!(
            build(1, 0, 100),
            Err(ListError::InvalidPageInput { .. })
        ));
        assert!(matches!(
            build(1, "-5", 100),
            Err(ListError::InvalidPageInput { .. })
        ));
    }

    #[test]
    fn unrepresentable_page_is_rejected() {
        match build(i64::MAX, 10, 100) {
            Err(ListError::InvalidPageInput { field, value }) => {
                assert_eq!(field, "current_page");
                assert_eq!(value, i64::MAX.to_string());
            }
            other => panic!("expected InvalidPageInput, got {other:?}"),
        }
        assert!(build(u64::MAX, 1, 100).is_err());
        assert!(build("99999999999999999999999", 10, 100).is_err());
    }

    #[test]
    fn largest_representable_page_keeps_offset_invariant() {
        let page = u64::MAX / 10;
        let p = build(page, 10, 100).unwrap();
        assert_eq!(p.records_offset, (page - 1) * 10);
        assert_eq!(p.records_offset, p.records_from - 1);
        assert_eq!(p.records_to, Some(page * 10));
    }

    #[test]
    fn large_unsigned_values_are_integers() {
        assert_eq!(PageArg::from(u64::MAX), PageArg::UInt(u64::MAX));
        assert_eq!(PageArg::from(7_u64), PageArg::Int(7));
        assert_eq!(PageArg::from(&json!(u64::MAX)), PageArg::UInt(u64::MAX));
        assert_eq!(PageArg::UInt(u64::MAX).resolve("per_page").unwrap(), Some(i128::from(u64::MAX)));

        let p = build(1, u64::MAX, 100).unwrap();
        assert_eq!(p.per_page, u64::MAX);
        assert_eq!(p.total_pages, 1);
        assert_eq!(p.records_to, Some(100));
    }

    #[test]
    fn json_values_convert() {
        assert_eq!(PageArg::from(&json!(3)), PageArg::Int(3));
        assert_eq!(PageArg::from(&json!("3")), PageArg::Text("3".into()));
        assert_eq!(PageArg::from(&json!(null)), PageArg::Absent);
        assert!(build(&json!(2.5), 10, 100).is_err());
        assert!(build(1, &json!(true), 100).is_err());
    }

    #[test]
    fn descriptor_serializes_absent_fields_as_null() {
        let p = build(1, 10, 0).unwrap();
        let value = serde_json::to_value(p).unwrap();
        assert_eq!(value["records_to"], json!(null));
        assert_eq!(value["records_from"], json!(0));
    }
}
