//! Filter expression language: parser and evaluator.
//!
//! Grammar:
//! ```text
//! ConditionExpr  ::= Clause ( '&&' Clause )*
//! Clause         ::= Key Operator Literal
//! Key            ::= identifier ( '.' identifier )*
//! Operator       ::= '=' | '!=' | '>' | '>=' | '<' | '<='
//! Literal        ::= QuotedString | BareWord | Number | Boolean
//! ```

use std::cmp::Ordering;

use tabula_types::ListError;

/// A parsed filter consisting of zero or more clauses joined by `&&`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionExpr {
    pub clauses: Vec<Clause>,
}

/// A single comparison clause: `key op value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub key: String,
    pub operator: Operator,
    pub value: String,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl ConditionExpr {
    /// An equality clause, for filters given as `{field: value}` maps.
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            clauses: vec![Clause {
                key: key.into(),
                operator: Operator::Eq,
                value: value.into(),
            }],
        }
    }

    /// Keys referenced by any clause, in order of appearance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().map(|c| c.key.as_str())
    }

    /// Append the clauses of `other`.
    pub fn and(mut self, other: ConditionExpr) -> Self {
        self.clauses.extend(other.clauses);
        self
    }
}

/// Parse a filter string into a [`ConditionExpr`].
///
/// An empty or whitespace-only input produces an expression with zero clauses,
/// which [`evaluate_condition`] treats as always true.
pub fn parse_condition(input: &str) -> Result<ConditionExpr, ListError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(ConditionExpr::default());
    }

    let mut clauses = Vec::new();
    for part in split_clauses(trimmed) {
        let clause = parse_clause(part.trim())?;
        clauses.push(clause);
    }

    Ok(ConditionExpr { clauses })
}

/// Split on `&&` outside quoted regions.
fn split_clauses(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote = None;
    let mut i = 0;
    while i < bytes.len() {
        match (quote, bytes[i]) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b @ (b'"' | b'\'')) => quote = Some(b),
            (None, b'&') if bytes.get(i + 1) == Some(&b'&') => {
                parts.push(&input[start..i]);
                start = i + 2;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&input[start..]);
    parts
}

fn parse_clause(input: &str) -> Result<Clause, ListError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(make_error("empty clause"));
    }

    let (key_end, operator, op_len) = find_operator(input)?;

    let key = input[..key_end].trim().to_string();
    if key.is_empty() {
        return Err(make_error("missing key before operator"));
    }
    for seg in key.split('.') {
        if seg.is_empty() || !seg.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(make_error(&format!("invalid key segment: '{seg}'")));
        }
    }

    let raw_value = input[key_end + op_len..].trim();
    if raw_value.is_empty() {
        return Err(make_error(&format!("missing value after operator in '{input}'")));
    }

    Ok(Clause {
        key,
        operator,
        value: strip_quotes(raw_value),
    })
}

fn find_operator(input: &str) -> Result<(usize, Operator, usize), ListError> {
    // Scan for the first operator, skipping quoted regions.
    let bytes = input.as_bytes();
    let followed_by_eq = |i: usize| i + 1 < bytes.len() && bytes[i + 1] == b'=';
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'!' if followed_by_eq(i) => return Ok((i, Operator::NotEq, 2)),
            b'>' if followed_by_eq(i) => return Ok((i, Operator::Ge, 2)),
            b'<' if followed_by_eq(i) => return Ok((i, Operator::Le, 2)),
            b'>' => return Ok((i, Operator::Gt, 1)),
            b'<' => return Ok((i, Operator::Lt, 1)),
            b'=' => return Ok((i, Operator::Eq, 1)),
            _ => i += 1,
        }
    }
    Err(make_error(&format!("no operator found in '{input}'")))
}

fn strip_quotes(s: &str) -> String {
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
        {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn make_error(msg: &str) -> ListError {
    ListError::FilterSyntax(msg.to_string())
}

/// Compare two textual values, numerically when both parse as finite numbers.
pub fn compare_text(actual: &str, expected: &str) -> Ordering {
    match (actual.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) if a.is_finite() && b.is_finite() => {
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        _ => actual.cmp(expected),
    }
}

/// Evaluate a filter against values provided by a resolver function.
///
/// The `resolve` function maps a key (e.g. `"status"`, `"owner.name"`) to its
/// textual value. Missing keys should resolve to an empty string.
///
/// An expression with zero clauses evaluates to `true`.
pub fn evaluate_condition(expr: &ConditionExpr, resolve: &dyn Fn(&str) -> String) -> bool {
    expr.clauses.iter().all(|clause| {
        let actual = resolve(&clause.key);
        let ordering = compare_text(&actual, &clause.value);
        match clause.operator {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::NotEq => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
        }
    })
}
