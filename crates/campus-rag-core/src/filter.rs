//! Typed metadata filter expressions.
//!
//! Filters are built as a small expression tree and serialized to the
//! vector store's boolean filter language only at the boundary, so string
//! values are always quoted and escaped.
//!
//! ```rust
//! use campus_rag_core::filter::FilterExpr;
//!
//! let f = FilterExpr::eq("source", "course").and(FilterExpr::ge("credit", 2));
//! assert_eq!(f.to_milvus(), r#"(source == "course") and (credit >= 2)"#);
//! ```
//!
//! The same tree can be evaluated against a JSON record with
//! [`FilterExpr::matches`], which is what the in-memory store uses.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Str(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        FilterValue::Int(v as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl FilterValue {
    fn render(&self) -> String {
        match self {
            FilterValue::Str(s) => quote(s),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Float(f) => f.to_string(),
            FilterValue::Bool(b) => b.to_string(),
        }
    }

    fn compare(&self, actual: &Value) -> Option<Ordering> {
        match (self, actual) {
            (FilterValue::Str(s), Value::String(a)) => Some(a.as_str().cmp(s.as_str())),
            (FilterValue::Int(i), Value::Number(n)) => n.as_f64()?.partial_cmp(&(*i as f64)),
            (FilterValue::Float(f), Value::Number(n)) => n.as_f64()?.partial_cmp(f),
            // Booleans are unordered; a mismatch only needs to be "not equal".
            (FilterValue::Bool(b), Value::Bool(a)) if a == b => Some(Ordering::Equal),
            (FilterValue::Bool(_), Value::Bool(_)) => Some(Ordering::Less),
            _ => None,
        }
    }
}

/// Quote a string literal, escaping backslashes, quotes and line breaks.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A field reference, optionally descending into JSON keys
/// (`meta["time"]["day"]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    path: Vec<String>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Vec::new(),
        }
    }

    /// Descend into a JSON key of this field.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.path.push(key.into());
        self
    }

    fn render(&self) -> String {
        let mut out = self.name.clone();
        for k in &self.path {
            out.push('[');
            out.push_str(&quote(k));
            out.push(']');
        }
        out
    }

    fn lookup<'a>(&self, record: &'a Map<String, Value>) -> Option<&'a Value> {
        let mut cur = record.get(&self.name)?;
        for k in &self.path {
            cur = cur.get(k)?;
        }
        Some(cur)
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::new(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    fn holds(&self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
        }
    }
}

/// Boolean filter over record metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Compare {
        field: Field,
        op: CompareOp,
        value: FilterValue,
    },
    In {
        field: Field,
        values: Vec<FilterValue>,
    },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    pub fn compare(
        field: impl Into<Field>,
        op: CompareOp,
        value: impl Into<FilterValue>,
    ) -> Self {
        FilterExpr::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<Field>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<Field>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt(field: impl Into<Field>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<Field>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn lt(field: impl Into<Field>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<Field>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn is_in<V: Into<FilterValue>>(
        field: impl Into<Field>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        FilterExpr::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(self, other: FilterExpr) -> Self {
        FilterExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: FilterExpr) -> Self {
        FilterExpr::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        FilterExpr::Not(Box::new(self))
    }

    /// Conjunction of all expressions; `None` when the iterator is empty.
    pub fn all(exprs: impl IntoIterator<Item = FilterExpr>) -> Option<FilterExpr> {
        exprs.into_iter().reduce(FilterExpr::and)
    }

    /// Serialize to the Milvus boolean expression syntax.
    pub fn to_milvus(&self) -> String {
        match self {
            FilterExpr::Compare { field, op, value } => {
                format!("{} {} {}", field.render(), op.symbol(), value.render())
            }
            FilterExpr::In { field, values } => {
                let items: Vec<String> = values.iter().map(FilterValue::render).collect();
                format!("{} in [{}]", field.render(), items.join(", "))
            }
            FilterExpr::And(l, r) => format!("({}) and ({})", l.to_milvus(), r.to_milvus()),
            FilterExpr::Or(l, r) => format!("({}) or ({})", l.to_milvus(), r.to_milvus()),
            FilterExpr::Not(e) => format!("not ({})", e.to_milvus()),
        }
    }

    /// Evaluate against a record's stored fields.
    ///
    /// A comparison against a missing field, or between mismatched types,
    /// is false.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        match self {
            FilterExpr::Compare {
                value: FilterValue::Bool(_),
                op,
                ..
            } if !matches!(op, CompareOp::Eq | CompareOp::Ne) => false,
            FilterExpr::Compare { field, op, value } => field
                .lookup(record)
                .and_then(|actual| value.compare(actual))
                .map(|ord| op.holds(ord))
                .unwrap_or(false),
            FilterExpr::In { field, values } => match field.lookup(record) {
                Some(actual) => values
                    .iter()
                    .any(|v| v.compare(actual) == Some(Ordering::Equal)),
                None => false,
            },
            FilterExpr::And(l, r) => l.matches(record) && r.matches(record),
            FilterExpr::Or(l, r) => l.matches(record) || r.matches(record),
            FilterExpr::Not(e) => !e.matches(record),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_milvus())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_simple_eq() {
        assert_eq!(
            FilterExpr::eq("source", "course").to_milvus(),
            r#"source == "course""#
        );
    }

    #[test]
    fn test_render_escapes_quotes() {
        let f = FilterExpr::eq("source", r#"course" or source != "x"#);
        assert_eq!(f.to_milvus(), r#"source == "course\" or source != \"x""#);
    }

    #[test]
    fn test_render_composite() {
        let f = FilterExpr::is_in("source", ["course", "teacher"])
            .or(FilterExpr::gt(Field::new("meta").key("day"), 3).negate());
        assert_eq!(
            f.to_milvus(),
            r#"(source in ["course", "teacher"]) or (not (meta["day"] > 3))"#
        );
    }

    #[test]
    fn test_all_empty_is_none() {
        assert!(FilterExpr::all(Vec::new()).is_none());
        let f = FilterExpr::all(vec![
            FilterExpr::eq("a", 1),
            FilterExpr::eq("b", true),
        ])
        .unwrap();
        assert_eq!(f.to_milvus(), "(a == 1) and (b == true)");
    }

    #[test]
    fn test_matches_strings_and_numbers() {
        let r = record(json!({ "source": "course", "credit": 2, "meta": { "day": 5 } }));
        assert!(FilterExpr::eq("source", "course").matches(&r));
        assert!(!FilterExpr::eq("source", "manual").matches(&r));
        assert!(FilterExpr::ge("credit", 2).matches(&r));
        assert!(FilterExpr::lt("credit", 2.5).matches(&r));
        assert!(FilterExpr::gt(Field::new("meta").key("day"), 4).matches(&r));
        assert!(FilterExpr::is_in("source", ["manual", "course"]).matches(&r));
    }

    #[test]
    fn test_matches_missing_field_is_false() {
        let r = record(json!({ "source": "course" }));
        assert!(!FilterExpr::eq("title", "x").matches(&r));
        assert!(!FilterExpr::ne("title", "x").matches(&r));
        assert!(FilterExpr::eq("title", "x").negate().matches(&r));
    }

    #[test]
    fn test_matches_type_mismatch_is_false() {
        let r = record(json!({ "credit": "2" }));
        assert!(!FilterExpr::eq("credit", 2).matches(&r));
    }
}
