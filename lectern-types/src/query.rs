//! Query clauses.
//!
//! A [`Where`] is the filter language shared by access predicates and the
//! persistence layer. Access predicates return one to narrow what a caller
//! may see; the orchestrator `AND`-combines it with id equality and hands
//! the result to the store. [`Where::matches`] evaluates a clause against a
//! stored document for stores that filter in memory.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operator of a single field condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
    Like,
}

/// A condition on one dotted field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub path: String,
    pub operator: Operator,
    pub value: Value,
}

/// A boolean combination of field conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Where {
    And(Vec<Where>),
    Or(Vec<Where>),
    Field(FieldCondition),
}

impl Where {
    /// Condition on `path` with an arbitrary operator.
    pub fn field(path: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::Field(FieldCondition {
            path: path.into(),
            operator,
            value: value.into(),
        })
    }

    /// Shorthand for an `equals` condition.
    pub fn equals(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(path, Operator::Equals, value)
    }

    pub fn and(clauses: Vec<Where>) -> Self {
        Self::And(clauses)
    }

    pub fn or(clauses: Vec<Where>) -> Self {
        Self::Or(clauses)
    }

    /// Returns `self AND other`, extending an existing top-level `And`
    /// instead of nesting.
    #[must_use]
    pub fn and_also(self, other: Where) -> Self {
        match self {
            Self::And(mut clauses) => {
                clauses.push(other);
                Self::And(clauses)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Rewrites every field path with `f`, preserving structure.
    #[must_use]
    pub fn map_paths(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::And(clauses) => Self::And(clauses.iter().map(|c| c.map_paths(f)).collect()),
            Self::Or(clauses) => Self::Or(clauses.iter().map(|c| c.map_paths(f)).collect()),
            Self::Field(cond) => Self::Field(FieldCondition {
                path: f(&cond.path),
                operator: cond.operator,
                value: cond.value.clone(),
            }),
        }
    }

    /// Evaluates the clause against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
            Self::Field(cond) => cond.matches(doc),
        }
    }
}

impl FieldCondition {
    pub fn matches(&self, doc: &Value) -> bool {
        let candidates = resolve_path(doc, &self.path);

        match self.operator {
            Operator::Exists => {
                let wanted = self.value.as_bool().unwrap_or(true);
                let present = candidates.iter().any(|v| !v.is_null());
                present == wanted
            }
            Operator::NotEquals => !candidates.iter().any(|v| loose_eq(v, &self.value)),
            Operator::NotIn => {
                let options = as_list(&self.value);
                !candidates
                    .iter()
                    .any(|v| options.iter().any(|o| loose_eq(v, o)))
            }
            Operator::Equals => candidates.iter().any(|v| loose_eq(v, &self.value)),
            Operator::In => {
                let options = as_list(&self.value);
                candidates
                    .iter()
                    .any(|v| options.iter().any(|o| loose_eq(v, o)))
            }
            Operator::GreaterThan => self.any_ordering(&candidates, |o| o == Ordering::Greater),
            Operator::GreaterThanEquals => {
                self.any_ordering(&candidates, |o| o != Ordering::Less)
            }
            Operator::LessThan => self.any_ordering(&candidates, |o| o == Ordering::Less),
            Operator::LessThanEquals => {
                self.any_ordering(&candidates, |o| o != Ordering::Greater)
            }
            Operator::Like => {
                let Some(needle) = self.value.as_str() else {
                    return false;
                };
                let words: Vec<String> =
                    needle.split_whitespace().map(str::to_lowercase).collect();
                candidates.iter().any(|v| match v.as_str() {
                    Some(hay) => {
                        let hay = hay.to_lowercase();
                        words.iter().all(|w| hay.contains(w.as_str()))
                    }
                    None => false,
                })
            }
        }
    }

    fn any_ordering(&self, candidates: &[&Value], accept: impl Fn(Ordering) -> bool) -> bool {
        candidates
            .iter()
            .filter_map(|v| compare(v, &self.value))
            .any(accept)
    }
}

/// Collects every value reachable at a dotted path. Arrays crossed in the
/// middle of a path fan out over their elements; an array at the end of the
/// path contributes both itself and its elements, so `equals` on a has-many
/// field matches any member.
fn resolve_path<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];

    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(segment) {
                        next.push(v);
                    }
                }
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(index) => {
                        if let Some(v) = items.get(index) {
                            next.push(v);
                        }
                    }
                    Err(_) => {
                        for item in items {
                            if let Some(v) = item.as_object().and_then(|m| m.get(segment)) {
                                next.push(v);
                            }
                        }
                    }
                },
                _ => {}
            }
        }
        current = next;
    }

    let mut resolved = Vec::with_capacity(current.len());
    for value in current {
        resolved.push(value);
        if let Value::Array(items) = value {
            resolved.extend(items.iter());
        }
    }
    resolved
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => false,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
