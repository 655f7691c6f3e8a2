use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::Filter;
use super::filter_where::FilterWhere;
use super::types::{FilterOp, SortDirection};

/// Evaluates a validated [`Filter`] against in-memory rows with the same
/// semantics the Postgres backend gets from the generated SQL.
pub struct RowMatcher<'a> {
    filter: &'a Filter,
}

impl<'a> RowMatcher<'a> {
    pub fn new(filter: &'a Filter) -> Self {
        Self { filter }
    }

    pub fn matches(&self, row: &Map<String, Value>) -> Result<bool, FilterError> {
        match self.filter.where_data() {
            Some(where_data) => Self::eval(where_data, row),
            None => Ok(true),
        }
    }

    /// Filter, order, page and project `rows`
    pub fn apply(&self, rows: impl IntoIterator<Item = Map<String, Value>>) -> Result<Vec<Map<String, Value>>, FilterError> {
        let mut out = Vec::new();
        for row in rows {
            if self.matches(&row)? {
                out.push(row);
            }
        }

        let order = self.filter.order_data();
        if !order.is_empty() {
            out.sort_by(|a, b| {
                for info in order {
                    let left = a.get(&info.column).unwrap_or(&Value::Null);
                    let right = b.get(&info.column).unwrap_or(&Value::Null);
                    let ord = compare_for_sort(left, right);
                    let ord = if info.sort == SortDirection::Desc { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = self.filter.offset_value().unwrap_or(0).max(0) as usize;
        let limit = self.filter.limit_value().map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        let columns = self.filter.select_columns();
        let project = !columns.is_empty() && !columns.iter().any(|c| c == "*");

        Ok(out
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                if project {
                    columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect()
                } else {
                    row
                }
            })
            .collect())
    }

    fn eval(where_data: &Value, row: &Map<String, Value>) -> Result<bool, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(true),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        };

        for (key, value) in obj {
            let ok = match key.as_str() {
                "$and" => {
                    let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData("$and requires array".to_string()))?;
                    let mut all = true;
                    for v in arr {
                        if !Self::eval(v, row)? { all = false; break; }
                    }
                    all
                }
                "$or" => {
                    let arr = value.as_array().ok_or_else(|| FilterError::InvalidOperatorData("$or requires array".to_string()))?;
                    let mut any = false;
                    for v in arr {
                        if Self::eval(v, row)? { any = true; break; }
                    }
                    any
                }
                "$not" => !Self::eval(value, row)?,
                op if op.starts_with('$') => return Err(FilterError::UnsupportedOperator(op.to_string())),
                field => {
                    let mut all = true;
                    for condition in FilterWhere::parse_field_condition(field, value)? {
                        let actual = row.get(&condition.column).unwrap_or(&Value::Null);
                        if !Self::eval_condition(condition.operator, actual, &condition.data)? {
                            all = false;
                            break;
                        }
                    }
                    all
                }
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn eval_condition(op: FilterOp, actual: &Value, expected: &Value) -> Result<bool, FilterError> {
        Ok(match op {
            // SQL semantics: comparisons against NULL never match, use $null for that
            FilterOp::Eq => {
                if expected.is_null() { actual.is_null() } else { !actual.is_null() && values_equal(actual, expected) }
            }
            FilterOp::Ne => {
                if expected.is_null() { !actual.is_null() } else { !actual.is_null() && !values_equal(actual, expected) }
            }
            FilterOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::Lt => compare(actual, expected) == Some(Ordering::Less),
            FilterOp::Lte => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Like | FilterOp::ILike => {
                let (Some(text), Some(pattern)) = (actual.as_str(), expected.as_str()) else {
                    return Ok(false);
                };
                if op == FilterOp::ILike {
                    like(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like(text, pattern)
                }
            }
            FilterOp::In | FilterOp::NIn => {
                let values = match expected {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                let found = !actual.is_null() && values.iter().any(|v| values_equal(actual, v));
                if op == FilterOp::In { found } else { !actual.is_null() && !found }
            }
            FilterOp::Between => match expected {
                Value::Array(values) if values.len() == 2 => {
                    matches!(compare(actual, &values[0]), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare(actual, &values[1]), Some(Ordering::Less | Ordering::Equal))
                }
                _ => return Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Null => match expected.as_bool() {
                Some(want_null) => actual.is_null() == want_null,
                None => return Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        })
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// NULLs sort last, like Postgres ascending order
fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

/// SQL LIKE with `%` and `_` wildcards
fn like(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
