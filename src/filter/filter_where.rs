use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{is_valid_identifier, FilterOp, FilterWhereInfo};

/// Soft-deleted rows are never visible through a where clause.
const DELETED_COLUMN: &str = "deleted_at";

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Flatten `{ field: { op: value } }` into a list of AND-ed conditions.
    pub fn parse(where_data: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(vec![]),
            Value::Object(obj) => obj,
            _ => {
                return Err(FilterError::InvalidWhereClause(
                    "where must be an object".to_string(),
                ))
            }
        };

        let mut conditions = Vec::new();
        for (field, value) in obj {
            if !is_valid_identifier(field) {
                return Err(FilterError::InvalidColumn(field.clone()));
            }
            match value {
                Value::Object(ops) => {
                    for (op_key, op_val) in ops {
                        let operator = FilterOp::parse(op_key)?;
                        Self::validate_operand(operator, op_val)?;
                        conditions.push(FilterWhereInfo {
                            column: field.clone(),
                            operator,
                            data: op_val.clone(),
                        });
                    }
                }
                // Implicit equality: { field: value }
                other => conditions.push(FilterWhereInfo {
                    column: field.clone(),
                    operator: FilterOp::Eq,
                    data: other.clone(),
                }),
            }
        }
        Ok(conditions)
    }

    fn validate_operand(operator: FilterOp, data: &Value) -> Result<(), FilterError> {
        match operator {
            FilterOp::In | FilterOp::NIn if !data.is_array() => Err(
                FilterError::InvalidOperatorData("in/nin require an array".to_string()),
            ),
            FilterOp::Exists if !data.is_boolean() => Err(FilterError::InvalidOperatorData(
                "ex requires true or false".to_string(),
            )),
            FilterOp::Like | FilterOp::ILike if !data.is_string() => Err(
                FilterError::InvalidOperatorData("like/ilike require a string".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Build the SQL predicate and its positional parameters.
    pub fn generate(
        conditions: &[FilterWhereInfo],
        starting_param_index: usize,
    ) -> (String, Vec<Value>) {
        let mut filter_where = Self::new(starting_param_index);
        let mut sql_conditions = vec![format!("\"{}\" IS NULL", DELETED_COLUMN)];
        for condition in conditions {
            sql_conditions.push(filter_where.build_sql_condition(condition));
        }
        (sql_conditions.join(" AND "), filter_where.param_values)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        let quoted_column = format!("\"{}\"", condition.column);
        let data = &condition.data;
        match condition.operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", quoted_column),
            FilterOp::Eq => format!("{} = {}", quoted_column, self.param(data.clone())),
            FilterOp::Neq if data.is_null() => format!("{} IS NOT NULL", quoted_column),
            FilterOp::Neq => format!("{} <> {}", quoted_column, self.param(data.clone())),
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = data.as_array().cloned().unwrap_or_default();
                let negate = condition.operator == FilterOp::NIn;
                if values.is_empty() {
                    return if negate { "1=1" } else { "1=0" }.to_string();
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                format!("{} {} ({})", quoted_column, keyword, params.join(", "))
            }
            FilterOp::Exists => {
                if data.as_bool().unwrap_or(true) {
                    format!("{} IS NOT NULL", quoted_column)
                } else {
                    format!("{} IS NULL", quoted_column)
                }
            }
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    /// Evaluate parsed conditions against an in-memory row.
    pub fn matches(row: &Map<String, Value>, conditions: &[FilterWhereInfo]) -> bool {
        if !row.get(DELETED_COLUMN).map_or(true, Value::is_null) {
            return false;
        }
        conditions.iter().all(|c| Self::matches_condition(row, c))
    }

    fn matches_condition(row: &Map<String, Value>, condition: &FilterWhereInfo) -> bool {
        let value = row.get(&condition.column).unwrap_or(&Value::Null);
        let data = &condition.data;
        match condition.operator {
            FilterOp::Eq => values_equal(value, data),
            FilterOp::Neq => !values_equal(value, data),
            FilterOp::Gt => compare_values(value, data) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(
                compare_values(value, data),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => compare_values(value, data) == Some(Ordering::Less),
            FilterOp::Lte => matches!(
                compare_values(value, data),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Like => like(value, data, false),
            FilterOp::ILike => like(value, data, true),
            FilterOp::In => data
                .as_array()
                .map_or(false, |values| values.iter().any(|v| values_equal(value, v))),
            FilterOp::NIn => data
                .as_array()
                .map_or(true, |values| !values.iter().any(|v| values_equal(value, v))),
            FilterOp::Exists => data.as_bool().unwrap_or(true) != value.is_null(),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => compare_values(a, b) == Some(Ordering::Equal),
    }
}

/// Numbers compare numerically, RFC 3339 strings as instants, other strings lexically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_instant(x), parse_instant(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn like(value: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(value), Some(pattern)) = (value.as_str(), pattern.as_str()) else {
        return false;
    };
    if case_insensitive {
        let value: Vec<char> = value.to_lowercase().chars().collect();
        let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
        wildcard(&value, &pattern)
    } else {
        let value: Vec<char> = value.chars().collect();
        let pattern: Vec<char> = pattern.chars().collect();
        wildcard(&value, &pattern)
    }
}

// SQL LIKE semantics: `%` any run, `_` exactly one char
fn wildcard(value: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some(('%', rest)) => (0..=value.len()).any(|i| wildcard(&value[i..], rest)),
        Some(('_', rest)) => !value.is_empty() && wildcard(&value[1..], rest),
        Some((c, rest)) => value.first() == Some(c) && wildcard(&value[1..], rest),
    }
}
