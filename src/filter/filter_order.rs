use serde_json::Value;

use super::error::FilterError;
use super::types::{is_valid_identifier, FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `[{ "created_at": -1 }, "name", "-score"]`, a single object, or a single string.
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        match order {
            Value::Null => {}
            Value::Array(arr) => {
                for v in arr {
                    out.extend(Self::validate_and_parse(v)?);
                }
            }
            Value::String(s) => out.push(Self::parse_order_string(s)?),
            Value::Object(obj) => {
                for (column, direction) in obj {
                    out.push(FilterOrderInfo {
                        column: Self::checked_column(column)?,
                        sort: Self::parse_direction(direction)?,
                    });
                }
            }
            other => {
                return Err(FilterError::InvalidSort(format!(
                    "unsupported sort value: {}",
                    other
                )))
            }
        }
        Ok(out)
    }

    fn parse_order_string(s: &str) -> Result<FilterOrderInfo, FilterError> {
        let trimmed = s.trim();
        match trimmed.strip_prefix('-') {
            Some(column) => Ok(FilterOrderInfo {
                column: Self::checked_column(column)?,
                sort: SortDirection::Desc,
            }),
            None => Ok(FilterOrderInfo {
                column: Self::checked_column(trimmed)?,
                sort: SortDirection::Asc,
            }),
        }
    }

    fn parse_direction(direction: &Value) -> Result<SortDirection, FilterError> {
        match direction {
            Value::Number(n) if n.as_i64() == Some(-1) => Ok(SortDirection::Desc),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(SortDirection::Asc),
            Value::String(s) if s.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
            Value::String(s) if s.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
            other => Err(FilterError::InvalidSort(format!(
                "direction must be 1, -1, \"asc\" or \"desc\", got {}",
                other
            ))),
        }
    }

    fn checked_column(column: &str) -> Result<String, FilterError> {
        if is_valid_identifier(column) {
            Ok(column.to_string())
        } else {
            Err(FilterError::InvalidColumn(column.to_string()))
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mixed_sort_forms() {
        let infos =
            FilterOrder::validate_and_parse(&json!([{ "created_at": -1 }, "name", "-score"])).unwrap();
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].sort, SortDirection::Desc);
        assert_eq!(infos[1].sort, SortDirection::Asc);
        assert_eq!(infos[2].column, "score");
        assert_eq!(
            FilterOrder::generate(&infos),
            "ORDER BY \"created_at\" DESC, \"name\" ASC, \"score\" DESC"
        );
    }

    #[test]
    fn rejects_bad_direction() {
        assert!(FilterOrder::validate_and_parse(&json!({ "name": 2 })).is_err());
    }
}
