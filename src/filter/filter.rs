use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{is_valid_identifier, FilterData, FilterOrderInfo, FilterWhereInfo, SqlResult};

pub struct Filter {
    table_name: String,
    select_columns: Vec<String>,
    where_conditions: Vec<FilterWhereInfo>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !is_valid_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(table_name));
        }
        Ok(Self {
            table_name,
            select_columns: vec![],
            where_conditions: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn assign(&mut self, data: &FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = &data.select {
            self.select(select)?;
        }
        if let Some(where_clause) = &data.where_clause {
            self.where_conditions = FilterWhere::parse(where_clause)?;
        }
        if let Some(sort) = &data.sort {
            self.order_data = FilterOrder::validate_and_parse(sort)?;
        }
        self.limit(data.limit, data.skip)?;
        Ok(self)
    }

    pub fn select(&mut self, columns: &[String]) -> Result<&mut Self, FilterError> {
        for column in columns {
            if column != "*" && !is_valid_identifier(column) {
                return Err(FilterError::InvalidColumn(column.clone()));
            }
        }
        self.select_columns = columns.to_vec();
        Ok(self)
    }

    // No upper bound here: callers may request unbounded pages
    pub fn limit(&mut self, limit: Option<i64>, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if let Some(l) = limit {
            if l < 0 {
                return Err(FilterError::InvalidLimit("limit must be non-negative".to_string()));
            }
        }
        if let Some(o) = offset {
            if o < 0 {
                return Err(FilterError::InvalidSkip("skip must be non-negative".to_string()));
            }
        }
        self.limit = limit;
        self.offset = offset;
        Ok(self)
    }

    pub fn conditions(&self) -> &[FilterWhereInfo] {
        &self.where_conditions
    }

    pub fn order(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn page(&self) -> (Option<i64>, Option<i64>) {
        (self.limit, self.offset)
    }

    pub fn projection(&self) -> &[String] {
        &self.select_columns
    }

    /// Rows come back as a single `row` json column so callers never map Postgres types by hand.
    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.where_conditions, 0);
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let inner = [
            format!("SELECT {}", self.build_select_clause()),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult {
            query: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner),
            params,
        }
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_projected_paged_query() {
        let mut filter = Filter::new("user").unwrap();
        filter
            .assign(&FilterData {
                select: Some(vec!["id".into(), "password".into()]),
                where_clause: Some(json!({ "username": { "eq": "alice" } })),
                sort: Some(json!([{ "id": 1 }])),
                limit: Some(1),
                skip: Some(0),
            })
            .unwrap();
        let sql = filter.to_sql();
        assert_eq!(
            sql.query,
            "SELECT row_to_json(t) AS row FROM (SELECT \"id\", \"password\" FROM \"user\" \
             WHERE \"deleted_at\" IS NULL AND \"username\" = $1 ORDER BY \"id\" ASC LIMIT 1 OFFSET 0) t"
        );
        assert_eq!(sql.params, vec![json!("alice")]);
    }

    #[test]
    fn rejects_bad_table_names() {
        assert!(Filter::new("").is_err());
        assert!(Filter::new("1users").is_err());
        assert!(Filter::new("users\"; drop").is_err());
        assert!(Filter::new("_session").is_ok());
    }

    #[test]
    fn rejects_negative_page() {
        let mut filter = Filter::new("item").unwrap();
        assert!(filter.limit(Some(-1), None).is_err());
        assert!(filter.limit(Some(10), Some(-5)).is_err());
    }
}
