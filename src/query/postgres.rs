use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgArguments, postgres::PgPoolOptions, PgPool, Row as _};
use std::time::Duration;
use tracing::info;

use super::{strip_system_columns, ClientContext, QueryError, QueryFacade, Row};
use crate::filter::{is_valid_identifier, Filter, FilterData, FilterError};

/// One table per class name, rows returned through `row_to_json`.
#[derive(Clone)]
pub struct PgQueryFacade {
    pool: PgPool,
}

impl PgQueryFacade {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connection_timeout: u64,
    ) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connection_timeout))
            .connect_lazy(database_url)
            .map_err(|e| QueryError::ConnectionError(e.to_string()))?;
        info!("Created database pool (max {} connections)", max_connections);
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_row(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, QueryError> {
        let mut q = sqlx::query(sql);
        for p in params {
            q = bind_param(q, p);
        }
        match q.fetch_optional(&self.pool).await? {
            Some(row) => Ok(Some(decode_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QueryFacade for PgQueryFacade {
    async fn find(&self, class_name: &str, filter: &FilterData) -> Result<Vec<Row>, QueryError> {
        let mut builder = Filter::new(class_name)?;
        builder.assign(filter)?;
        let sql_result = builder.to_sql();

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn first(&self, class_name: &str, id: i64) -> Result<Option<Row>, QueryError> {
        let filter = FilterData {
            where_clause: Some(serde_json::json!({ "id": { "eq": id } })),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.find(class_name, &filter).await?.into_iter().next())
    }

    async fn create(
        &self,
        class_name: &str,
        fields: Row,
        client: &ClientContext,
    ) -> Result<Row, QueryError> {
        check_identifier(class_name, FilterError::InvalidTableName)?;
        let fields = strip_system_columns(fields);
        tracing::debug!(?client, "insert into {}", class_name);

        let mut columns = Vec::with_capacity(fields.len() + 2);
        let mut placeholders = Vec::with_capacity(fields.len() + 2);
        let mut params = Vec::with_capacity(fields.len());
        for (column, value) in fields {
            check_identifier(&column, FilterError::InvalidColumn)?;
            params.push(value);
            columns.push(format!("\"{}\"", column));
            placeholders.push(format!("${}", params.len()));
        }
        columns.extend(["\"created_at\"".to_string(), "\"updated_at\"".to_string()]);
        placeholders.extend(["now()".to_string(), "now()".to_string()]);

        let sql = format!(
            "WITH inserted AS (INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING *) \
             SELECT row_to_json(inserted) AS row FROM inserted",
            class_name,
            columns.join(", "),
            placeholders.join(", ")
        );
        self.fetch_row(&sql, &params)
            .await?
            .ok_or_else(|| QueryError::Decode(format!("insert into {} returned no row", class_name)))
    }

    async fn update(
        &self,
        class_name: &str,
        id: i64,
        fields: Row,
        client: &ClientContext,
    ) -> Result<Row, QueryError> {
        check_identifier(class_name, FilterError::InvalidTableName)?;
        let fields = strip_system_columns(fields);
        tracing::debug!(?client, "update {} {}", class_name, id);

        let mut assignments = Vec::with_capacity(fields.len() + 1);
        let mut params = Vec::with_capacity(fields.len() + 1);
        for (column, value) in fields {
            check_identifier(&column, FilterError::InvalidColumn)?;
            params.push(value);
            assignments.push(format!("\"{}\" = ${}", column, params.len()));
        }
        assignments.push("\"updated_at\" = now()".to_string());
        params.push(Value::from(id));

        let sql = format!(
            "WITH updated AS (UPDATE \"{}\" SET {} WHERE \"id\" = ${} AND \"deleted_at\" IS NULL RETURNING *) \
             SELECT row_to_json(updated) AS row FROM updated",
            class_name,
            assignments.join(", "),
            params.len()
        );
        self.fetch_row(&sql, &params)
            .await?
            .ok_or_else(|| QueryError::NotFound(format!("{} {} does not exist", class_name, id)))
    }

    async fn destroy(
        &self,
        class_name: &str,
        id: i64,
        client: &ClientContext,
    ) -> Result<Row, QueryError> {
        check_identifier(class_name, FilterError::InvalidTableName)?;
        tracing::debug!(?client, "destroy {} {}", class_name, id);

        let sql = format!(
            "WITH destroyed AS (UPDATE \"{}\" SET \"deleted_at\" = now(), \"updated_at\" = now() \
             WHERE \"id\" = $1 AND \"deleted_at\" IS NULL RETURNING \"id\", \"updated_at\", \"deleted_at\") \
             SELECT row_to_json(destroyed) AS row FROM destroyed",
            class_name
        );
        self.fetch_row(&sql, &[Value::from(id)])
            .await?
            .ok_or_else(|| QueryError::NotFound(format!("{} {} does not exist", class_name, id)))
    }

    async fn ping(&self) -> Result<(), QueryError> {
        sqlx::query("SELECT 1+1 AS result")
            .execute(&self.pool)
            .await
            .map_err(|e| QueryError::ConnectionError(e.to_string()))?;
        Ok(())
    }
}

fn check_identifier(name: &str, err: fn(String) -> FilterError) -> Result<(), QueryError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(err(name.to_string()).into())
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Row, QueryError> {
    match row.try_get::<Value, _>("row")? {
        Value::Object(map) => Ok(map),
        other => Err(QueryError::Decode(format!("unexpected row format: {}", other))),
    }
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        // Timestamps arrive as RFC 3339 text; bind them typed so comparisons against timestamptz work
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => q.bind(dt.with_timezone(&Utc)),
            Err(_) => q.bind(s.as_str()),
        },
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
