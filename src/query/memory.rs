use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use super::{strip_system_columns, ClientContext, QueryError, QueryFacade, Row};
use crate::filter::{compare_values, Filter, FilterData, FilterWhere, SortDirection};

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

impl Table {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local facade with the same filter semantics as the Postgres one.
/// Used by tests and by deployments that run without a database.
#[derive(Default)]
pub struct MemoryQueryFacade {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryQueryFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row verbatim. An explicit `id` is kept; otherwise one is allocated.
    pub fn insert(&self, class_name: &str, mut row: Row) -> Row {
        let mut tables = self.tables.write();
        let table = tables.entry(class_name.to_string()).or_default();
        let id = match row.get("id").and_then(Value::as_i64) {
            Some(id) => {
                table.next_id = table.next_id.max(id);
                id
            }
            None => table.allocate_id(),
        };
        let now = Value::String(Utc::now().to_rfc3339());
        row.insert("id".into(), Value::from(id));
        row.entry("created_at").or_insert_with(|| now.clone());
        row.entry("updated_at").or_insert_with(|| now.clone());
        row.entry("deleted_at").or_insert(Value::Null);
        table.rows.insert(id, row.clone());
        row
    }

    /// Raw row including soft-deleted ones; for assertions.
    pub fn get(&self, class_name: &str, id: i64) -> Option<Row> {
        self.tables
            .read()
            .get(class_name)
            .and_then(|t| t.rows.get(&id).cloned())
    }

    fn live_row<'a>(table: &'a mut Table, id: i64) -> Option<&'a mut Row> {
        table
            .rows
            .get_mut(&id)
            .filter(|row| row.get("deleted_at").map_or(true, Value::is_null))
    }
}

#[async_trait]
impl QueryFacade for MemoryQueryFacade {
    async fn find(&self, class_name: &str, data: &FilterData) -> Result<Vec<Row>, QueryError> {
        let mut filter = Filter::new(class_name)?;
        filter.assign(data)?;

        let tables = self.tables.read();
        let Some(table) = tables.get(class_name) else {
            return Ok(vec![]);
        };

        let mut rows: Vec<&Row> = table
            .rows
            .values()
            .filter(|row| FilterWhere::matches(row, filter.conditions()))
            .collect();

        for order in filter.order().iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                match order.sort {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let (limit, skip) = filter.page();
        let skip = skip.unwrap_or(0).max(0) as usize;
        let limit = limit.map_or(usize::MAX, |l| l.max(0) as usize);
        let projection = filter.projection();

        Ok(rows
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|row| project(row, projection))
            .collect())
    }

    async fn first(&self, class_name: &str, id: i64) -> Result<Option<Row>, QueryError> {
        let mut tables = self.tables.write();
        Ok(tables
            .get_mut(class_name)
            .and_then(|t| Self::live_row(t, id))
            .map(|row| row.clone()))
    }

    async fn create(
        &self,
        class_name: &str,
        fields: Row,
        client: &ClientContext,
    ) -> Result<Row, QueryError> {
        Filter::new(class_name)?;
        tracing::debug!(?client, "memory insert into {}", class_name);
        Ok(self.insert(class_name, strip_system_columns(fields)))
    }

    async fn update(
        &self,
        class_name: &str,
        id: i64,
        fields: Row,
        client: &ClientContext,
    ) -> Result<Row, QueryError> {
        tracing::debug!(?client, "memory update {} {}", class_name, id);
        let mut tables = self.tables.write();
        let row = tables
            .get_mut(class_name)
            .and_then(|t| Self::live_row(t, id))
            .ok_or_else(|| QueryError::NotFound(format!("{} {} does not exist", class_name, id)))?;
        for (key, value) in strip_system_columns(fields) {
            row.insert(key, value);
        }
        row.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
        Ok(row.clone())
    }

    async fn destroy(
        &self,
        class_name: &str,
        id: i64,
        client: &ClientContext,
    ) -> Result<Row, QueryError> {
        tracing::debug!(?client, "memory destroy {} {}", class_name, id);
        let mut tables = self.tables.write();
        let row = tables
            .get_mut(class_name)
            .and_then(|t| Self::live_row(t, id))
            .ok_or_else(|| QueryError::NotFound(format!("{} {} does not exist", class_name, id)))?;
        let now = Value::String(Utc::now().to_rfc3339());
        row.insert("updated_at".into(), now.clone());
        row.insert("deleted_at".into(), now.clone());

        let mut out = Row::new();
        out.insert("id".into(), Value::from(id));
        out.insert("updated_at".into(), now.clone());
        out.insert("deleted_at".into(), now);
        Ok(out)
    }

    async fn ping(&self) -> Result<(), QueryError> {
        Ok(())
    }
}

fn project(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return row.clone();
    }
    columns
        .iter()
        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_allocates_ids_and_timestamps() {
        let facade = MemoryQueryFacade::new();
        let ctx = ClientContext::default();
        let a = facade.create("item", fields(json!({ "name": "a", "id": 99 })), &ctx).await.unwrap();
        let b = facade.create("item", fields(json!({ "name": "b" })), &ctx).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert!(a["created_at"].is_string());
        assert!(a["deleted_at"].is_null());
    }

    #[tokio::test]
    async fn find_filters_sorts_and_pages() {
        let facade = MemoryQueryFacade::new();
        for (name, score) in [("a", 3), ("b", 1), ("c", 2), ("d", 5)] {
            facade.insert("item", fields(json!({ "name": name, "score": score })));
        }
        let rows = facade
            .find(
                "item",
                &FilterData {
                    select: Some(vec!["name".into()]),
                    where_clause: Some(json!({ "score": { "gte": 2 } })),
                    sort: Some(json!([{ "score": -1 }])),
                    limit: Some(2),
                    skip: Some(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(rows, vec![fields(json!({ "name": "a" })), fields(json!({ "name": "c" }))]);
    }

    #[tokio::test]
    async fn destroyed_rows_disappear() {
        let facade = MemoryQueryFacade::new();
        let ctx = ClientContext::default();
        facade.insert("item", fields(json!({ "id": 4 })));
        let destroyed = facade.destroy("item", 4, &ctx).await.unwrap();
        assert_eq!(destroyed["id"], json!(4));
        assert!(destroyed["deleted_at"].is_string());
        assert!(facade.first("item", 4).await.unwrap().is_none());
        assert!(facade.find("item", &FilterData::default()).await.unwrap().is_empty());
        assert!(matches!(
            facade.destroy("item", 4, &ctx).await,
            Err(QueryError::NotFound(_))
        ));
        assert!(facade.get("item", 4).is_some());
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let facade = MemoryQueryFacade::new();
        let ctx = ClientContext::default();
        facade.insert("item", fields(json!({ "id": 1, "name": "a", "score": 1 })));
        let row = facade
            .update("item", 1, fields(json!({ "score": 7, "id": 50 })), &ctx)
            .await
            .unwrap();
        assert_eq!(row["id"], json!(1));
        assert_eq!(row["name"], json!("a"));
        assert_eq!(row["score"], json!(7));
        assert!(matches!(
            facade.update("item", 2, Row::new(), &ctx).await,
            Err(QueryError::NotFound(_))
        ));
    }
}
