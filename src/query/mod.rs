//! Query facade: the narrow interface between the request pipeline and whatever
//! actually stores rows. Rows travel as JSON objects keyed by column name.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::{FilterData, FilterError};

pub use memory::MemoryQueryFacade;
pub use postgres::PgQueryFacade;

pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Row decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Client identification threaded through to mutations; opaque to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientContext {
    pub client: Option<String>,
    pub sdk_version: Option<String>,
    pub app_version: Option<String>,
}

#[async_trait]
pub trait QueryFacade: Send + Sync {
    /// Rows of `class_name` matching the filter. Soft-deleted rows are never returned.
    async fn find(&self, class_name: &str, filter: &FilterData) -> Result<Vec<Row>, QueryError>;

    /// Point lookup; `Ok(None)` when the id does not exist.
    async fn first(&self, class_name: &str, id: i64) -> Result<Option<Row>, QueryError>;

    async fn create(
        &self,
        class_name: &str,
        fields: Row,
        client: &ClientContext,
    ) -> Result<Row, QueryError>;

    async fn update(
        &self,
        class_name: &str,
        id: i64,
        fields: Row,
        client: &ClientContext,
    ) -> Result<Row, QueryError>;

    /// Soft delete; returns `{ id, updated_at, deleted_at }`.
    async fn destroy(
        &self,
        class_name: &str,
        id: i64,
        client: &ClientContext,
    ) -> Result<Row, QueryError>;

    /// Liveness probe run at startup and by `/health`.
    async fn ping(&self) -> Result<(), QueryError>;
}

/// Columns the facade owns; client-supplied values for them are dropped.
pub const SYSTEM_COLUMNS: &[&str] = &["id", "created_at", "updated_at", "deleted_at"];

pub(crate) fn strip_system_columns(mut fields: Row) -> Row {
    for column in SYSTEM_COLUMNS {
        fields.remove(*column);
    }
    fields
}
