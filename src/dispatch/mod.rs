//! Generic find/first/create/update/destroy over a registered model.
//!
//! Reads are projected to the model's viewable keys; writes are narrowed to its
//! actionable keys. Pointer keys are stored in `<key>_id` columns and rendered
//! as `{ "type": "Pointer", "className", "id" }`.

use serde_json::{json, Map, Value};

use crate::error::WarpError;
use crate::filter::FilterData;
use crate::query::{ClientContext, QueryFacade, Row, SYSTEM_COLUMNS};
use crate::registry::{pointer_column, BoundModel, ModelDefinition, ModelKind, ModelRegistry};
use crate::security::PasswordHasher;

pub const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct FindOptions {
    pub include: Vec<String>,
    pub where_clause: Value,
    pub sort: Value,
    pub limit: i64,
    pub skip: i64,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            include: vec![],
            where_clause: Value::Object(Map::new()),
            sort: Value::Array(vec![]),
            limit: DEFAULT_LIMIT,
            skip: 0,
        }
    }
}

pub struct ResourceDispatcher<'a> {
    model: &'a BoundModel,
    kind: ModelKind,
    registry: &'a ModelRegistry,
    hasher: &'a PasswordHasher,
}

impl<'a> ResourceDispatcher<'a> {
    pub fn new(
        model: &'a BoundModel,
        kind: ModelKind,
        registry: &'a ModelRegistry,
        hasher: &'a PasswordHasher,
    ) -> Self {
        Self {
            model,
            kind,
            registry,
            hasher,
        }
    }

    pub fn class_name(&self) -> &'a str {
        self.model.class_name()
    }

    pub(crate) fn query(&self) -> &'a dyn QueryFacade {
        self.model.query.as_ref()
    }

    fn definition(&self) -> &'a ModelDefinition {
        &self.model.definition
    }

    pub async fn find(&self, options: &FindOptions) -> Result<Vec<Value>, WarpError> {
        let filter = FilterData {
            select: Some(self.read_columns()),
            where_clause: Some(self.rewrite_where(&options.where_clause)?),
            sort: Some(options.sort.clone()),
            limit: Some(options.limit),
            skip: Some(options.skip),
        };
        let rows = self.query().find(self.class_name(), &filter).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.render(&row, &options.include).await?);
        }
        Ok(out)
    }

    /// `Ok(None)` when the id does not exist.
    pub async fn first(&self, id: i64, include: &[String]) -> Result<Option<Value>, WarpError> {
        match self.query().first(self.class_name(), id).await? {
            Some(row) => Ok(Some(self.render(&row, include).await?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, fields: Row, client: &ClientContext) -> Result<Value, WarpError> {
        let fields = self.prepare_write(fields).await?;
        let row = self.query().create(self.class_name(), fields, client).await?;
        self.render(&row, &[]).await
    }

    pub async fn update(&self, id: i64, fields: Row, client: &ClientContext) -> Result<Value, WarpError> {
        let fields = self.prepare_write(fields).await?;
        let row = self.query().update(self.class_name(), id, fields, client).await?;
        self.render(&row, &[]).await
    }

    pub async fn destroy(&self, id: i64, client: &ClientContext) -> Result<Value, WarpError> {
        let row = self.query().destroy(self.class_name(), id, client).await?;
        Ok(Value::Object(row))
    }

    /// User sign-up. Username is checked before email so a request that
    /// collides on both reports `UsernameTaken`.
    pub async fn create_user(&self, fields: Row, client: &ClientContext) -> Result<Value, WarpError> {
        let missing = |key: &str| {
            fields
                .get(key)
                .map_or(true, |v| v.is_null() || v.as_str() == Some(""))
        };
        if missing("username") || missing("password") || missing("email") {
            return Err(WarpError::invalid_credentials("Missing credentials"));
        }

        if self.is_taken("username", &fields["username"]).await? {
            return Err(WarpError::UsernameTaken);
        }
        if self.is_taken("email", &fields["email"]).await? {
            return Err(WarpError::EmailTaken);
        }
        self.create(fields, client).await
    }

    async fn is_taken(&self, key: &str, value: &Value) -> Result<bool, WarpError> {
        let filter = FilterData {
            select: Some(vec!["id".to_string()]),
            where_clause: Some(json!({ key: { "eq": value } })),
            limit: Some(1),
            ..Default::default()
        };
        Ok(!self.query().find(self.class_name(), &filter).await?.is_empty())
    }

    pub fn keys(&self) -> Value {
        let keys = &self.definition().keys;
        let mut out = json!({
            "viewable": keys.viewable,
            "actionable": keys.actionable,
        });
        if !keys.pointers.is_empty() {
            out["pointers"] = json!(keys.pointers);
        }
        out
    }

    fn read_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = SYSTEM_COLUMNS.iter().map(|c| c.to_string()).collect();
        for key in &self.definition().keys.viewable {
            let column = match self.definition().pointer_class(key) {
                Some(_) => pointer_column(key),
                None => key.clone(),
            };
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    /// Only system columns and viewable keys may appear in `where`.
    fn is_filterable(&self, key: &str) -> bool {
        SYSTEM_COLUMNS.contains(&key) || self.definition().keys.viewable.iter().any(|k| k == key)
    }

    fn rewrite_where(&self, where_clause: &Value) -> Result<Value, WarpError> {
        let obj = match where_clause {
            Value::Null => return Ok(Value::Object(Map::new())),
            Value::Object(obj) => obj,
            _ => return Err(WarpError::invalid_parameter("where must be an object")),
        };
        let mut out = Map::with_capacity(obj.len());
        for (key, condition) in obj {
            if !self.is_filterable(key) {
                tracing::debug!("Rejected filter on {}.{}", self.class_name(), key);
                return Err(WarpError::invalid_parameter(format!("Cannot filter on {}", key)));
            }
            if self.definition().pointer_class(key).is_none() {
                out.insert(key.clone(), condition.clone());
                continue;
            }
            let condition = match condition {
                Value::Object(ops) if !is_pointer(condition) => Value::Object(
                    ops.iter()
                        .map(|(op, v)| (op.clone(), pointer_operand(v)))
                        .collect(),
                ),
                other => pointer_operand(other),
            };
            out.insert(pointer_column(key), condition);
        }
        Ok(Value::Object(out))
    }

    async fn prepare_write(&self, fields: Row) -> Result<Row, WarpError> {
        let mut out = Row::with_capacity(fields.len());
        for (key, value) in fields {
            if !self.definition().is_actionable(&key) {
                tracing::debug!("Dropping non-actionable key {}.{}", self.class_name(), key);
                continue;
            }
            if self.definition().pointer_class(&key).is_some() {
                out.insert(pointer_column(&key), pointer_operand(&value));
            } else if key == "password" && self.kind == ModelKind::User {
                let hashed = match value.as_str() {
                    Some(plain) => Value::String(self.hasher.hash(plain).await?),
                    None => return Err(WarpError::invalid_parameter("password must be a string")),
                };
                out.insert(key, hashed);
            } else {
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    fn render_plain(&self, row: &Row) -> Map<String, Value> {
        let mut out = Map::new();
        for column in ["id", "created_at", "updated_at"] {
            out.insert(column.to_string(), row.get(column).cloned().unwrap_or(Value::Null));
        }
        if let Some(deleted_at) = row.get("deleted_at").filter(|v| !v.is_null()) {
            out.insert("deleted_at".to_string(), deleted_at.clone());
        }

        for key in &self.definition().keys.viewable {
            let value = match self.definition().pointer_class(key) {
                Some(class_name) => match row.get(&pointer_column(key)) {
                    Some(id) if !id.is_null() => json!({
                        "type": "Pointer",
                        "className": class_name,
                        "id": id,
                    }),
                    _ => Value::Null,
                },
                None => row.get(key).cloned().unwrap_or(Value::Null),
            };
            out.insert(key.clone(), value);
        }
        out
    }

    /// Project a stored row; pointers named in `include` are merged with the
    /// target's viewable fields.
    pub(crate) async fn render(&self, row: &Row, include: &[String]) -> Result<Value, WarpError> {
        let mut out = self.render_plain(row);
        for key in include {
            let Some(class_name) = self.definition().pointer_class(key) else {
                continue;
            };
            let Some(id) = row.get(&pointer_column(key)).and_then(Value::as_i64) else {
                continue;
            };
            let Some((kind, target)) = self.registry.lookup(class_name) else {
                tracing::warn!("Pointer {}.{} references unregistered class {}", self.class_name(), key, class_name);
                continue;
            };
            let target = ResourceDispatcher::new(target, kind, self.registry, self.hasher);
            if let Some(target_row) = target.query().first(class_name, id).await? {
                if let Some(Value::Object(pointer)) = out.get_mut(key) {
                    for (field, value) in target.render_plain(&target_row) {
                        pointer.entry(field).or_insert(value);
                    }
                }
            }
        }
        Ok(Value::Object(out))
    }
}

fn is_pointer(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("Pointer")
}

/// `{ type: "Pointer", id }` collapses to its id; arrays are mapped element-wise.
fn pointer_operand(value: &Value) -> Value {
    match value {
        Value::Object(obj) if is_pointer(value) => obj.get("id").cloned().unwrap_or(Value::Null),
        Value::Array(items) => Value::Array(items.iter().map(pointer_operand).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MemoryQueryFacade;
    use std::sync::Arc;

    fn registry(query: Arc<MemoryQueryFacade>) -> ModelRegistry {
        let bind = |definition: ModelDefinition| BoundModel {
            definition: Arc::new(definition),
            query: query.clone(),
        };
        let mut registry = ModelRegistry::new();
        registry.register(bind(
            ModelDefinition::new("comment")
                .viewable(["body", "author"])
                .actionable(["body", "author"])
                .pointer("author", "user"),
        ));
        registry.register_auth_models(
            Some(bind(ModelDefinition::default_user())),
            Some(bind(ModelDefinition::default_session())),
        );
        registry
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn renders_pointers_and_includes() {
        let query = Arc::new(MemoryQueryFacade::new());
        query.insert("user", row(json!({ "id": 7, "username": "alice", "email": "a@x.io", "password": "h" })));
        query.insert("comment", row(json!({ "id": 1, "body": "hi", "author_id": 7 })));
        let registry = registry(query);
        let hasher = PasswordHasher::new(crate::security::TEST_COST);
        let comments = ResourceDispatcher::new(registry.resolve("comment").unwrap(), ModelKind::Generic, &registry, &hasher);

        let plain = comments.first(1, &[]).await.unwrap().unwrap();
        assert_eq!(plain["author"], json!({ "type": "Pointer", "className": "user", "id": 7 }));
        assert!(plain.get("author_id").is_none());

        let included = comments.first(1, &["author".to_string()]).await.unwrap().unwrap();
        assert_eq!(included["author"]["username"], "alice");
        assert_eq!(included["author"]["type"], "Pointer");
        assert!(included["author"].get("password").is_none());
    }

    #[tokio::test]
    async fn where_on_pointer_uses_id_column() {
        let query = Arc::new(MemoryQueryFacade::new());
        query.insert("comment", row(json!({ "body": "a", "author_id": 7 })));
        query.insert("comment", row(json!({ "body": "b", "author_id": 8 })));
        let registry = registry(query);
        let hasher = PasswordHasher::new(crate::security::TEST_COST);
        let comments = ResourceDispatcher::new(registry.resolve("comment").unwrap(), ModelKind::Generic, &registry, &hasher);

        let found = comments
            .find(&FindOptions {
                where_clause: json!({ "author": { "eq": { "type": "Pointer", "className": "user", "id": 8 } } }),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["body"], "b");
    }

    #[tokio::test]
    async fn where_on_hidden_column_is_rejected() {
        let query = Arc::new(MemoryQueryFacade::new());
        query.insert("user", row(json!({ "id": 1, "username": "alice", "password": "$2b$04$abc" })));
        let registry = registry(query);
        let hasher = PasswordHasher::new(crate::security::TEST_COST);
        let users = ResourceDispatcher::new(registry.user().unwrap(), ModelKind::User, &registry, &hasher);

        let hidden = users
            .find(&FindOptions {
                where_clause: json!({ "password": { "like": "$2b$%" } }),
                ..Default::default()
            })
            .await;
        assert!(matches!(hidden, Err(WarpError::InvalidParameter(_))));

        let by_id = users
            .find(&FindOptions {
                where_clause: json!({ "id": 1 }),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
    }

    #[tokio::test]
    async fn writes_keep_actionable_keys_and_hash_passwords() {
        let query = Arc::new(MemoryQueryFacade::new());
        let registry = registry(query.clone());
        let hasher = PasswordHasher::new(crate::security::TEST_COST);
        let users = ResourceDispatcher::new(registry.user().unwrap(), ModelKind::User, &registry, &hasher);

        let created = users
            .create_user(
                row(json!({ "username": "bob", "email": "b@x.io", "password": "pw", "admin": true })),
                &ClientContext::default(),
            )
            .await
            .unwrap();
        assert!(created.get("password").is_none());

        let id = created["id"].as_i64().unwrap();
        let stored = query.get("user", id).unwrap();
        assert!(stored.get("admin").is_none());
        assert_ne!(stored["password"], "pw");
        assert!(hasher.verify("pw", stored["password"].as_str().unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn username_collision_reported_first() {
        let query = Arc::new(MemoryQueryFacade::new());
        query.insert("user", row(json!({ "username": "bob", "email": "b@x.io" })));
        let registry = registry(query);
        let hasher = PasswordHasher::new(crate::security::TEST_COST);
        let users = ResourceDispatcher::new(registry.user().unwrap(), ModelKind::User, &registry, &hasher);
        let ctx = ClientContext::default();

        let both = users
            .create_user(row(json!({ "username": "bob", "email": "b@x.io", "password": "pw" })), &ctx)
            .await;
        assert!(matches!(both, Err(WarpError::UsernameTaken)));

        let email = users
            .create_user(row(json!({ "username": "rob", "email": "b@x.io", "password": "pw" })), &ctx)
            .await;
        assert!(matches!(email, Err(WarpError::EmailTaken)));

        let missing = users.create_user(row(json!({ "username": "rob" })), &ctx).await;
        assert!(matches!(missing, Err(WarpError::InvalidCredentials(_))));
    }
}
