use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::query::QueryFacade;

/// Field visibility for a model.
///
/// `pointers` maps a pointer key to the class it references; the column
/// backing a pointer key `user` is `user_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelKeys {
    #[serde(default)]
    pub viewable: Vec<String>,
    #[serde(default)]
    pub actionable: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pointers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(rename = "className", alias = "class_name")]
    pub class_name: String,
    #[serde(default)]
    pub keys: ModelKeys,
}

impl ModelDefinition {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            keys: ModelKeys::default(),
        }
    }

    pub fn viewable<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.viewable = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn actionable<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.actionable = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn pointer(mut self, key: impl Into<String>, class_name: impl Into<String>) -> Self {
        self.keys.pointers.insert(key.into(), class_name.into());
        self
    }

    /// `user` with username/email visible and password write-only.
    pub fn default_user() -> Self {
        Self::new("user")
            .viewable(["username", "email"])
            .actionable(["username", "email", "password"])
    }

    /// `session` owned by a `user` pointer.
    pub fn default_session() -> Self {
        Self::new("session")
            .viewable(["user", "origin", "session_token", "expires_at"])
            .actionable(["user", "origin"])
            .pointer("user", "user")
    }

    pub fn pointer_class(&self, key: &str) -> Option<&str> {
        self.keys.pointers.get(key).map(String::as_str)
    }

    pub fn is_actionable(&self, key: &str) -> bool {
        self.keys.actionable.iter().any(|k| k == key)
    }
}

/// Column that stores a pointer key.
pub fn pointer_column(key: &str) -> String {
    format!("{}_id", key)
}

/// A definition plus the query facade injected at registration.
#[derive(Clone)]
pub struct BoundModel {
    pub definition: Arc<ModelDefinition>,
    pub query: Arc<dyn QueryFacade>,
}

impl BoundModel {
    pub fn class_name(&self) -> &str {
        &self.definition.class_name
    }
}

impl std::fmt::Debug for BoundModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundModel")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}
