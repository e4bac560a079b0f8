//! Model, function and queue registries.
//!
//! Populated on `WarpServer` during startup and frozen into the shared
//! application state before the first request is served.

pub mod functions;
pub mod manifest;
pub mod model;

use std::collections::HashMap;

use crate::error::WarpError;

pub use functions::{
    FunctionDefinition, FunctionHandler, FunctionRegistry, FunctionRequest, QueueDefinition,
    QueueHandler, QueueRegistry,
};
pub use manifest::ModelManifest;
pub use model::{pointer_column, BoundModel, ModelDefinition, ModelKeys};

/// Which slot a registered model occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Generic,
    User,
    Session,
    Installation,
    Push,
}

#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, BoundModel>,
    reserved: HashMap<ModelKind, BoundModel>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert by class name; a second registration replaces the first.
    pub fn register(&mut self, model: BoundModel) -> &mut Self {
        tracing::debug!("Registered model {}", model.class_name());
        self.models.insert(model.class_name().to_string(), model);
        self
    }

    /// No-op unless both models are supplied.
    pub fn register_auth_models(
        &mut self,
        user: Option<BoundModel>,
        session: Option<BoundModel>,
    ) -> &mut Self {
        self.register_pair((ModelKind::User, user), (ModelKind::Session, session))
    }

    /// No-op unless both models are supplied.
    pub fn register_push_models(
        &mut self,
        installation: Option<BoundModel>,
        push: Option<BoundModel>,
    ) -> &mut Self {
        self.register_pair((ModelKind::Installation, installation), (ModelKind::Push, push))
    }

    fn register_pair(
        &mut self,
        (first_kind, first): (ModelKind, Option<BoundModel>),
        (second_kind, second): (ModelKind, Option<BoundModel>),
    ) -> &mut Self {
        if let (Some(first), Some(second)) = (first, second) {
            self.reserved.insert(first_kind, first);
            self.reserved.insert(second_kind, second);
        }
        self
    }

    /// Generic lookup. User and Session class names are refused so callers go
    /// through the identity endpoints.
    pub fn resolve(&self, class_name: &str) -> Result<&BoundModel, WarpError> {
        match self.kind_of(class_name) {
            ModelKind::User => Err(WarpError::forbidden(
                "User operations must use the appropriate API",
            )),
            ModelKind::Session => Err(WarpError::forbidden(
                "Session operations must use the appropriate API",
            )),
            ModelKind::Generic | ModelKind::Installation | ModelKind::Push => self
                .models
                .get(class_name)
                .ok_or(WarpError::ModelNotFound),
        }
    }

    /// Reserved slot accessor.
    pub fn slot(&self, kind: ModelKind) -> Result<&BoundModel, WarpError> {
        match kind {
            ModelKind::Generic => Err(WarpError::ModelNotFound),
            ModelKind::User | ModelKind::Session => self
                .reserved
                .get(&kind)
                .ok_or_else(|| WarpError::forbidden("Authentication models have not been defined")),
            ModelKind::Installation | ModelKind::Push => self
                .reserved
                .get(&kind)
                .ok_or_else(|| WarpError::forbidden("Push models have not been defined")),
        }
    }

    pub fn user(&self) -> Result<&BoundModel, WarpError> {
        self.slot(ModelKind::User)
    }

    pub fn session(&self) -> Result<&BoundModel, WarpError> {
        self.slot(ModelKind::Session)
    }

    /// Any model by class name, reserved slots included. Used to follow pointers.
    pub fn lookup(&self, class_name: &str) -> Option<(ModelKind, &BoundModel)> {
        self.reserved
            .iter()
            .find(|(_, m)| m.class_name() == class_name)
            .map(|(kind, m)| (*kind, m))
            .or_else(|| {
                self.models
                    .get(class_name)
                    .map(|m| (ModelKind::Generic, m))
            })
    }

    pub fn kind_of(&self, class_name: &str) -> ModelKind {
        self.lookup(class_name)
            .map_or(ModelKind::Generic, |(kind, _)| kind)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn has_auth_models(&self) -> bool {
        self.reserved.contains_key(&ModelKind::User) && self.reserved.contains_key(&ModelKind::Session)
    }
}
