use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::WarpError;
use crate::query::ClientContext;

pub type HandlerFuture = BoxFuture<'static, Result<Value, WarpError>>;

/// What a server-side function receives when invoked over HTTP.
#[derive(Debug, Clone, Default)]
pub struct FunctionRequest {
    pub params: Value,
    pub master: bool,
    pub client: ClientContext,
}

pub type FunctionHandler = Arc<dyn Fn(FunctionRequest) -> HandlerFuture + Send + Sync>;
pub type QueueHandler = Arc<dyn Fn() -> HandlerFuture + Send + Sync>;

#[derive(Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub master_required: bool,
    pub handler: FunctionHandler,
}

impl FunctionDefinition {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(FunctionRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, WarpError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            master_required: false,
            handler: Arc::new(move |req| -> HandlerFuture { Box::pin(handler(req)) }),
        }
    }

    pub fn master_required(mut self) -> Self {
        self.master_required = true;
        self
    }

    pub async fn run(&self, req: FunctionRequest) -> Result<Value, WarpError> {
        (self.handler)(req).await
    }
}

/// A background job; the HTTP surface runs it once on demand.
#[derive(Clone)]
pub struct QueueDefinition {
    pub name: String,
    pub handler: QueueHandler,
}

impl QueueDefinition {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, WarpError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move || -> HandlerFuture { Box::pin(handler()) }),
        }
    }

    pub async fn run(&self) -> Result<Value, WarpError> {
        (self.handler)().await
    }
}

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDefinition>,
}

impl FunctionRegistry {
    pub fn register(&mut self, function: FunctionDefinition) -> &mut Self {
        self.functions.insert(function.name.clone(), function);
        self
    }

    pub fn register_all(&mut self, functions: impl IntoIterator<Item = FunctionDefinition>) -> &mut Self {
        for function in functions {
            self.register(function);
        }
        self
    }

    pub fn resolve(&self, name: &str) -> Result<&FunctionDefinition, WarpError> {
        self.functions.get(name).ok_or(WarpError::FunctionNotFound)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[derive(Clone, Default)]
pub struct QueueRegistry {
    queues: HashMap<String, QueueDefinition>,
}

impl QueueRegistry {
    pub fn register(&mut self, queue: QueueDefinition) -> &mut Self {
        self.queues.insert(queue.name.clone(), queue);
        self
    }

    pub fn register_all(&mut self, queues: impl IntoIterator<Item = QueueDefinition>) -> &mut Self {
        for queue in queues {
            self.register(queue);
        }
        self
    }

    pub fn resolve(&self, name: &str) -> Result<&QueueDefinition, WarpError> {
        self.queues.get(name).ok_or(WarpError::QueueNotFound)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn functions_resolve_by_name() {
        let mut registry = FunctionRegistry::default();
        registry.register(FunctionDefinition::new("echo", |req: FunctionRequest| async move {
            Ok(req.params)
        }));

        let echo = registry.resolve("echo").unwrap();
        assert!(!echo.master_required);
        let out = echo
            .run(FunctionRequest {
                params: json!({ "a": 1 }),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out, json!({ "a": 1 }));
        assert!(matches!(registry.resolve("nope"), Err(WarpError::FunctionNotFound)));
    }

    #[tokio::test]
    async fn queues_overwrite_and_fail_on_unknown() {
        let mut registry = QueueRegistry::default();
        registry.register_all([
            QueueDefinition::new("digest", || async { Ok(json!(1)) }),
            QueueDefinition::new("digest", || async { Ok(json!(2)) }),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("digest").unwrap().run().await.unwrap(), json!(2));
        assert!(matches!(registry.resolve("other"), Err(WarpError::QueueNotFound)));
    }
}
