use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthorizationContext, AuthorizationGate, Credentials};
use crate::config::AppConfig;
use crate::dispatch::ResourceDispatcher;
use crate::error::WarpError;
use crate::handlers;
use crate::middleware::{extract_client, extract_credentials, require_api_key, throttle};
use crate::query::QueryFacade;
use crate::rate::RateGate;
use crate::registry::{
    BoundModel, FunctionDefinition, FunctionRegistry, ModelDefinition, ModelKind, ModelManifest,
    ModelRegistry, QueueDefinition, QueueRegistry,
};
use crate::security::PasswordHasher;
use crate::session::SessionService;
use crate::storage::StorageBackend;

/// Everything a request handler can reach. Immutable once serving starts,
/// apart from the rate bucket.
pub struct AppState {
    pub api_key: String,
    pub registry: ModelRegistry,
    pub functions: FunctionRegistry,
    pub queues: QueueRegistry,
    pub gate: AuthorizationGate,
    pub rate: RateGate,
    pub hasher: PasswordHasher,
    pub query: Arc<dyn QueryFacade>,
    pub storage: Arc<dyn StorageBackend>,
}

impl AppState {
    pub fn users(&self) -> Result<ResourceDispatcher<'_>, WarpError> {
        Ok(ResourceDispatcher::new(
            self.registry.user()?,
            ModelKind::User,
            &self.registry,
            &self.hasher,
        ))
    }

    pub fn session_service(&self) -> Result<SessionService<'_>, WarpError> {
        let sessions = ResourceDispatcher::new(
            self.registry.session()?,
            ModelKind::Session,
            &self.registry,
            &self.hasher,
        );
        Ok(SessionService::new(self.users()?, sessions, &self.hasher))
    }

    /// Generic model by class name; User/Session names are refused.
    pub fn resource(&self, class_name: &str) -> Result<ResourceDispatcher<'_>, WarpError> {
        let model = self.registry.resolve(class_name)?;
        Ok(ResourceDispatcher::new(
            model,
            self.registry.kind_of(class_name),
            &self.registry,
            &self.hasher,
        ))
    }

    /// Master key, else a live session. The session models are only needed on
    /// the session path.
    pub async fn authorize(&self, credentials: &Credentials) -> Result<AuthorizationContext, WarpError> {
        if self.gate.is_master(credentials) {
            return self.gate.require_master(credentials);
        }
        let sessions = self.session_service()?;
        self.gate.authorize(credentials, &sessions).await
    }
}

/// Startup builder: collaborators and registrations go in, a router comes out.
pub struct WarpServer {
    config: AppConfig,
    query: Arc<dyn QueryFacade>,
    storage: Arc<dyn StorageBackend>,
    registry: ModelRegistry,
    functions: FunctionRegistry,
    queues: QueueRegistry,
}

impl WarpServer {
    pub fn new(
        config: AppConfig,
        query: Arc<dyn QueryFacade>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            config,
            query,
            storage,
            registry: ModelRegistry::new(),
            functions: FunctionRegistry::default(),
            queues: QueueRegistry::default(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Attach this server's query facade to a definition.
    pub fn bind(&self, definition: ModelDefinition) -> BoundModel {
        BoundModel {
            definition: Arc::new(definition),
            query: self.query.clone(),
        }
    }

    pub fn register_model(&mut self, definition: ModelDefinition) -> &mut Self {
        let model = self.bind(definition);
        self.registry.register(model);
        self
    }

    pub fn register_models(&mut self, definitions: impl IntoIterator<Item = ModelDefinition>) -> &mut Self {
        for definition in definitions {
            self.register_model(definition);
        }
        self
    }

    pub fn register_auth_models(
        &mut self,
        user: Option<ModelDefinition>,
        session: Option<ModelDefinition>,
    ) -> &mut Self {
        let user = user.map(|d| self.bind(d));
        let session = session.map(|d| self.bind(d));
        self.registry.register_auth_models(user, session);
        self
    }

    pub fn register_push_models(
        &mut self,
        installation: Option<ModelDefinition>,
        push: Option<ModelDefinition>,
    ) -> &mut Self {
        let installation = installation.map(|d| self.bind(d));
        let push = push.map(|d| self.bind(d));
        self.registry.register_push_models(installation, push);
        self
    }

    pub fn register_manifest(&mut self, manifest: ModelManifest) -> &mut Self {
        self.register_models(manifest.models);
        self.register_auth_models(manifest.user, manifest.session);
        self.register_push_models(manifest.installation, manifest.push)
    }

    pub fn register_function(&mut self, function: FunctionDefinition) -> &mut Self {
        self.functions.register(function);
        self
    }

    pub fn register_functions(&mut self, functions: impl IntoIterator<Item = FunctionDefinition>) -> &mut Self {
        self.functions.register_all(functions);
        self
    }

    pub fn register_queue(&mut self, queue: QueueDefinition) -> &mut Self {
        self.queues.register(queue);
        self
    }

    pub fn register_queues(&mut self, queues: impl IntoIterator<Item = QueueDefinition>) -> &mut Self {
        self.queues.register_all(queues);
        self
    }

    /// Liveness probe against the backing store; run before serving.
    pub async fn verify_connection(&self) -> Result<(), WarpError> {
        self.query.ping().await?;
        tracing::info!("Database connection verified");
        Ok(())
    }

    pub fn into_state(self) -> Arc<AppState> {
        if self.registry.is_empty() {
            tracing::warn!("Models have not yet been defined");
        }
        if !self.registry.has_auth_models() {
            tracing::warn!("User and/or session models have not been defined");
        }
        tracing::info!(
            "Registered {} models, {} functions, {} queues",
            self.registry.len(),
            self.functions.len(),
            self.queues.len()
        );

        Arc::new(AppState {
            api_key: self.config.security.api_key.clone(),
            gate: AuthorizationGate::new(self.config.security.master_key.clone()),
            rate: RateGate::new(
                self.config.throttle.limit,
                Duration::from_secs(self.config.throttle.interval_secs),
            ),
            hasher: PasswordHasher::new(self.config.security.password_cost),
            registry: self.registry,
            functions: self.functions,
            queues: self.queues,
            query: self.query,
            storage: self.storage,
        })
    }

    pub fn into_router(self) -> Router {
        router(self.into_state())
    }
}

/// Assemble the request pipeline. Layers run outermost first:
/// CORS, credentials, client context, rate gate, API key, then routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::status::root))
        .route("/health", get(handlers::status::health))
        .merge(user_routes())
        .merge(session_routes())
        .merge(class_routes())
        .merge(function_routes())
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(middleware::from_fn_with_state(state.clone(), throttle))
        .layer(middleware::from_fn(extract_client))
        .layer(middleware::from_fn(extract_credentials))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn user_routes() -> Router<Arc<AppState>> {
    use handlers::users;

    Router::new()
        .route("/users", get(users::find).post(users::create))
        .route("/users/me", get(users::me))
        .route("/users/keys", get(users::keys))
        .route("/users/change-password", post(users::change_password))
        .route(
            "/users/:id",
            get(users::first).put(users::update).delete(users::destroy),
        )
        .route("/login", post(users::login))
        .route("/logout", get(users::logout))
}

fn session_routes() -> Router<Arc<AppState>> {
    use handlers::sessions;

    Router::new()
        .route("/sessions", get(sessions::find))
        .route("/sessions/:id", get(sessions::first))
}

fn class_routes() -> Router<Arc<AppState>> {
    use handlers::classes;

    Router::new()
        .route("/classes/:class", get(classes::find).post(classes::create))
        .route("/classes/:class/keys", get(classes::keys))
        .route(
            "/classes/:class/:id",
            get(classes::first).put(classes::update).delete(classes::destroy),
        )
}

fn function_routes() -> Router<Arc<AppState>> {
    use handlers::{files, functions, queues};

    Router::new()
        .route("/functions/:name", post(functions::run))
        .route("/queues/:name", post(queues::run))
        .route("/files", post(files::upload).delete(files::destroy))
}
