use serde::Serialize;

use crate::error::WarpError;
use crate::session::SessionService;

/// Credentials pulled from the request headers before any route runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub session_token: Option<String>,
    pub master_key: Option<String>,
    pub origin: Option<String>,
}

impl Credentials {
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

/// Request-scoped result of authorization; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthorizationContext {
    pub master: bool,
    pub session_token: Option<String>,
    pub acting_user_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    master_key: String,
}

impl AuthorizationGate {
    pub fn new(master_key: impl Into<String>) -> Self {
        Self {
            master_key: master_key.into(),
        }
    }

    pub fn is_master(&self, credentials: &Credentials) -> bool {
        credentials
            .master_key
            .as_deref()
            .map_or(false, |key| !key.is_empty() && key == self.master_key)
    }

    pub fn require_master(&self, credentials: &Credentials) -> Result<AuthorizationContext, WarpError> {
        if self.is_master(credentials) {
            Ok(AuthorizationContext {
                master: true,
                ..Default::default()
            })
        } else {
            tracing::warn!("Rejected master operation without a valid master key");
            Err(WarpError::forbidden("Forbidden Master Operation"))
        }
    }

    /// Master key short-circuits; otherwise a live session is required.
    pub async fn authorize(
        &self,
        credentials: &Credentials,
        sessions: &SessionService<'_>,
    ) -> Result<AuthorizationContext, WarpError> {
        if self.is_master(credentials) {
            return Ok(AuthorizationContext {
                master: true,
                session_token: credentials.session_token.clone(),
                acting_user_id: None,
            });
        }
        let acting_user_id = sessions.acting_user_id(credentials.session_token()).await?;
        Ok(AuthorizationContext {
            master: false,
            session_token: credentials.session_token.clone(),
            acting_user_id: Some(acting_user_id),
        })
    }

    /// Non-master callers may only `verb` their own identity.
    pub fn require_owner(
        &self,
        context: &AuthorizationContext,
        target_id: i64,
        verb: &str,
    ) -> Result<(), WarpError> {
        if context.master || context.acting_user_id == Some(target_id) {
            return Ok(());
        }
        tracing::warn!(
            "User {:?} attempted to {} user {}",
            context.acting_user_id,
            verb,
            target_id
        );
        Err(WarpError::forbidden(format!("Users can only {} their own data", verb)))
    }
}
