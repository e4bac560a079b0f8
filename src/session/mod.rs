//! Login, logout, password change and identity lookup.
//!
//! A session is live while `expires_at` is strictly in the future. Logout
//! writes the current instant into `expires_at`; rows are never deleted.

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::ResourceDispatcher;
use crate::error::WarpError;
use crate::filter::FilterData;
use crate::query::{ClientContext, Row};
use crate::security::PasswordHasher;

/// Lifetime of a freshly created session.
pub const SESSION_LIFETIME_DAYS: i64 = 365;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

pub struct SessionService<'a> {
    users: ResourceDispatcher<'a>,
    sessions: ResourceDispatcher<'a>,
    hasher: &'a PasswordHasher,
}

impl<'a> SessionService<'a> {
    pub fn new(
        users: ResourceDispatcher<'a>,
        sessions: ResourceDispatcher<'a>,
        hasher: &'a PasswordHasher,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
        }
    }

    pub fn sessions(&self) -> &ResourceDispatcher<'a> {
        &self.sessions
    }

    /// The live session row for `token`, or `InvalidSessionToken`.
    pub async fn lookup_active(&self, token: Option<&str>) -> Result<Row, WarpError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WarpError::invalid_session("Session does not exist"))?;
        let filter = FilterData {
            where_clause: Some(json!({
                "session_token": { "eq": token },
                "expires_at": { "gt": Utc::now().to_rfc3339() },
            })),
            limit: Some(1),
            ..Default::default()
        };
        self.sessions
            .query()
            .find(self.sessions.class_name(), &filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                tracing::debug!("Rejected unknown or expired session token");
                WarpError::invalid_session("Session does not exist")
            })
    }

    /// The owning user id of a live session.
    pub async fn acting_user_id(&self, token: Option<&str>) -> Result<i64, WarpError> {
        let session = self.lookup_active(token).await?;
        user_id_of(&session)
    }

    pub async fn login(
        &self,
        request: &LoginRequest,
        origin: Option<&str>,
        client: &ClientContext,
    ) -> Result<Value, WarpError> {
        let password = request
            .password
            .as_deref()
            .ok_or_else(|| WarpError::invalid_credentials("Invalid username/password"))?;
        let present = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let where_clause = match (present(&request.username), present(&request.email)) {
            (Some(username), _) => json!({ "username": { "eq": username } }),
            (None, Some(email)) => json!({ "email": { "eq": email } }),
            (None, None) => return Err(WarpError::invalid_credentials("Invalid username/password")),
        };

        let user = self.find_credentials(where_clause).await?.unwrap_or_default();
        if !self.password_matches(password, &user).await? {
            tracing::debug!("Login rejected");
            return Err(WarpError::invalid_credentials("Invalid username/password"));
        }
        let user_id = integer_field(&user, "id")?;

        let mut fields = Row::new();
        fields.insert("user_id".into(), Value::from(user_id));
        fields.insert(
            "origin".into(),
            origin.map_or(Value::Null, |o| Value::String(o.to_string())),
        );
        fields.insert(
            "session_token".into(),
            Value::String(uuid::Uuid::new_v4().simple().to_string()),
        );
        fields.insert(
            "expires_at".into(),
            Value::String((Utc::now() + Duration::days(SESSION_LIFETIME_DAYS)).to_rfc3339()),
        );

        let created = self
            .sessions
            .query()
            .create(self.sessions.class_name(), fields, client)
            .await?;
        let session_id = integer_field(&created, "id")?;
        tracing::info!("User {} logged in (session {})", user_id, session_id);

        // Re-read so the caller sees exactly what was persisted
        self.sessions
            .first(session_id, &[])
            .await?
            .ok_or_else(|| WarpError::Internal("Session could not be read back".to_string()))
    }

    /// Expires the session. A second call with the same token fails.
    pub async fn logout(&self, token: Option<&str>, client: &ClientContext) -> Result<Value, WarpError> {
        let session = self.lookup_active(token).await?;
        let session_id = integer_field(&session, "id")?;

        let mut fields = Row::new();
        fields.insert("expires_at".into(), Value::String(Utc::now().to_rfc3339()));
        let row = self
            .sessions
            .query()
            .update(self.sessions.class_name(), session_id, fields, client)
            .await?;
        self.sessions.render(&row, &[]).await
    }

    pub async fn change_password(
        &self,
        token: Option<&str>,
        request: &ChangePasswordRequest,
        client: &ClientContext,
    ) -> Result<(), WarpError> {
        let user_id = self.acting_user_id(token).await?;
        let user = self
            .find_credentials(json!({ "id": { "eq": user_id } }))
            .await?
            .ok_or_else(|| WarpError::invalid_session("User does not exist"))?;

        let old_password = request.old_password.as_deref().unwrap_or_default();
        if !self.password_matches(old_password, &user).await? {
            return Err(WarpError::invalid_credentials("Invalid credentials"));
        }
        let new_password = request
            .new_password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| WarpError::invalid_parameter("new_password must be set"))?;

        let mut fields = Row::new();
        fields.insert("password".into(), Value::String(new_password.to_string()));
        self.users.update(user_id, fields, client).await?;
        Ok(())
    }

    /// The acting user's record, or `null` if it no longer exists.
    pub async fn who_am_i(&self, token: Option<&str>, include: &[String]) -> Result<Value, WarpError> {
        let user_id = self.acting_user_id(token).await?;
        Ok(self.users.first(user_id, include).await?.unwrap_or(Value::Null))
    }

    async fn find_credentials(&self, where_clause: Value) -> Result<Option<Row>, WarpError> {
        let filter = FilterData {
            select: Some(vec!["id".to_string(), "password".to_string()]),
            where_clause: Some(where_clause),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self
            .users
            .query()
            .find(self.users.class_name(), &filter)
            .await?
            .into_iter()
            .next())
    }

    async fn password_matches(&self, password: &str, user: &Row) -> Result<bool, WarpError> {
        match user.get("password").and_then(Value::as_str) {
            Some(hashed) => self.hasher.verify(password, hashed).await,
            None => Ok(false),
        }
    }
}

fn user_id_of(session: &Row) -> Result<i64, WarpError> {
    session
        .get("user_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| WarpError::invalid_session("Session does not exist"))
}

fn integer_field(row: &Row, field: &str) -> Result<i64, WarpError> {
    row.get(field).and_then(Value::as_i64).ok_or_else(|| {
        tracing::error!("Row is missing integer {}", field);
        WarpError::Internal("An error occurred while processing your request".to_string())
    })
}
