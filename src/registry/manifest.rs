use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use super::ModelDefinition;

/// Model definitions loaded at startup from YAML or JSON.
///
/// ```yaml
/// models:
///   - className: post
///     keys: { viewable: [title], actionable: [title] }
/// user: { className: user, keys: { viewable: [username, email], actionable: [username, email, password] } }
/// session: { className: session, keys: { viewable: [user, origin, session_token, expires_at], pointers: { user: user } } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelManifest {
    #[serde(default)]
    pub models: Vec<ModelDefinition>,
    pub user: Option<ModelDefinition>,
    pub session: Option<ModelDefinition>,
    pub installation: Option<ModelDefinition>,
    pub push: Option<ModelDefinition>,
}

impl ModelManifest {
    /// JSON is valid YAML, so one parser covers both.
    pub fn parse(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading model manifest {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("parsing model manifest {}", path.display()))
    }

    /// Built-in `user`/`session` pair with no generic models.
    pub fn auth_only() -> Self {
        Self {
            user: Some(ModelDefinition::default_user()),
            session: Some(ModelDefinition::default_session()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_manifest() {
        let manifest = ModelManifest::parse(
            r#"{"models":[{"className":"post","keys":{"viewable":["title"]}}],"user":{"className":"member"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.models.len(), 1);
        assert_eq!(manifest.user.unwrap().class_name, "member");
        assert!(manifest.session.is_none());
    }
}
