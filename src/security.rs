use crate::error::WarpError;

/// bcrypt hashing, run off the async workers.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, WarpError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| {
                tracing::error!("Password hashing task failed: {}", e);
                WarpError::Internal("Could not hash password".to_string())
            })?
            .map_err(|e| {
                tracing::error!("Password hashing failed: {}", e);
                WarpError::Internal("Could not hash password".to_string())
            })
    }

    /// A malformed stored hash verifies as `false`.
    pub async fn verify(&self, password: &str, hashed: &str) -> Result<bool, WarpError> {
        let password = password.to_owned();
        let hashed = hashed.to_owned();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
            .await
            .map_err(|e| {
                tracing::error!("Password verification task failed: {}", e);
                WarpError::Internal("Could not verify password".to_string())
            })?;
        Ok(verified.unwrap_or(false))
    }
}

/// Cheapest cost bcrypt accepts; keeps hashing fast in tests.
#[cfg(test)]
pub(crate) const TEST_COST: u32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = PasswordHasher::new(TEST_COST);
        let hashed = hasher.hash("secret").await.unwrap();
        assert_ne!(hashed, "secret");
        assert!(hasher.verify("secret", &hashed).await.unwrap());
        assert!(!hasher.verify("wrong", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_is_a_mismatch() {
        let hasher = PasswordHasher::new(TEST_COST);
        assert!(!hasher.verify("secret", "not-a-hash").await.unwrap());
    }
}
