use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::{AuthError, Authenticator, Identity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

/// Verifies HS256 tokens signed with the shared authenticator secret.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let claims = decode::<Claims>(credential, &self.key, &self.validation)?.claims;

        let email = claims.email.ok_or(AuthError::MissingClaim("email"))?;
        let name = claims.name.unwrap_or_else(|| email.clone());

        Ok(Identity { name, email })
    }
}
