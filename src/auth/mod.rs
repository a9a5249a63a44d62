//! Connection-time authentication.
//!
//! A connection presents a credential once, in the websocket handshake. The
//! [`Gate`] checks the origin, pulls the credential out of the request and
//! asks an [`Authenticator`] for the identity behind it. Nothing past the
//! handshake is ever re-validated.

mod jwt;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use thiserror::Error;

use crate::{AppError, AppResult};

pub use jwt::{Claims, JwtAuthenticator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credential supplied")]
    MissingCredential,
    #[error("credential rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),
    #[error("credential carries no {0}")]
    MissingClaim(&'static str),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError>;
}

#[derive(Clone)]
pub struct Gate {
    pub authenticator: Arc<dyn Authenticator>,
    pub allowed_origin: Option<String>,
}

impl Gate {
    pub fn new(authenticator: Arc<dyn Authenticator>, allowed_origin: Option<String>) -> Self {
        Self { authenticator, allowed_origin }
    }

    pub fn check_origin(&self, headers: &HeaderMap) -> AppResult<()> {
        let (Some(allowed), Some(origin)) = (&self.allowed_origin, headers.get(header::ORIGIN)) else {
            return Ok(());
        };

        if origin.as_bytes() == allowed.as_bytes() {
            Ok(())
        } else {
            Err(AppError::new(
                StatusCode::FORBIDDEN,
                anyhow::anyhow!("origin {origin:?} is not allowed"),
            ))
        }
    }

    /// Verifies the handshake credential: `?token=` first, then a bearer header.
    pub async fn admit(&self, token: Option<String>, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let credential = token
            .filter(|token| !token.is_empty())
            .or_else(|| bearer(headers))
            .ok_or(AuthError::MissingCredential)?;

        self.authenticator.verify(&credential).await
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}
