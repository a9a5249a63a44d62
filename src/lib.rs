pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod protocol;
pub mod rooms;

use std::sync::Arc;

use axum::{extract::{FromRef, State}, http::{header, HeaderValue, Method, StatusCode}, response::{IntoResponse, Response}, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use rooms::Chat;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub chat: Arc<Chat>,
    pub gate: auth::Gate,
}

/// Builds the HTTP surface: the websocket endpoint plus a liveness probe.
pub fn app(state: AppState, allowed_origin: Option<&str>) -> anyhow::Result<Router> {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if let Some(origin) = allowed_origin {
        cors = cors.allow_origin(HeaderValue::from_str(origin)?);
    }

    Ok(
        Router::new()
            .route("/health", get(health))
            .merge(rooms::router())
            .with_state(state)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    )
}

async fn health(State(chat): State<Arc<Chat>>) -> AppResult<&'static str> {
    chat.db().ping().await?;
    Ok("ok")
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub StatusCode, pub anyhow::Error);

impl AppError {
    pub fn new(status: StatusCode, err: impl Into<anyhow::Error>) -> Self {
        Self(status, err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.is_server_error() {
            tracing::error!(status = %self.0, error = ?self.1, "request failed");
        }
        (self.0, self.1.to_string()).into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty, $status:expr) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self($status, anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(sqlx::Error, StatusCode::INTERNAL_SERVER_ERROR);
apperr_impl!(auth::AuthError, StatusCode::UNAUTHORIZED);
