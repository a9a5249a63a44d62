use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_AI_ROOM: &str = "ai-assistant";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("PORT must be a port number, got {0:?}")]
    BadPort(String),
}

/// Which of the two frontend origins may open a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Production,
    Local,
}

impl Deployment {
    fn from_env_type(value: Option<&str>) -> Self {
        match value {
            Some("PROD") => Deployment::Production,
            _ => Deployment::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub deployment: Deployment,
    pub allowed_origin: Option<String>,
    pub auth_secret: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub ai_room: String,
    pub port: u16,
}

impl Config {
    /// Reads the process environment, with `.env` taking part as usual.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let deployment = Deployment::from_env_type(var("ENV_TYPE").as_deref());
        let allowed_origin = match deployment {
            Deployment::Production => var("FRONTEND_URL_DEPLOYED"),
            Deployment::Local => var("FRONTEND_URL_LOCALHOST"),
        }
        .map(|origin| origin.trim().trim_end_matches('/').to_owned());

        let port = match var("PORT") {
            Some(port) => port.trim().parse().map_err(|_| ConfigError::BadPort(port))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            deployment,
            allowed_origin,
            auth_secret: required("AUTH_SECRET_KEY")?,
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_owned()),
            ai_room: var("AI_ROOM_CODE").unwrap_or_else(|| DEFAULT_AI_ROOM.to_owned()),
            port,
        })
    }
}
