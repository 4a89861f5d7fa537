use std::env;

use reqwest::Client;
use thiserror::Error;
use url::Url;

/// All the ways a run can fail before the first row executes. The engine
/// treats every variant the same way (abort the run); the reason only shows
/// up in the reported message.
#[derive(Error, Debug, Clone)]
pub enum AuthFailure {
    #[error("missing or invalid configuration: {0}")]
    Config(String),

    #[error("login endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("login rejected with status {0}")]
    Rejected(u16),

    #[error("token missing in login response")]
    Malformed,
}

/// Credentials and login endpoint, resolved once at startup instead of read
/// ad hoc mid-call.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    pub login_url: Url,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AuthFailure> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthFailure> {
        let username = required(&lookup, "USERNAME")?;
        let password = required(&lookup, "PASSWORD")?;
        let login_url = required(&lookup, "LOGIN_URL")?;

        let login_url = Url::parse(&login_url)
            .map_err(|e| AuthFailure::Config(format!("LOGIN_URL is not a valid URL: {e}")))?;

        Ok(Self {
            username,
            password,
            login_url,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, AuthFailure> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AuthFailure::Config(format!("{name} is not set"))),
    }
}

#[allow(async_fn_in_trait)]
pub trait Authenticate {
    async fn login(&self) -> Result<String, AuthFailure>;
}

/// Performs the one login POST of a run and hands back the bearer token
/// verbatim. No caching, no refresh.
pub struct HttpAuthenticator {
    client: Client,
    config: Result<AuthConfig, AuthFailure>,
}

impl HttpAuthenticator {
    /// A missing configuration is carried until `login`, so the engine sees
    /// it through the same failure path as a rejected login.
    pub fn new(config: Result<AuthConfig, AuthFailure>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Self {
        Self::new(AuthConfig::from_env())
    }
}

impl Authenticate for HttpAuthenticator {
    async fn login(&self) -> Result<String, AuthFailure> {
        let config = self.config.as_ref().map_err(Clone::clone)?;

        let body = serde_json::json!({
            "username": config.username,
            "password": config.password,
        });

        let response = self
            .client
            .post(config.login_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthFailure::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() || text.trim().is_empty() {
            return Err(AuthFailure::Rejected(status.as_u16()));
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|_| AuthFailure::Malformed)?;

        match json.get("accessToken").and_then(|token| token.as_str()) {
            Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
            _ => Err(AuthFailure::Malformed),
        }
    }
}
