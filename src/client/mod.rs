//! HTTP client for the listing API and the media host.
pub mod currency;
pub mod error;
pub mod search;
pub mod upload;

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;

use self::error::ClientError;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_MEDIA_HOST_URL: &str = "https://api.cloudinary.com";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub media_host_url: String,
    pub upload_preset: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            media_host_url: DEFAULT_MEDIA_HOST_URL.to_string(),
            upload_preset: None,
        }
    }
}

impl ClientConfig {
    /// Reads `API_BASE_URL`, `MEDIA_HOST_URL` and `CLOUDINARY_UPLOAD_PRESET`.
    pub fn from_env() -> Self {
        ClientConfig::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
        };

        ClientConfig {
            api_base_url: value("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            media_host_url: value("MEDIA_HOST_URL").unwrap_or_else(|| DEFAULT_MEDIA_HOST_URL.to_string()),
            upload_preset: value("CLOUDINARY_UPLOAD_PRESET"),
        }
    }
}

/// Session state handed to privileged calls.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub token: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        AuthContext { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        AuthContext {
            token: Some(token.into()),
        }
    }

    pub fn bearer(&self) -> Result<&str, ClientError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ClientError::AuthenticationRequired)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Self {
        ApiClient::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// Checks status and content type, then decodes the body.
    pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        let url = response.url().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            let message = server_message(&body).unwrap_or_else(|| {
                let text = body.trim();
                if text.is_empty() {
                    status.to_string()
                } else {
                    text.to_string()
                }
            });
            tracing::warn!("{} responded {}: {}", url, status, message);
            return Err(ClientError::upstream(Some(status.as_u16()), message));
        }

        if !content_type.starts_with("application/json") {
            tracing::warn!("{} responded with non-JSON content type {:?}", url, content_type);
            return Err(ClientError::upstream(
                Some(status.as_u16()),
                format!("Expected a JSON response but received {:?}", content_type),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            ClientError::upstream(Some(status.as_u16()), format!("Malformed response: {}", e))
        })
    }
}

/// Best human-readable error from a JSON error body: `error.message`,
/// then `message`, then a string `error`.
pub fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    value["error"]["message"]
        .as_str()
        .or_else(|| value["message"].as_str())
        .or_else(|| value["error"].as_str())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;

    use super::{ApiClient, ClientConfig};

    /// Serves `app` on an ephemeral local port and returns its base URL.
    pub async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub fn client_for(api_base_url: &str, media_host_url: &str) -> ApiClient {
        ApiClient::new(ClientConfig {
            api_base_url: api_base_url.to_string(),
            media_host_url: media_host_url.to_string(),
            upload_preset: Some("estatehub_signed".to_string()),
        })
    }
}
