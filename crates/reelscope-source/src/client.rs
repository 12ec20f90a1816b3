//! HTTP client for the scraping gateway that fronts the platform.
//!
//! The gateway exposes three endpoints:
//!
//! - `POST /v1/session` exchanges credentials for a bearer token.
//! - `GET /v1/users/{handle}` returns profile metadata.
//! - `GET /v1/users/{handle}/posts?limit=N` returns recent posts, newest first.
//!
//! HTTP statuses are mapped to [`SourceError`] variants so callers can tell
//! "log in again" apart from "not found" and "back off".

use std::time::Duration;

use async_trait::async_trait;
use reelscope_core::AppConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::error::SourceError;
use crate::fetcher::SourceFetcher;
use crate::types::{PostsResponse, SessionRequest, SessionResponse, SourcePost, SourceProfile};

const USER_AGENT: &str = "reelscope/0.1 (content-discovery)";

/// Login for the gateway session endpoint.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Client for the scraping gateway.
///
/// Holds the current bearer token, if any. Requests are sent without a token
/// until [`SourceFetcher::reauthenticate`] succeeds.
pub struct GatewayClient {
    client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
    token: RwLock<Option<String>>,
}

impl GatewayClient {
    /// Creates a client for the gateway at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`SourceError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        credentials: Option<Credentials>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        // Keep exactly one trailing slash so path segments append rather than replace.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| SourceError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(SourceError::InvalidBaseUrl {
                base_url: base_url.to_owned(),
                reason: "URL cannot be used as a base".to_owned(),
            });
        }

        Ok(Self {
            client,
            base_url: parsed,
            credentials,
            token: RwLock::new(None),
        })
    }

    /// Creates a client from the `REELSCOPE_SOURCE_*` settings.
    ///
    /// # Errors
    ///
    /// See [`GatewayClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        let credentials = match (&config.source_username, &config.source_password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        Self::new(
            &config.source_base_url,
            config.source_request_timeout_secs,
            credentials,
        )
    }

    /// Builds `{base}/v1/{segments...}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so path_segments_mut succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("v1").extend(segments);
        }
        url
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Maps non-2xx statuses to typed errors.
    fn check_status(response: Response, handle: &str) -> Result<Response, SourceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(SourceError::AuthRequired),
            StatusCode::FORBIDDEN => Err(SourceError::PrivateProfile {
                handle: handle.to_owned(),
            }),
            StatusCode::NOT_FOUND => Err(SourceError::NotFound {
                handle: handle.to_owned(),
            }),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .unwrap_or(60);
                Err(SourceError::RateLimited { retry_after_secs })
            }
            _ => Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        handle: &str,
        context: String,
    ) -> Result<T, SourceError> {
        let request = self.authorized(self.client.get(url)).await;
        let response = Self::check_status(request.send().await?, handle)?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Deserialize { context, source: e })
    }
}

#[async_trait]
impl SourceFetcher for GatewayClient {
    async fn fetch_profile(&self, handle: &str) -> Result<SourceProfile, SourceError> {
        let url = self.endpoint(&["users", handle]);
        self.get_json(url, handle, format!("profile for {handle}"))
            .await
    }

    async fn fetch_recent_posts(
        &self,
        handle: &str,
        limit: u32,
    ) -> Result<Vec<SourcePost>, SourceError> {
        let mut url = self.endpoint(&["users", handle, "posts"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        let response: PostsResponse = self
            .get_json(url, handle, format!("posts for {handle}"))
            .await?;
        Ok(response.posts)
    }

    async fn reauthenticate(&self) -> Result<(), SourceError> {
        let Some(credentials) = &self.credentials else {
            tracing::warn!("source gateway requested a login but no credentials are configured");
            return Err(SourceError::AuthRequired);
        };

        let url = self.endpoint(&["session"]);
        let response = self
            .client
            .post(url)
            .json(&SessionRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;
        let response = Self::check_status(response, &credentials.username)?;
        let body = response.text().await?;
        let session: SessionResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
                context: "session response".to_owned(),
                source: e,
            })?;

        *self.token.write().await = Some(session.token);
        tracing::info!(username = %credentials.username, "source gateway session established");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> GatewayClient {
        GatewayClient::new(base_url, 30, None).expect("client construction should not fail")
    }

    #[test]
    fn endpoint_appends_segments() {
        let client = test_client("http://gateway.local:8085");
        let url = client.endpoint(&["users", "devdaily", "posts"]);
        assert_eq!(url.as_str(), "http://gateway.local:8085/v1/users/devdaily/posts");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = test_client("http://gateway.local/api/");
        let url = client.endpoint(&["session"]);
        assert_eq!(url.as_str(), "http://gateway.local/api/v1/session");
    }

    #[test]
    fn endpoint_encodes_handle() {
        let client = test_client("http://gateway.local");
        let url = client.endpoint(&["users", "a/b c"]);
        assert_eq!(url.as_str(), "http://gateway.local/v1/users/a%2Fb%20c");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = GatewayClient::new("not a url", 30, None).err().expect("should fail");
        assert!(matches!(err, SourceError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "scout".to_owned(),
            password: "hunter2".to_owned(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("scout"));
        assert!(!rendered.contains("hunter2"));
    }
}
