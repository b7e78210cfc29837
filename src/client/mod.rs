mod admin;
mod datasets;
mod images;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::session::Session;
use crate::types::TokenResponse;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{info, warn};

pub use images::UploadOptions;

/// Typed client for the aitrace REST backend. One method per endpoint, no
/// retries; every failure is local to the operation that hit it.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    session: Session,
}

impl ApiClient {
    pub fn new(config: &Config, session: Session) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_seconds))
            .build()?;
        let token = session.load();
        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            token,
            session,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.url(path)))
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(self.url(path)))
    }

    pub(crate) fn put(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.put(self.url(path)))
    }

    pub(crate) fn patch(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.patch(self.url(path)))
    }

    pub(crate) fn delete(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.delete(self.url(path)))
    }

    /// Without a saved token the request goes out unauthenticated and the
    /// backend is expected to reject it.
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Response gate applied to every call: 401 clears the saved session
    /// (the global-logout interceptor), 409 surfaces as the distinguished
    /// conflict outcome, other non-success statuses carry the body text.
    pub(crate) async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("received 401 Unauthorized, clearing saved session");
            if let Err(e) = self.session.clear() {
                warn!("failed to clear session token: {e}");
            }
            return Err(ClientError::Unauthorized);
        }
        if status == StatusCode::CONFLICT {
            return Err(ClientError::Conflict);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// `POST /auth/login` with form-encoded credentials. The returned
    /// access token is persisted for subsequent commands.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        let response = self.check(response).await?;
        let token: TokenResponse = response.json().await?;

        self.session.store(&token.access_token)?;
        self.token = Some(token.access_token.clone());
        info!(username, "logged in");
        Ok(token)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.session.clear()?;
        self.token = None;
        Ok(())
    }
}
