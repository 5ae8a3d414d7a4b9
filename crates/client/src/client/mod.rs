//! Smart Scheduler users API client

pub mod users;

use crate::cookie::{REFRESH_COOKIE, get_cookie, set_cookie};
use crate::error::ClientError;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, ClientBuilder, StatusCode, Url, header};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_USER_AGENT: &str = concat!("scheduler-client/", env!("CARGO_PKG_VERSION"));

/// Users API client.
///
/// Every request shares one cookie jar, so the `refresh-token` cookie set by
/// login is sent back on refresh and logout the way a browser would.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    origin: Url,
    jar: Arc<Jar>,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a request builder carrying only the cookie jar
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Create a request builder with bearer authentication
    pub fn authorized(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
    ) -> reqwest::RequestBuilder {
        self.request(method, path)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Execute a request and decode a JSON body
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// Execute a request whose success is a specific bodiless status
    pub async fn execute_empty(
        &self,
        request: reqwest::RequestBuilder,
        expected: StatusCode,
    ) -> Result<(), ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status == expected {
            Ok(())
        } else if status.is_success() {
            Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
            })
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// Current value of the refresh cookie held by the jar
    pub fn refresh_cookie(&self) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let header = header.to_str().ok()?;
        get_cookie(header, REFRESH_COOKIE).filter(|value| !value.is_empty())
    }

    /// Seed the jar with a cookie string, e.g. one restored from storage
    pub fn restore_cookie(&self, cookie: &str) {
        debug!(origin = %self.origin, "Restoring cookie into jar");
        self.jar.add_cookie_str(cookie, &self.origin);
    }

    /// Drop the refresh cookie from the jar
    pub fn expire_refresh_cookie(&self) {
        self.jar
            .add_cookie_str(&set_cookie(REFRESH_COOKIE, "", -1), &self.origin);
    }
}

/// Builder for `ApiClient`
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        let origin = Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url: {e}")))?;

        let jar = Arc::new(Jar::default());
        let mut client_builder = ClientBuilder::new().cookie_provider(jar.clone());

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        );

        let client = client_builder.build()?;

        Ok(ApiClient {
            client,
            base_url,
            origin,
            jar,
        })
    }
}
