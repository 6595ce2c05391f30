//! Base GCP HTTP client with OAuth2 token management.
//!
//! All GCP REST APIs follow a consistent pattern:
//! - Base URL: `https://{service}.googleapis.com`, or the regional
//!   `https://{service}.{location}.rep.googleapis.com`
//! - Auth: `Authorization: Bearer {access_token}`
//! - Request/Response: JSON
//! - Pagination: `pageToken` / `nextPageToken`
//!
//! This client handles token acquisition, endpoint resolution, and error
//! parsing. It never retries: a failed call is returned to the snippet.

use crate::auth::{TokenManager, TokenSource};
use crate::config::ClientConfig;
use crate::error::{GcpError, GcpResult};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Base GCP API client. Share it by reference; all methods take `&self`.
/// Clones share the connection pool and the token cache.
#[derive(Clone)]
pub struct GcpClient {
    http: Client,
    token_manager: Arc<TokenManager>,
    project_id: Option<String>,
    endpoint: Option<String>,
    endpoint_overrides: HashMap<String, String>,
    anonymous_services: Vec<String>,
    user_agent: String,
    pub(crate) poll_interval: Duration,
    pub(crate) max_polls: u32,
}

impl GcpClient {
    /// Create a client from an explicit configuration.
    pub fn new(config: ClientConfig) -> GcpResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(10)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GcpError::config(&format!("Cannot build HTTP client: {}", e)))?;

        let source = TokenSource::from_credentials(&config.credentials, &config.scopes)?;
        let token_manager = Arc::new(TokenManager::new(source, http.clone()));

        Ok(Self {
            http,
            token_manager,
            project_id: config.project_id,
            endpoint: config.endpoint,
            endpoint_overrides: config.endpoint_overrides,
            anonymous_services: config.anonymous_services,
            user_agent: config.user_agent,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
        })
    }

    /// Create a client from `GOOGLE_*` environment variables.
    pub fn from_env() -> GcpResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Default project: the configured one, else the key file's.
    pub fn project_id(&self) -> GcpResult<&str> {
        self.project_id
            .as_deref()
            .or_else(|| self.token_manager.key_project_id())
            .ok_or_else(|| GcpError::config("no project configured; set GOOGLE_CLOUD_PROJECT"))
    }

    /// Get the service account email, when authenticating with a key.
    pub fn service_account_email(&self) -> Option<&str> {
        self.token_manager.service_account_email()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Service identifier for a locational endpoint, e.g. `modelarmor.us-central1.rep`.
    pub fn regional(service: &str, location: &str) -> String {
        format!("{}.{}.rep", service, location)
    }

    /// Build the base URL for a service.
    pub fn base_url(&self, service: &str) -> String {
        let name = service_name(service);
        if let Some(url) = self.endpoint_overrides.get(name) {
            url.trim_end_matches('/').to_string()
        } else if let Some(ref url) = self.endpoint {
            url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}.googleapis.com", service)
        }
    }

    /// Get a valid bearer token for a service, if it needs one.
    pub async fn get_token(&self, service: &str) -> GcpResult<Option<String>> {
        let name = service_name(service);
        if self.anonymous_services.iter().any(|s| s == name) {
            return Ok(None);
        }
        self.token_manager.get_token().await
    }

    /// Force refresh the token.
    pub async fn refresh_token(&self) -> GcpResult<Option<String>> {
        self.token_manager.refresh().await
    }

    // ── Generic REST methods ────────────────────────────────────────

    async fn request(&self, service: &str, method: Method, path: &str) -> GcpResult<RequestBuilder> {
        let url = format!("{}{}", self.base_url(service), path);
        log::debug!("{} {}", method, url);
        let mut builder = self.http.request(method, &url);
        if let Some(token) = self.get_token(service).await? {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn execute<T: DeserializeOwned>(&self, service: &str, req: RequestBuilder) -> GcpResult<T> {
        let name = service_name(service);
        let response = req
            .send()
            .await
            .map_err(|e| GcpError::from_str(name, &format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GcpError::from_str(name, &format!("Body read error: {}", e)))?;

        if status >= 400 {
            return Err(GcpError::from_api_response(name, status, &body));
        }
        decode(name, &body)
    }

    /// GET a GCP API URL and deserialize the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> GcpResult<T> {
        let req = self.request(service, Method::GET, path).await?.query(query);
        self.execute(service, req).await
    }

    /// POST JSON to a GCP API and deserialize the response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        body: &B,
    ) -> GcpResult<T> {
        self.post_with_query(service, path, &[], body).await
    }

    /// POST JSON with query parameters (`?channelId=...` style creates).
    pub async fn post_with_query<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> GcpResult<T> {
        let req = self
            .request(service, Method::POST, path)
            .await?
            .query(query)
            .json(body);
        self.execute(service, req).await
    }

    /// PUT JSON to a GCP API.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        body: &B,
    ) -> GcpResult<T> {
        let req = self.request(service, Method::PUT, path).await?.json(body);
        self.execute(service, req).await
    }

    /// PATCH JSON to a GCP API.
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        body: &B,
        query: &[(&str, &str)],
    ) -> GcpResult<T> {
        let req = self
            .request(service, Method::PATCH, path)
            .await?
            .query(query)
            .json(body);
        self.execute(service, req).await
    }

    /// DELETE a resource and deserialize whatever the API returns
    /// (an operation, or the empty message).
    pub async fn delete<T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> GcpResult<T> {
        let req = self.request(service, Method::DELETE, path).await?.query(query);
        self.execute(service, req).await
    }

    // ── Pagination helpers ──────────────────────────────────────────

    /// Fetch all pages of a paginated list endpoint.
    ///
    /// `extract` pulls the item Vec and the next page token out of each page.
    pub async fn get_all_pages<P, T, F>(
        &self,
        service: &str,
        path: &str,
        base_query: &[(&str, &str)],
        extract: F,
    ) -> GcpResult<Vec<T>>
    where
        P: DeserializeOwned,
        F: Fn(P) -> (Vec<T>, Option<String>),
    {
        let mut all_items: Vec<T> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = base_query.to_vec();
            if let Some(ref pt) = page_token {
                query.push(("pageToken", pt.as_str()));
            }

            let page: P = self.get(service, path, &query).await?;
            let (items, next) = extract(page);
            all_items.extend(items);

            match next.filter(|t| !t.is_empty()) {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }

        Ok(all_items)
    }
}

/// Service name without a location suffix.
fn service_name(service: &str) -> &str {
    service.split('.').next().unwrap_or(service)
}

/// Empty bodies (`204`, or `DELETE` without content) decode as `{}`.
fn decode<T: DeserializeOwned>(service: &str, body: &str) -> GcpResult<T> {
    let text = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(text)
        .map_err(|e| GcpError::from_str(service, &format!("JSON parse error: {}", e)))
}

/// The API's `google.protobuf.Empty` response.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Empty {}
