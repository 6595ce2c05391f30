//! Client configuration and credential discovery.
//!
//! A [`ClientConfig`] can be built in code, loaded from a JSON file, or
//! discovered from the process environment with [`ClientConfig::from_env`]:
//!
//! | Variable                         | Effect                                            |
//! |----------------------------------|---------------------------------------------------|
//! | `GOOGLE_CLOUD_PROJECT`           | default project id                                |
//! | `GOOGLE_OAUTH_ACCESS_TOKEN`      | use this bearer token as-is                       |
//! | `GOOGLE_APPLICATION_CREDENTIALS` | service-account key file (JWT flow)               |
//! | `GCE_METADATA_HOST`              | metadata server host (default `metadata.google.internal`) |
//! | `GSNIP_API_ENDPOINT`             | base URL used for every service                   |
//! | `PUBSUB_EMULATOR_HOST`           | plain-HTTP endpoint for Pub/Sub, no auth          |
//!
//! Without any credential variable the GCE metadata server is used.

use crate::error::{GcpError, GcpResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

// ── Service Account Key ─────────────────────────────────────────────────

/// Parsed service account key JSON file (downloaded from Google Cloud Console).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub r#type: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub universe_domain: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    /// Parse a service account key from a JSON string.
    pub fn from_json(json: &str) -> GcpResult<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| GcpError::config(&format!("Invalid service account key JSON: {}", e)))?;
        key.validate()?;
        Ok(key)
    }

    /// Read and parse a key file.
    pub fn from_file(path: &Path) -> GcpResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GcpError::config(&format!("Cannot read key file {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Validate the key has required fields.
    pub fn validate(&self) -> GcpResult<()> {
        if self.r#type != "service_account" {
            return Err(GcpError::config(&format!(
                "Expected type 'service_account', got '{}'",
                self.r#type
            )));
        }
        if self.private_key.is_empty() {
            return Err(GcpError::config("private_key is empty"));
        }
        if self.client_email.is_empty() {
            return Err(GcpError::config("client_email is empty"));
        }
        if self.token_uri.is_empty() {
            return Err(GcpError::config("token_uri is empty"));
        }
        Ok(())
    }
}

// ── Credentials ─────────────────────────────────────────────────────────

/// Where access tokens come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    /// Service-account key file on disk.
    KeyFile { path: PathBuf },
    /// Service-account key JSON held in memory.
    KeyJson { json: String },
    /// Pre-minted bearer token, never refreshed.
    AccessToken { token: String },
    /// GCE/GKE metadata server.
    MetadataServer {
        #[serde(default = "default_metadata_host")]
        host: String,
    },
    /// No `Authorization` header (emulators).
    Anonymous,
}

fn default_metadata_host() -> String {
    DEFAULT_METADATA_HOST.to_string()
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::MetadataServer {
            host: default_metadata_host(),
        }
    }
}

// ── Client Config ───────────────────────────────────────────────────────

/// Configuration for [`crate::client::GcpClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default project; snippets always take the project explicitly, the
    /// binary falls back to this.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub credentials: Credentials,
    /// OAuth2 scopes to request.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Base URL used for every service instead of `https://{service}.googleapis.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Per-service base URLs, keyed by service name (`pubsub`, `compute`, ...).
    #[serde(default)]
    pub endpoint_overrides: HashMap<String, String>,
    /// Services reached without credentials (emulators).
    #[serde(default)]
    pub anonymous_services: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Delay between long-running operation polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Polls before an operation wait gives up.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

fn default_scopes() -> Vec<String> {
    vec![CLOUD_PLATFORM_SCOPE.to_string()]
}

fn default_user_agent() -> String {
    format!("gsnip/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_max_polls() -> u32 {
    900
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials: Credentials::default(),
            scopes: default_scopes(),
            endpoint: None,
            endpoint_overrides: HashMap::new(),
            anonymous_services: Vec::new(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_polls: default_max_polls(),
        }
    }
}

impl ClientConfig {
    /// Discover configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Discover configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        cfg.project_id = var("GOOGLE_CLOUD_PROJECT");

        cfg.credentials = if let Some(token) = var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            Credentials::AccessToken { token }
        } else if let Some(path) = var("GOOGLE_APPLICATION_CREDENTIALS") {
            Credentials::KeyFile {
                path: PathBuf::from(path),
            }
        } else {
            Credentials::MetadataServer {
                host: var("GCE_METADATA_HOST").unwrap_or_else(default_metadata_host),
            }
        };

        cfg.endpoint = var("GSNIP_API_ENDPOINT");

        if let Some(host) = var("PUBSUB_EMULATOR_HOST") {
            let url = if host.starts_with("http://") || host.starts_with("https://") {
                host
            } else {
                format!("http://{}", host)
            };
            cfg.endpoint_overrides.insert("pubsub".to_string(), url);
            cfg.anonymous_services.push("pubsub".to_string());
        }

        cfg
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: &Path) -> GcpResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GcpError::config(&format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let cfg: Self = serde_json::from_str(&json)
            .map_err(|e| GcpError::config(&format!("Invalid config JSON: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Route every service to `endpoint` without credentials.
    pub fn for_endpoint(endpoint: &str) -> Self {
        Self {
            credentials: Credentials::Anonymous,
            endpoint: Some(endpoint.trim_end_matches('/').to_string()),
            ..Self::default()
        }
    }

    pub fn with_project(mut self, project_id: &str) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_polling(mut self, poll_interval_ms: u64, max_polls: u32) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self.max_polls = max_polls;
        self
    }

    /// Validate the config.
    pub fn validate(&self) -> GcpResult<()> {
        if self.scopes.is_empty() {
            return Err(GcpError::config("at least one OAuth2 scope is required"));
        }
        if self.max_polls == 0 {
            return Err(GcpError::config("max_polls must be greater than zero"));
        }
        let endpoints = self.endpoint.iter().chain(self.endpoint_overrides.values());
        for ep in endpoints {
            url::Url::parse(ep)
                .map_err(|e| GcpError::config(&format!("Invalid endpoint '{}': {}", ep, e)))?;
        }
        if let Credentials::KeyJson { ref json } = self.credentials {
            ServiceAccountKey::from_json(json)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_defaults_to_metadata_server() {
        let cfg = ClientConfig::from_lookup(lookup(&[]));
        assert!(cfg.project_id.is_none());
        match cfg.credentials {
            Credentials::MetadataServer { host } => assert_eq!(host, DEFAULT_METADATA_HOST),
            other => panic!("unexpected credentials {:?}", other),
        }
        assert_eq!(cfg.scopes, vec![CLOUD_PLATFORM_SCOPE.to_string()]);
    }

    #[test]
    fn access_token_wins_over_key_file() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("GOOGLE_CLOUD_PROJECT", "my-project"),
            ("GOOGLE_OAUTH_ACCESS_TOKEN", "ya29.token"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/key.json"),
        ]));
        assert_eq!(cfg.project_id.as_deref(), Some("my-project"));
        assert!(matches!(cfg.credentials, Credentials::AccessToken { ref token } if token == "ya29.token"));
    }

    #[test]
    fn key_file_and_blank_values() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("GOOGLE_OAUTH_ACCESS_TOKEN", "  "),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/key.json"),
        ]));
        assert!(matches!(cfg.credentials, Credentials::KeyFile { ref path } if path == Path::new("/tmp/key.json")));
    }

    #[test]
    fn pubsub_emulator_is_anonymous_http() {
        let cfg = ClientConfig::from_lookup(lookup(&[("PUBSUB_EMULATOR_HOST", "localhost:8085")]));
        assert_eq!(
            cfg.endpoint_overrides.get("pubsub").map(String::as_str),
            Some("http://localhost:8085")
        );
        assert_eq!(cfg.anonymous_services, vec!["pubsub".to_string()]);
    }

    #[test]
    fn validate_rejects_bad_endpoint() {
        let mut cfg = ClientConfig::default();
        cfg.endpoint = Some("not a url".to_string());
        assert!(cfg.validate().is_err());
        cfg.endpoint = Some("http://127.0.0.1:9000".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gsnip.json");
        std::fs::write(
            &path,
            r#"{"project_id":"p","credentials":{"kind":"access_token","token":"t"},"poll_interval_ms":10}"#,
        )
        .unwrap();
        let cfg = ClientConfig::from_file(&path).unwrap();
        assert_eq!(cfg.project_id.as_deref(), Some("p"));
        assert_eq!(cfg.poll_interval_ms, 10);
        assert_eq!(cfg.max_polls, 900);
        assert!(matches!(cfg.credentials, Credentials::AccessToken { .. }));
    }

    #[test]
    fn key_json_validation() {
        let bad = r#"{"type":"authorized_user","private_key":"k","client_email":"e"}"#;
        assert!(ServiceAccountKey::from_json(bad).is_err());
        let good = r#"{"type":"service_account","private_key":"k","client_email":"e@p.iam.gserviceaccount.com"}"#;
        let key = ServiceAccountKey::from_json(good).unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
    }
}
