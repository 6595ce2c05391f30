//! OAuth2 access tokens for Google Cloud APIs.
//!
//! Service accounts use the JWT → access-token exchange documented at
//! <https://developers.google.com/identity/protocols/oauth2/service-account>:
//!
//! 1. Build a JWT signed with the service account's RSA private key
//! 2. POST it to the token endpoint
//! 3. Receive an access token with an expiry
//! 4. Cache the token and refresh before expiry
//!
//! On GCE/GKE the metadata server mints the token instead. Static tokens and
//! anonymous access skip the exchange entirely.

use crate::config::{Credentials, ServiceAccountKey};
use crate::error::{GcpError, GcpResult};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    /// Issuer, the service account email.
    iss: String,
    /// Requested scopes (space-separated).
    scope: String,
    /// Audience, the token endpoint.
    aud: String,
    exp: i64,
    iat: i64,
}

/// An OAuth2 access token with metadata.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The bearer token string.
    pub token: String,
    /// When this token expires (unix timestamp seconds).
    pub expires_at: i64,
}

impl AccessToken {
    /// Check if the token is expired (with 60 s buffer).
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at - 60
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Resolved token source.
pub enum TokenSource {
    ServiceAccount {
        key: ServiceAccountKey,
        scopes: Vec<String>,
    },
    Static(String),
    MetadataServer {
        host: String,
        scopes: Vec<String>,
    },
    Anonymous,
}

impl TokenSource {
    /// Resolve configured credentials, reading key files eagerly.
    pub fn from_credentials(credentials: &Credentials, scopes: &[String]) -> GcpResult<Self> {
        Ok(match credentials {
            Credentials::KeyFile { path } => TokenSource::ServiceAccount {
                key: ServiceAccountKey::from_file(path)?,
                scopes: scopes.to_vec(),
            },
            Credentials::KeyJson { json } => TokenSource::ServiceAccount {
                key: ServiceAccountKey::from_json(json)?,
                scopes: scopes.to_vec(),
            },
            Credentials::AccessToken { token } => TokenSource::Static(token.clone()),
            Credentials::MetadataServer { host } => TokenSource::MetadataServer {
                host: host.clone(),
                scopes: scopes.to_vec(),
            },
            Credentials::Anonymous => TokenSource::Anonymous,
        })
    }
}

/// Cached token manager.
///
/// Shared by reference: the cache sits behind an async mutex so concurrent
/// requests wait for a single refresh.
pub struct TokenManager {
    source: TokenSource,
    cached_token: Mutex<Option<AccessToken>>,
    http_client: Client,
}

impl TokenManager {
    pub fn new(source: TokenSource, http_client: Client) -> Self {
        Self {
            source,
            cached_token: Mutex::new(None),
            http_client,
        }
    }

    /// Get a valid access token, refreshing if needed. `None` means the
    /// request goes out without an `Authorization` header.
    pub async fn get_token(&self) -> GcpResult<Option<String>> {
        match self.source {
            TokenSource::Anonymous => return Ok(None),
            TokenSource::Static(ref token) => return Ok(Some(token.clone())),
            _ => {}
        }

        let mut cached = self.cached_token.lock().await;
        if let Some(ref token) = *cached {
            if !token.is_expired() {
                return Ok(Some(token.token.clone()));
            }
        }
        let token = self.fetch_new_token().await?;
        log::debug!("fetched access token, expires at {}", token.expires_at);
        let result = token.token.clone();
        *cached = Some(token);
        Ok(Some(result))
    }

    /// Drop the cached token and fetch a new one.
    pub async fn refresh(&self) -> GcpResult<Option<String>> {
        *self.cached_token.lock().await = None;
        self.get_token().await
    }

    /// Service account email, when the source is a key.
    pub fn service_account_email(&self) -> Option<&str> {
        match self.source {
            TokenSource::ServiceAccount { ref key, .. } => Some(&key.client_email),
            _ => None,
        }
    }

    /// Project named in the key file, if any.
    pub fn key_project_id(&self) -> Option<&str> {
        match self.source {
            TokenSource::ServiceAccount { ref key, .. } if !key.project_id.is_empty() => {
                Some(&key.project_id)
            }
            _ => None,
        }
    }

    async fn fetch_new_token(&self) -> GcpResult<AccessToken> {
        match self.source {
            TokenSource::ServiceAccount {
                ref key,
                ref scopes,
            } => self.exchange_jwt(key, scopes).await,
            TokenSource::MetadataServer {
                ref host,
                ref scopes,
            } => self.metadata_token(host, scopes).await,
            TokenSource::Static(_) | TokenSource::Anonymous => {
                Err(GcpError::auth_error("token source does not refresh"))
            }
        }
    }

    /// Exchange a JWT assertion for an access token.
    async fn exchange_jwt(
        &self,
        key: &ServiceAccountKey,
        scopes: &[String],
    ) -> GcpResult<AccessToken> {
        let now = Utc::now().timestamp();
        let jwt = build_assertion(key, scopes, now)?;

        let form = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];

        let response = self
            .http_client
            .post(&key.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| GcpError::auth_error(&format!("Token exchange request failed: {}", e)))?;

        parse_token_response(response, now).await
    }

    /// Ask the metadata server for the default service account's token.
    async fn metadata_token(&self, host: &str, scopes: &[String]) -> GcpResult<AccessToken> {
        let now = Utc::now().timestamp();
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host)
        };
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            base
        );
        let scope_list = scopes.join(",");

        let response = self
            .http_client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .query(&[("scopes", scope_list.as_str())])
            .send()
            .await
            .map_err(|e| GcpError::auth_error(&format!("Metadata server unreachable: {}", e)))?;

        parse_token_response(response, now).await
    }
}

async fn parse_token_response(response: reqwest::Response, now: i64) -> GcpResult<AccessToken> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(GcpError::auth_error(&format!(
            "Token request failed (HTTP {}): {}",
            status, body
        )));
    }

    let token_resp: TokenResponse = response
        .json()
        .await
        .map_err(|e| GcpError::auth_error(&format!("Failed to parse token response: {}", e)))?;

    Ok(AccessToken {
        token: token_resp.access_token,
        expires_at: now + token_resp.expires_in.unwrap_or(3600),
    })
}

/// Sign the RS256 assertion for the token exchange.
pub fn build_assertion(key: &ServiceAccountKey, scopes: &[String], now: i64) -> GcpResult<String> {
    let claims = JwtClaims {
        iss: key.client_email.clone(),
        scope: scopes.join(" "),
        aud: key.token_uri.clone(),
        exp: now + 3600,
        iat: now,
    };

    let header = Header {
        alg: Algorithm::RS256,
        kid: (!key.private_key_id.is_empty()).then(|| key.private_key_id.clone()),
        ..Default::default()
    };

    // Normalise PEM line breaks.
    let pem = key.private_key.replace("\\n", "\n");

    let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|e| GcpError::auth_error(&format!("Failed to load private key: {}", e)))?;

    encode(&header, &claims, &encoding_key)
        .map_err(|e| GcpError::auth_error(&format!("Failed to encode JWT: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(private_key: &str) -> ServiceAccountKey {
        ServiceAccountKey {
            r#type: "service_account".to_string(),
            project_id: "p".to_string(),
            private_key_id: "kid".to_string(),
            private_key: private_key.to_string(),
            client_email: "sa@p.iam.gserviceaccount.com".to_string(),
            client_id: String::new(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            universe_domain: None,
        }
    }

    #[test]
    fn token_expiry_buffer() {
        let now = Utc::now().timestamp();
        assert!(AccessToken { token: "t".into(), expires_at: now + 30 }.is_expired());
        assert!(!AccessToken { token: "t".into(), expires_at: now + 600 }.is_expired());
    }

    #[test]
    fn bad_pem_is_auth_error() {
        let err = build_assertion(&key("not a pem"), &[], 0).unwrap_err();
        assert_eq!(err.status, "UNAUTHENTICATED");
        assert!(err.message.contains("private key"));
    }

    #[tokio::test]
    async fn static_and_anonymous_sources() {
        let tm = TokenManager::new(TokenSource::Static("abc".into()), Client::new());
        assert_eq!(tm.get_token().await.unwrap().as_deref(), Some("abc"));
        assert!(tm.service_account_email().is_none());

        let anon = TokenManager::new(TokenSource::Anonymous, Client::new());
        assert!(anon.get_token().await.unwrap().is_none());
    }

    #[test]
    fn key_source_exposes_identity() {
        let tm = TokenManager::new(
            TokenSource::ServiceAccount {
                key: key("k"),
                scopes: vec![],
            },
            Client::new(),
        );
        assert_eq!(tm.service_account_email(), Some("sa@p.iam.gserviceaccount.com"));
        assert_eq!(tm.key_project_id(), Some("p"));
    }
}
