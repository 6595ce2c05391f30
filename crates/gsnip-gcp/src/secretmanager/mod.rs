//! Secret Manager snippets.
//!
//! Global secrets live at `https://secretmanager.googleapis.com/v1`;
//! regional secrets at `https://secretmanager.{location}.rep.googleapis.com/v1`
//! under `projects/{p}/locations/{l}`. Both share the request helpers below,
//! parameterized by endpoint.

pub mod notification;
pub mod regional;
pub mod secrets;

pub use notification::{consume_event_notification, EventNotification};

use crate::client::{Empty, GcpClient};
use crate::error::{Context, GcpError, GcpResult};
use crate::iam::{IamClient, IamPolicy};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub(crate) const SERVICE: &str = "secretmanager";
const V1: &str = "/v1";

/// CRC32C (Castagnoli), the checksum Secret Manager stores with payloads.
const CASTAGNOLI: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);

pub fn crc32c(data: &[u8]) -> i64 {
    i64::from(CASTAGNOLI.checksum(data))
}

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerManagedEncryption {
    pub kms_key_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticReplication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_managed_encryption: Option<CustomerManagedEncryption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Replica {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_managed_encryption: Option<CustomerManagedEncryption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserManagedReplication {
    #[serde(default)]
    pub replicas: Vec<Replica>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Replication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic: Option<AutomaticReplication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_managed: Option<UserManagedReplication>,
}

impl Replication {
    pub fn automatic() -> Self {
        Self {
            automatic: Some(AutomaticReplication::default()),
            user_managed: None,
        }
    }

    pub fn user_managed(locations: &[&str]) -> Self {
        Self {
            automatic: None,
            user_managed: Some(UserManagedReplication {
                replicas: locations
                    .iter()
                    .map(|l| Replica {
                        location: l.to_string(),
                        customer_managed_encryption: None,
                    })
                    .collect(),
            }),
        }
    }

    /// Short form for printing: `automatic` or `user_managed[loc, ...]`.
    pub fn describe(&self) -> String {
        match (&self.automatic, &self.user_managed) {
            (Some(_), _) => "automatic".to_string(),
            (None, Some(um)) => {
                let locs: Vec<&str> = um.replicas.iter().map(|r| r.location.as_str()).collect();
                format!("user_managed[{}]", locs.join(", "))
            }
            (None, None) => "none".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_rotation_time: Option<String>,
    /// Duration string, e.g. `"86400s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_period: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication: Option<Replication>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Input only: the secret expires this long after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<TopicRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    /// Alias to version number; int64 values travel as strings.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub version_aliases: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_destroy_ttl: Option<String>,
    /// Regional secrets carry CMEK here instead of in `replication`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_managed_encryption: Option<CustomerManagedEncryption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVersion {
    #[serde(default)]
    pub name: String,
    /// ENABLED, DISABLED or DESTROYED.
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destroy_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretPayload {
    /// Base64 of the secret bytes.
    #[serde(default)]
    pub data: String,
    #[serde(
        default,
        rename = "dataCrc32c",
        with = "crate::int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_crc32c: Option<i64>,
}

impl SecretPayload {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(data),
            data_crc32c: Some(crc32c(data)),
        }
    }

    /// Decode the payload and verify it against its checksum, if present.
    pub fn verified_bytes(&self, service: &str) -> GcpResult<Vec<u8>> {
        let bytes = STANDARD.decode(&self.data).map_err(|e| {
            GcpError::data_loss(service, &format!("payload is not base64: {}", e))
        })?;
        match self.data_crc32c {
            Some(expected) if expected != crc32c(&bytes) => {
                Err(GcpError::data_loss(service, "Data corruption detected."))
            }
            _ => Ok(bytes),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessSecretVersionResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretList {
    #[serde(default)]
    secrets: Vec<Secret>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionList {
    #[serde(default)]
    versions: Vec<SecretVersion>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Version state transitions exposed as custom methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VersionAction {
    Enable,
    Disable,
    Destroy,
}

impl VersionAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Destroy => "destroy",
        }
    }

    fn method(self) -> &'static str {
        match self {
            Self::Enable => "EnableSecretVersion",
            Self::Disable => "DisableSecretVersion",
            Self::Destroy => "DestroySecretVersion",
        }
    }
}

// ── Shared requests ─────────────────────────────────────────────────────
//
// `service` is `secretmanager` or its regional form; `parent` and `name`
// are full resource names.

pub(crate) async fn insert_secret(
    client: &GcpClient,
    service: &str,
    parent: &str,
    secret_id: &str,
    secret: &Secret,
) -> GcpResult<Secret> {
    let path = format!("{}/{}/secrets", V1, parent);
    client
        .post_with_query(service, &path, &[("secretId", secret_id)], secret)
        .await
        .context("CreateSecret")
}

pub(crate) async fn fetch_secret(client: &GcpClient, service: &str, name: &str) -> GcpResult<Secret> {
    client
        .get(service, &format!("{}/{}", V1, name), &[])
        .await
        .context("GetSecret")
}

pub(crate) async fn patch_secret(
    client: &GcpClient,
    service: &str,
    secret: &Secret,
    update_mask: &str,
) -> GcpResult<Secret> {
    let path = format!("{}/{}", V1, secret.name);
    client
        .patch(service, &path, secret, &[("updateMask", update_mask)])
        .await
        .context("UpdateSecret")
}

pub(crate) async fn remove_secret(
    client: &GcpClient,
    service: &str,
    name: &str,
    etag: Option<&str>,
) -> GcpResult<()> {
    let query: Vec<(&str, &str)> = etag.map(|e| vec![("etag", e)]).unwrap_or_default();
    let _: Empty = client
        .delete(service, &format!("{}/{}", V1, name), &query)
        .await
        .context("DeleteSecret")?;
    Ok(())
}

pub(crate) async fn fetch_secrets(
    client: &GcpClient,
    service: &str,
    parent: &str,
    filter: Option<&str>,
) -> GcpResult<Vec<Secret>> {
    let path = format!("{}/{}/secrets", V1, parent);
    let query: Vec<(&str, &str)> = filter.map(|f| vec![("filter", f)]).unwrap_or_default();
    client
        .get_all_pages(service, &path, &query, |p: SecretList| (p.secrets, p.next_page_token))
        .await
        .context("ListSecrets")
}

pub(crate) async fn insert_version(
    client: &GcpClient,
    service: &str,
    secret_name: &str,
    data: &[u8],
) -> GcpResult<SecretVersion> {
    let path = format!("{}/{}:addVersion", V1, secret_name);
    let body = serde_json::json!({ "payload": SecretPayload::new(data) });
    client
        .post(service, &path, &body)
        .await
        .context("AddSecretVersion")
}

pub(crate) async fn fetch_version(
    client: &GcpClient,
    service: &str,
    name: &str,
) -> GcpResult<SecretVersion> {
    client
        .get(service, &format!("{}/{}", V1, name), &[])
        .await
        .context("GetSecretVersion")
}

pub(crate) async fn fetch_versions(
    client: &GcpClient,
    service: &str,
    secret_name: &str,
    filter: Option<&str>,
) -> GcpResult<Vec<SecretVersion>> {
    let path = format!("{}/{}/versions", V1, secret_name);
    let query: Vec<(&str, &str)> = filter.map(|f| vec![("filter", f)]).unwrap_or_default();
    client
        .get_all_pages(service, &path, &query, |p: VersionList| (p.versions, p.next_page_token))
        .await
        .context("ListSecretVersions")
}

/// Access a version and return its checksum-verified payload.
pub(crate) async fn access_version(
    client: &GcpClient,
    service: &str,
    name: &str,
) -> GcpResult<Vec<u8>> {
    let path = format!("{}/{}:access", V1, name);
    let resp: AccessSecretVersionResponse = client
        .get(service, &path, &[])
        .await
        .context("AccessSecretVersion")?;
    resp.payload.verified_bytes(service).context("AccessSecretVersion")
}

pub(crate) async fn change_version_state(
    client: &GcpClient,
    service: &str,
    name: &str,
    action: VersionAction,
    etag: Option<&str>,
) -> GcpResult<SecretVersion> {
    let path = format!("{}/{}:{}", V1, name, action.verb());
    let body = match etag {
        Some(e) => serde_json::json!({ "etag": e }),
        None => serde_json::json!({}),
    };
    client
        .post(service, &path, &body)
        .await
        .context(action.method())
}

/// Add or drop `member` on `roles/secretmanager.secretAccessor`.
pub(crate) async fn update_accessor(
    client: &GcpClient,
    service: &str,
    secret_name: &str,
    member: &str,
    grant: bool,
) -> GcpResult<IamPolicy> {
    const ROLE: &str = "roles/secretmanager.secretAccessor";
    let mut policy = IamClient::get_policy(client, service, secret_name)
        .await
        .context("GetIamPolicy")?;
    if grant {
        policy.add(ROLE, member);
    } else {
        policy.remove(ROLE, member);
    }
    IamClient::set_policy(client, service, secret_name, &policy)
        .await
        .context("SetIamPolicy")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32c_check_value() {
        // Standard CRC-32C check value for "123456789".
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn payload_checksum_round_trip() {
        let payload = SecretPayload::new(b"my super secret data");
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["dataCrc32c"].is_string());
        assert_eq!(payload.verified_bytes(SERVICE).unwrap(), b"my super secret data");
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let mut payload = SecretPayload::new(b"my super secret data");
        payload.data_crc32c = payload.data_crc32c.map(|c| c + 1);
        let err = payload.verified_bytes(SERVICE).unwrap_err();
        assert_eq!(err.status, "DATA_LOSS");
        assert_eq!(err.message, "Data corruption detected.");
    }

    #[test]
    fn replication_description() {
        assert_eq!(Replication::automatic().describe(), "automatic");
        assert_eq!(
            Replication::user_managed(&["us-east1", "us-east4"]).describe(),
            "user_managed[us-east1, us-east4]"
        );
    }
}
