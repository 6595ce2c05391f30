//! Resource-level IAM policies.
//!
//! Pub/Sub topics and subscriptions and Secret Manager secrets expose the same
//! three methods on the resource itself:
//! `GET {resource}:getIamPolicy`, `POST {resource}:setIamPolicy`,
//! `POST {resource}:testIamPermissions`.

use crate::client::GcpClient;
use crate::error::GcpResult;
use serde::{Deserialize, Serialize};

// ── Types ───────────────────────────────────────────────────────────────

/// IAM policy binding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyBinding {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<PolicyCondition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyCondition {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub expression: String,
}

/// IAM policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IamPolicy {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub bindings: Vec<PolicyBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl IamPolicy {
    /// Grant `role` to `member`, creating the binding if needed.
    pub fn add(&mut self, role: &str, member: &str) {
        match self.bindings.iter_mut().find(|b| b.role == role && b.condition.is_none()) {
            Some(binding) => {
                if !binding.members.iter().any(|m| m == member) {
                    binding.members.push(member.to_string());
                }
            }
            None => self.bindings.push(PolicyBinding {
                role: role.to_string(),
                members: vec![member.to_string()],
                condition: None,
            }),
        }
    }

    /// Revoke `role` from `member`; empty bindings are dropped.
    pub fn remove(&mut self, role: &str, member: &str) {
        for binding in self.bindings.iter_mut().filter(|b| b.role == role) {
            binding.members.retain(|m| m != member);
        }
        self.bindings.retain(|b| !b.members.is_empty());
    }

    /// Members bound to `role`.
    pub fn members(&self, role: &str) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|b| b.role == role)
            .flat_map(|b| b.members.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct TestPermissionsResponse {
    #[serde(default)]
    permissions: Vec<String>,
}

// ── IAM Client ──────────────────────────────────────────────────────────

pub struct IamClient;

impl IamClient {
    /// Get the IAM policy attached to `resource` (e.g. `projects/p/topics/t`).
    pub async fn get_policy(
        client: &GcpClient,
        service: &str,
        resource: &str,
    ) -> GcpResult<IamPolicy> {
        let path = format!("/v1/{}:getIamPolicy", resource);
        client.get(service, &path, &[]).await
    }

    /// Replace the IAM policy attached to `resource`.
    pub async fn set_policy(
        client: &GcpClient,
        service: &str,
        resource: &str,
        policy: &IamPolicy,
    ) -> GcpResult<IamPolicy> {
        let path = format!("/v1/{}:setIamPolicy", resource);
        let body = serde_json::json!({ "policy": policy });
        client.post(service, &path, &body).await
    }

    /// Return the subset of `permissions` the caller holds on `resource`.
    pub async fn test_permissions(
        client: &GcpClient,
        service: &str,
        resource: &str,
        permissions: &[&str],
    ) -> GcpResult<Vec<String>> {
        let path = format!("/v1/{}:testIamPermissions", resource);
        let body = serde_json::json!({ "permissions": permissions });
        let resp: TestPermissionsResponse = client.post(service, &path, &body).await?;
        Ok(resp.permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_merges_into_existing_binding() {
        let mut policy = IamPolicy::default();
        policy.add("roles/viewer", "allUsers");
        policy.add("roles/viewer", "user:a@example.com");
        policy.add("roles/viewer", "allUsers");
        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.members("roles/viewer"), vec!["allUsers", "user:a@example.com"]);
    }

    #[test]
    fn remove_drops_empty_bindings() {
        let mut policy = IamPolicy::default();
        policy.add("roles/editor", "group:g@example.com");
        policy.add("roles/viewer", "allUsers");
        policy.remove("roles/editor", "group:g@example.com");
        assert_eq!(policy.bindings.len(), 1);
        assert!(policy.members("roles/editor").is_empty());
    }

    #[test]
    fn etag_round_trips() {
        let policy: IamPolicy =
            serde_json::from_str(r#"{"version":1,"etag":"BwX=","bindings":[]}"#).unwrap();
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["etag"], "BwX=");
    }
}
