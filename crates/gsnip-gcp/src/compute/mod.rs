//! Google Compute Engine: persistent disks and the resources around them.
//!
//! API base: `https://compute.googleapis.com/compute/v1`
//!
//! Every mutation returns a Compute [`ComputeOperation`](crate::operation::ComputeOperation)
//! that the snippets wait on before printing their confirmation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod consistency_groups;
pub mod disks;
pub mod snapshots;
pub mod storage_pools;

pub(crate) const SERVICE: &str = "compute";
pub(crate) const V1: &str = "/compute/v1";

pub(crate) fn zonal(project: &str, zone: &str) -> String {
    format!("{}/projects/{}/zones/{}", V1, project, zone)
}

pub(crate) fn regional(project: &str, region: &str) -> String {
    format!("{}/projects/{}/regions/{}", V1, project, region)
}

pub(crate) fn global(project: &str) -> String {
    format!("{}/projects/{}/global", V1, project)
}

// ── Types ───────────────────────────────────────────────────────────────

/// Customer-supplied (CSEK) or customer-managed (CMEK) encryption key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerEncryptionKey {
    #[serde(default, rename = "rawKey", skip_serializing_if = "Option::is_none")]
    pub raw_key: Option<String>,
    #[serde(default, rename = "rsaEncryptedKey", skip_serializing_if = "Option::is_none")]
    pub rsa_encrypted_key: Option<String>,
    #[serde(default, rename = "kmsKeyName", skip_serializing_if = "Option::is_none")]
    pub kms_key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiskAsyncReplication {
    #[serde(default)]
    pub disk: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestOsFeature {
    #[serde(rename = "type")]
    pub feature_type: String,
}

/// Persistent disk, zonal or regional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Disk {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "sizeGb",
        with = "crate::int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub size_gb: Option<i64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, rename = "replicaZones", skip_serializing_if = "Vec::is_empty")]
    pub replica_zones: Vec<String>,
    #[serde(default, rename = "sourceImage", skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
    #[serde(default, rename = "sourceSnapshot", skip_serializing_if = "Option::is_none")]
    pub source_snapshot: Option<String>,
    #[serde(default, rename = "sourceDisk", skip_serializing_if = "Option::is_none")]
    pub source_disk: Option<String>,
    #[serde(default, rename = "diskEncryptionKey", skip_serializing_if = "Option::is_none")]
    pub disk_encryption_key: Option<CustomerEncryptionKey>,
    #[serde(default, rename = "asyncPrimaryDisk", skip_serializing_if = "Option::is_none")]
    pub async_primary_disk: Option<DiskAsyncReplication>,
    #[serde(default, rename = "guestOsFeatures", skip_serializing_if = "Vec::is_empty")]
    pub guest_os_features: Vec<GuestOsFeature>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, rename = "resourcePolicies", skip_serializing_if = "Vec::is_empty")]
    pub resource_policies: Vec<String>,
    #[serde(default, rename = "storagePool", skip_serializing_if = "Option::is_none")]
    pub storage_pool: Option<String>,
    #[serde(
        default,
        rename = "provisionedIops",
        with = "crate::int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub provisioned_iops: Option<i64>,
    #[serde(
        default,
        rename = "provisionedThroughput",
        with = "crate::int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub provisioned_throughput: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, rename = "selfLink", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

/// Disk attached to an instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachedDisk {
    #[serde(default)]
    pub source: String,
    #[serde(default, rename = "deviceName", skip_serializing_if = "String::is_empty")]
    pub device_name: String,
    #[serde(default, rename = "autoDelete")]
    pub auto_delete: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default)]
    pub boot: bool,
}

/// The slice of a VM instance the disk snippets read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub disks: Vec<AttachedDisk>,
}

/// Snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "sourceDisk", skip_serializing_if = "Option::is_none")]
    pub source_disk: Option<String>,
    #[serde(
        default,
        rename = "diskSizeGb",
        with = "crate::int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_size_gb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, rename = "selfLink", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

/// Hyperdisk storage pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoragePool {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "storagePoolType", skip_serializing_if = "Option::is_none")]
    pub storage_pool_type: Option<String>,
    #[serde(
        default,
        rename = "capacityProvisioningType",
        skip_serializing_if = "Option::is_none"
    )]
    pub capacity_provisioning_type: Option<String>,
    #[serde(
        default,
        rename = "performanceProvisioningType",
        skip_serializing_if = "Option::is_none"
    )]
    pub performance_provisioning_type: Option<String>,
    #[serde(
        default,
        rename = "poolProvisionedCapacityGb",
        with = "crate::int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub pool_provisioned_capacity_gb: Option<i64>,
    #[serde(
        default,
        rename = "poolProvisionedIops",
        with = "crate::int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub pool_provisioned_iops: Option<i64>,
    #[serde(
        default,
        rename = "poolProvisionedThroughput",
        with = "crate::int64",
        skip_serializing_if = "Option::is_none"
    )]
    pub pool_provisioned_throughput: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, rename = "selfLink", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

/// Marker for a consistency-group resource policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskConsistencyGroupPolicy {}

/// Resource policy (only the consistency-group flavour is used here).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcePolicy {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        rename = "diskConsistencyGroupPolicy",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_consistency_group_policy: Option<DiskConsistencyGroupPolicy>,
    #[serde(default, rename = "selfLink", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
}

/// Generic list response wrapper for Compute Engine.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default, rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

impl<T> ListResponse<T> {
    pub(crate) fn into_page(self) -> (Vec<T>, Option<String>) {
        (self.items, self.next_page_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_serializes_only_set_fields() {
        let disk = Disk {
            name: "d".into(),
            size_gb: Some(20),
            disk_type: Some("zones/us-central1-a/diskTypes/pd-ssd".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&disk).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "name": "d",
                "sizeGb": "20",
                "type": "zones/us-central1-a/diskTypes/pd-ssd"
            })
        );
    }

    #[test]
    fn list_tolerates_missing_items() {
        let page: ListResponse<Disk> = serde_json::from_str(r#"{"kind":"compute#diskList"}"#).unwrap();
        let (items, next) = page.into_page();
        assert!(items.is_empty());
        assert!(next.is_none());
    }
}
