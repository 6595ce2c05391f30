//! Persistent disk snippets: create (empty, from image/snapshot/disk,
//! encrypted, regional, async-replication secondaries, in a storage pool),
//! list, resize, delete, attach, auto-delete, and async replication.

use super::{
    regional, zonal, AttachedDisk, CustomerEncryptionKey, Disk, DiskAsyncReplication,
    GuestOsFeature, Instance, ListResponse, SERVICE,
};
use crate::client::GcpClient;
use crate::error::{Context, GcpError, GcpResult};
use crate::operation::ComputeOperation;
use std::collections::HashMap;
use std::io::Write;

async fn insert_zonal(
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk: &Disk,
) -> GcpResult<ComputeOperation> {
    let path = format!("{}/disks", zonal(project, zone));
    let op: ComputeOperation = client
        .post(SERVICE, &path, disk)
        .await
        .context("disks.insert")?;
    client.wait_compute_operation(project, op).await.context("Wait")
}

async fn insert_regional(
    client: &GcpClient,
    project: &str,
    region: &str,
    disk: &Disk,
) -> GcpResult<ComputeOperation> {
    let path = format!("{}/disks", regional(project, region));
    let op: ComputeOperation = client
        .post(SERVICE, &path, disk)
        .await
        .context("regionDisks.insert")?;
    client.wait_compute_operation(project, op).await.context("Wait")
}

fn replica_zone_links(project: &str, replica_zones: &[&str]) -> Vec<String> {
    replica_zones
        .iter()
        .map(|z| format!("projects/{}/zones/{}", project, z))
        .collect()
}

// ── Zonal disks ─────────────────────────────────────────────────────────

/// Create an empty zonal disk.
///
/// `disk_type` is a partial URL such as `zones/us-west3-b/diskTypes/pd-ssd`.
pub async fn create_empty_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
    disk_type: &str,
    size_gb: i64,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        zone: Some(zone.to_string()),
        disk_type: Some(disk_type.to_string()),
        size_gb: Some(size_gb),
        ..Default::default()
    };
    insert_zonal(client, project, zone, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

/// Create a zonal disk from an image, e.g. `projects/debian-cloud/global/images/family/debian-12`.
pub async fn create_disk_from_image(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
    disk_type: &str,
    source_image: &str,
    size_gb: i64,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        zone: Some(zone.to_string()),
        disk_type: Some(disk_type.to_string()),
        source_image: Some(source_image.to_string()),
        size_gb: Some(size_gb),
        ..Default::default()
    };
    insert_zonal(client, project, zone, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

/// Create a zonal disk from a snapshot link (`projects/p/global/snapshots/s`).
pub async fn create_disk_from_snapshot(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
    disk_type: &str,
    snapshot_link: &str,
    size_gb: i64,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        zone: Some(zone.to_string()),
        disk_type: Some(disk_type.to_string()),
        source_snapshot: Some(snapshot_link.to_string()),
        size_gb: Some(size_gb),
        ..Default::default()
    };
    insert_zonal(client, project, zone, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

/// Create a disk protected by a customer-supplied or customer-managed key.
///
/// Exactly one of `raw_key` (base64 AES-256), `rsa_key` (RSA-wrapped), or
/// `kms_key_link` is expected to be non-empty. `source_image` may be empty.
pub async fn create_encrypted_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
    disk_type: &str,
    size_gb: i64,
    raw_key: &str,
    rsa_key: &str,
    kms_key_link: &str,
    source_image: &str,
) -> GcpResult<()> {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let key = CustomerEncryptionKey {
        raw_key: non_empty(raw_key),
        rsa_encrypted_key: non_empty(rsa_key),
        kms_key_name: non_empty(kms_key_link),
        sha256: None,
    };
    if key == CustomerEncryptionKey::default() {
        return Err(GcpError::invalid_argument(
            SERVICE,
            "one of raw_key, rsa_key or kms_key_link is required",
        ));
    }

    let disk = Disk {
        name: disk_name.to_string(),
        zone: Some(zone.to_string()),
        disk_type: Some(disk_type.to_string()),
        size_gb: Some(size_gb),
        source_image: non_empty(source_image),
        disk_encryption_key: Some(key),
        ..Default::default()
    };
    insert_zonal(client, project, zone, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

/// Clone a CSEK-protected disk; the same raw key decrypts the source and
/// encrypts the copy.
pub async fn create_disk_from_customer_encrypted_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
    disk_type: &str,
    size_gb: i64,
    source_disk_link: &str,
    encryption_key: &str,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        zone: Some(zone.to_string()),
        disk_type: Some(disk_type.to_string()),
        size_gb: Some(size_gb),
        source_disk: Some(source_disk_link.to_string()),
        disk_encryption_key: Some(CustomerEncryptionKey {
            raw_key: Some(encryption_key.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    insert_zonal(client, project, zone, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

/// Create a Hyperdisk Balanced disk with explicit performance settings.
pub async fn create_hyperdisk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        zone: Some(zone.to_string()),
        disk_type: Some(format!("zones/{}/diskTypes/hyperdisk-balanced", zone)),
        size_gb: Some(10),
        provisioned_iops: Some(3000),
        provisioned_throughput: Some(140),
        ..Default::default()
    };
    insert_zonal(client, project, zone, &disk).await?;
    writeln!(w, "Hyperdisk created")?;
    Ok(())
}

/// Create a Hyperdisk in an existing storage pool.
pub async fn create_disk_in_storage_pool(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
    storage_pool_link: &str,
    disk_type: &str,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        zone: Some(zone.to_string()),
        disk_type: Some(disk_type.to_string()),
        size_gb: Some(50),
        storage_pool: Some(storage_pool_link.to_string()),
        provisioned_iops: Some(10000),
        provisioned_throughput: Some(1024),
        ..Default::default()
    };
    insert_zonal(client, project, zone, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

pub async fn get_disk(
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
) -> GcpResult<Disk> {
    let path = format!("{}/disks/{}", zonal(project, zone), disk_name);
    client.get(SERVICE, &path, &[]).await.context("disks.get")
}

/// Print `- {name}` for every disk in the zone matching `filter`
/// (e.g. `name = my-disk`); an empty filter lists everything.
pub async fn list_disks(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    filter: &str,
) -> GcpResult<Vec<Disk>> {
    let path = format!("{}/disks", zonal(project, zone));
    let mut query: Vec<(&str, &str)> = Vec::new();
    if !filter.is_empty() {
        query.push(("filter", filter));
    }
    let disks = client
        .get_all_pages(SERVICE, &path, &query, ListResponse::<Disk>::into_page)
        .await
        .context("disks.list")?;
    for disk in &disks {
        writeln!(w, "- {}", disk.name)?;
    }
    Ok(disks)
}

pub async fn resize_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
    new_size_gb: i64,
) -> GcpResult<()> {
    let path = format!("{}/disks/{}/resize", zonal(project, zone), disk_name);
    let body = serde_json::json!({ "sizeGb": new_size_gb.to_string() });
    let op: ComputeOperation = client
        .post(SERVICE, &path, &body)
        .await
        .context("disks.resize")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Disk resized")?;
    Ok(())
}

pub async fn delete_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
) -> GcpResult<()> {
    let path = format!("{}/disks/{}", zonal(project, zone), disk_name);
    let op: ComputeOperation = client
        .delete(SERVICE, &path, &[])
        .await
        .context("disks.delete")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Disk deleted")?;
    Ok(())
}

// ── Regional disks ──────────────────────────────────────────────────────

/// Create an empty regional disk replicated across `replica_zones`.
pub async fn create_regional_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    replica_zones: &[&str],
    disk_name: &str,
    disk_type: &str,
    size_gb: i64,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        region: Some(region.to_string()),
        replica_zones: replica_zone_links(project, replica_zones),
        disk_type: Some(disk_type.to_string()),
        size_gb: Some(size_gb),
        ..Default::default()
    };
    insert_regional(client, project, region, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

pub async fn create_regional_disk_from_snapshot(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    replica_zones: &[&str],
    disk_name: &str,
    disk_type: &str,
    snapshot_link: &str,
    size_gb: i64,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        region: Some(region.to_string()),
        replica_zones: replica_zone_links(project, replica_zones),
        disk_type: Some(disk_type.to_string()),
        source_snapshot: Some(snapshot_link.to_string()),
        size_gb: Some(size_gb),
        ..Default::default()
    };
    insert_regional(client, project, region, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

pub async fn create_regional_disk_from_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    replica_zones: &[&str],
    disk_name: &str,
    disk_type: &str,
    source_disk: &str,
    size_gb: i64,
) -> GcpResult<()> {
    let disk = Disk {
        name: disk_name.to_string(),
        region: Some(region.to_string()),
        replica_zones: replica_zone_links(project, replica_zones),
        disk_type: Some(disk_type.to_string()),
        source_disk: Some(source_disk.to_string()),
        size_gb: Some(size_gb),
        ..Default::default()
    };
    insert_regional(client, project, region, &disk).await?;
    writeln!(w, "Disk created")?;
    Ok(())
}

pub async fn get_regional_disk(
    client: &GcpClient,
    project: &str,
    region: &str,
    disk_name: &str,
) -> GcpResult<Disk> {
    let path = format!("{}/disks/{}", regional(project, region), disk_name);
    client.get(SERVICE, &path, &[]).await.context("regionDisks.get")
}

pub async fn resize_regional_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    disk_name: &str,
    new_size_gb: i64,
) -> GcpResult<()> {
    let path = format!("{}/disks/{}/resize", regional(project, region), disk_name);
    let body = serde_json::json!({ "sizeGb": new_size_gb.to_string() });
    let op: ComputeOperation = client
        .post(SERVICE, &path, &body)
        .await
        .context("regionDisks.resize")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Disk resized")?;
    Ok(())
}

pub async fn delete_regional_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    disk_name: &str,
) -> GcpResult<()> {
    let path = format!("{}/disks/{}", regional(project, region), disk_name);
    let op: ComputeOperation = client
        .delete(SERVICE, &path, &[])
        .await
        .context("regionDisks.delete")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Disk deleted")?;
    Ok(())
}

// ── Asynchronous replication ────────────────────────────────────────────

fn secondary_disk(
    project: &str,
    secondary_zone: &str,
    secondary_name: &str,
    primary_name: &str,
    primary_zone: &str,
    size_gb: i64,
) -> Disk {
    Disk {
        name: secondary_name.to_string(),
        zone: Some(secondary_zone.to_string()),
        size_gb: Some(size_gb),
        async_primary_disk: Some(DiskAsyncReplication {
            disk: format!(
                "projects/{}/zones/{}/disks/{}",
                project, primary_zone, primary_name
            ),
        }),
        ..Default::default()
    }
}

/// Create a zonal secondary disk replicating `primary_name` asynchronously.
pub async fn create_secondary_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secondary_zone: &str,
    secondary_name: &str,
    primary_name: &str,
    primary_zone: &str,
    size_gb: i64,
) -> GcpResult<Disk> {
    let disk = secondary_disk(
        project,
        secondary_zone,
        secondary_name,
        primary_name,
        primary_zone,
        size_gb,
    );
    insert_zonal(client, project, secondary_zone, &disk).await?;
    writeln!(w, "Disk created")?;
    get_disk(client, project, secondary_zone, secondary_name).await
}

/// Like [`create_secondary_disk`], with guest OS features and a label.
pub async fn create_custom_secondary_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secondary_zone: &str,
    secondary_name: &str,
    primary_name: &str,
    primary_zone: &str,
    size_gb: i64,
) -> GcpResult<Disk> {
    let mut disk = secondary_disk(
        project,
        secondary_zone,
        secondary_name,
        primary_name,
        primary_zone,
        size_gb,
    );
    disk.guest_os_features = ["UEFI_COMPATIBLE", "GVNIC", "MULTI_IP_SUBNET"]
        .iter()
        .map(|f| GuestOsFeature {
            feature_type: f.to_string(),
        })
        .collect();
    disk.labels = HashMap::from([(
        "secondary-disk-for-replication".to_string(),
        "yes".to_string(),
    )]);
    insert_zonal(client, project, secondary_zone, &disk).await?;
    writeln!(w, "Disk created")?;
    get_disk(client, project, secondary_zone, secondary_name).await
}

/// Create a regional secondary disk replicating a regional primary.
pub async fn create_regional_secondary_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secondary_region: &str,
    secondary_name: &str,
    primary_name: &str,
    primary_region: &str,
    replica_zones: &[&str],
    size_gb: i64,
) -> GcpResult<Disk> {
    let disk = Disk {
        name: secondary_name.to_string(),
        region: Some(secondary_region.to_string()),
        replica_zones: replica_zone_links(project, replica_zones),
        size_gb: Some(size_gb),
        async_primary_disk: Some(DiskAsyncReplication {
            disk: format!(
                "projects/{}/regions/{}/disks/{}",
                project, primary_region, primary_name
            ),
        }),
        ..Default::default()
    };
    insert_regional(client, project, secondary_region, &disk).await?;
    writeln!(w, "Disk created")?;
    get_regional_disk(client, project, secondary_region, secondary_name).await
}

/// Start replicating `primary_name` into the secondary disk.
pub async fn start_replication(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    secondary_name: &str,
    primary_name: &str,
    primary_zone: &str,
) -> GcpResult<()> {
    let path = format!(
        "{}/disks/{}/startAsyncReplication",
        zonal(project, primary_zone),
        primary_name
    );
    let body = serde_json::json!({
        "asyncSecondaryDisk": format!("projects/{}/zones/{}/disks/{}", project, zone, secondary_name),
    });
    let op: ComputeOperation = client
        .post(SERVICE, &path, &body)
        .await
        .context("disks.startAsyncReplication")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Replication started")?;
    Ok(())
}

pub async fn stop_replication(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    primary_name: &str,
    zone: &str,
) -> GcpResult<()> {
    let path = format!(
        "{}/disks/{}/stopAsyncReplication",
        zonal(project, zone),
        primary_name
    );
    let op: ComputeOperation = client
        .post(SERVICE, &path, &serde_json::json!({}))
        .await
        .context("disks.stopAsyncReplication")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Replication stopped")?;
    Ok(())
}

// ── Instance disks ──────────────────────────────────────────────────────

pub async fn get_instance(
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance: &str,
) -> GcpResult<Instance> {
    let path = format!("{}/instances/{}", zonal(project, zone), instance);
    client.get(SERVICE, &path, &[]).await.context("instances.get")
}

/// Set `autoDelete` on an attached disk. The disk is looked up by device
/// name first; a missing disk is an error and nothing is changed.
pub async fn set_disk_auto_delete(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    disk_name: &str,
    auto_delete: bool,
) -> GcpResult<()> {
    let instance = get_instance(client, project, zone, instance_name).await?;
    if !instance.disks.iter().any(|d| d.device_name == disk_name) {
        return Err(GcpError::not_found(
            SERVICE,
            &format!(
                "instance {} doesn't have a disk named {} attached",
                instance_name, disk_name
            ),
        )
        .with_method("setDiskAutoDelete"));
    }

    let path = format!(
        "{}/instances/{}/setDiskAutoDelete",
        zonal(project, zone),
        instance_name
    );
    let flag = auto_delete.to_string();
    let query = [("autoDelete", flag.as_str()), ("deviceName", disk_name)];
    let op: ComputeOperation = client
        .post_with_query(SERVICE, &path, &query, &serde_json::json!({}))
        .await
        .context("instances.setDiskAutoDelete")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "disk autoDelete field updated.")?;
    Ok(())
}

async fn attach_disk(
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    disk_url: &str,
    mode: &str,
) -> GcpResult<()> {
    let path = format!(
        "{}/instances/{}/attachDisk",
        zonal(project, zone),
        instance_name
    );
    let disk = AttachedDisk {
        source: disk_url.to_string(),
        mode: mode.to_string(),
        ..Default::default()
    };
    let op: ComputeOperation = client
        .post(SERVICE, &path, &disk)
        .await
        .context("instances.attachDisk")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    Ok(())
}

/// Attach a regional disk (`projects/p/regions/r/disks/d`) read-write.
pub async fn attach_regional_disk(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    disk_url: &str,
) -> GcpResult<()> {
    attach_disk(client, project, zone, instance_name, disk_url, "READ_WRITE").await?;
    writeln!(w, "Disk attached")?;
    Ok(())
}

pub async fn attach_regional_disk_read_only(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    instance_name: &str,
    disk_url: &str,
) -> GcpResult<()> {
    attach_disk(client, project, zone, instance_name, disk_url, "READ_ONLY").await?;
    writeln!(w, "Disk attached")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_zones_become_partial_urls() {
        assert_eq!(
            replica_zone_links("p", &["us-west3-a", "us-west3-b"]),
            vec!["projects/p/zones/us-west3-a", "projects/p/zones/us-west3-b"]
        );
    }

    #[test]
    fn secondary_points_at_primary() {
        let d = secondary_disk("p", "us-east1-c", "sec", "prim", "us-central1-a", 10);
        assert_eq!(
            d.async_primary_disk.unwrap().disk,
            "projects/p/zones/us-central1-a/disks/prim"
        );
        assert_eq!(d.zone.as_deref(), Some("us-east1-c"));
    }
}
