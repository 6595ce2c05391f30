//! Hyperdisk storage pools.

use super::{zonal, StoragePool, SERVICE};
use crate::client::GcpClient;
use crate::error::{Context, GcpResult};
use crate::operation::ComputeOperation;
use std::io::Write;

/// Create an advanced-provisioned pool: 10 TiB, 10k IOPS, 1024 MB/s.
///
/// `pool_type` is the type id, e.g. `hyperdisk-balanced`.
pub async fn create_hyperdisk_storage_pool(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    pool_name: &str,
    pool_type: &str,
) -> GcpResult<StoragePool> {
    let pool = StoragePool {
        name: pool_name.to_string(),
        zone: Some(zone.to_string()),
        storage_pool_type: Some(format!(
            "projects/{}/zones/{}/storagePoolTypes/{}",
            project, zone, pool_type
        )),
        capacity_provisioning_type: Some("ADVANCED".to_string()),
        performance_provisioning_type: Some("ADVANCED".to_string()),
        pool_provisioned_capacity_gb: Some(10240),
        pool_provisioned_iops: Some(10000),
        pool_provisioned_throughput: Some(1024),
        ..Default::default()
    };
    let path = format!("{}/storagePools", zonal(project, zone));
    let op: ComputeOperation = client
        .post(SERVICE, &path, &pool)
        .await
        .context("storagePools.insert")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;

    let created = get_storage_pool(client, project, zone, pool_name).await?;
    writeln!(w, "Hyperdisk Storage Pool created: {}", created.name)?;
    Ok(created)
}

pub async fn get_storage_pool(
    client: &GcpClient,
    project: &str,
    zone: &str,
    pool_name: &str,
) -> GcpResult<StoragePool> {
    let path = format!("{}/storagePools/{}", zonal(project, zone), pool_name);
    client.get(SERVICE, &path, &[]).await.context("storagePools.get")
}

pub async fn delete_storage_pool(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    pool_name: &str,
) -> GcpResult<()> {
    let path = format!("{}/storagePools/{}", zonal(project, zone), pool_name);
    let op: ComputeOperation = client
        .delete(SERVICE, &path, &[])
        .await
        .context("storagePools.delete")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Storage pool deleted")?;
    Ok(())
}
