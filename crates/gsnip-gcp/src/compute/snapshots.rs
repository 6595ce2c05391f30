//! Disk snapshots.

use super::{global, zonal, ListResponse, Snapshot, SERVICE};
use crate::client::GcpClient;
use crate::error::{Context, GcpResult};
use crate::operation::ComputeOperation;
use std::io::Write;

/// Snapshot a zonal disk into the global snapshot collection.
pub async fn create_disk_snapshot(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    zone: &str,
    disk_name: &str,
    snapshot_name: &str,
) -> GcpResult<()> {
    let path = format!("{}/disks/{}/createSnapshot", zonal(project, zone), disk_name);
    let body = Snapshot {
        name: snapshot_name.to_string(),
        ..Default::default()
    };
    let op: ComputeOperation = client
        .post(SERVICE, &path, &body)
        .await
        .context("disks.createSnapshot")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Snapshot created")?;
    Ok(())
}

pub async fn delete_snapshot(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    snapshot_name: &str,
) -> GcpResult<()> {
    let path = format!("{}/snapshots/{}", global(project), snapshot_name);
    let op: ComputeOperation = client
        .delete(SERVICE, &path, &[])
        .await
        .context("snapshots.delete")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Snapshot deleted")?;
    Ok(())
}

/// Print `- {name}` for each snapshot matching `filter` (empty = all).
pub async fn list_snapshots(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    filter: &str,
) -> GcpResult<Vec<Snapshot>> {
    let path = format!("{}/snapshots", global(project));
    let query: Vec<(&str, &str)> = if filter.is_empty() {
        Vec::new()
    } else {
        vec![("filter", filter)]
    };
    let snapshots = client
        .get_all_pages(SERVICE, &path, &query, ListResponse::<Snapshot>::into_page)
        .await
        .context("snapshots.list")?;
    for s in &snapshots {
        writeln!(w, "- {}", s.name)?;
    }
    Ok(snapshots)
}
