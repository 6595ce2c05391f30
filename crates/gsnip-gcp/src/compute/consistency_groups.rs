//! Consistency groups: resource policies that make a set of regional disks
//! replicate with crash-consistent snapshots.

use super::{regional, Disk, DiskConsistencyGroupPolicy, ListResponse, ResourcePolicy, SERVICE};
use crate::client::GcpClient;
use crate::error::{Context, GcpResult};
use crate::operation::ComputeOperation;
use std::io::Write;

fn policy_link(project: &str, region: &str, group: &str) -> String {
    format!(
        "projects/{}/regions/{}/resourcePolicies/{}",
        project, region, group
    )
}

/// Whether a disk's `resourcePolicies` entry names `group` in `region`.
fn references_group(policy_url: &str, region: &str, group: &str) -> bool {
    policy_url.ends_with(&format!("regions/{}/resourcePolicies/{}", region, group))
}

pub async fn create_consistency_group(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    group: &str,
) -> GcpResult<()> {
    let policy = ResourcePolicy {
        name: group.to_string(),
        region: Some(region.to_string()),
        disk_consistency_group_policy: Some(DiskConsistencyGroupPolicy {}),
        ..Default::default()
    };
    let path = format!("{}/resourcePolicies", regional(project, region));
    let op: ComputeOperation = client
        .post(SERVICE, &path, &policy)
        .await
        .context("resourcePolicies.insert")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Group created")?;
    Ok(())
}

pub async fn delete_consistency_group(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    group: &str,
) -> GcpResult<()> {
    let path = format!("{}/resourcePolicies/{}", regional(project, region), group);
    let op: ComputeOperation = client
        .delete(SERVICE, &path, &[])
        .await
        .context("resourcePolicies.delete")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Group deleted")?;
    Ok(())
}

pub async fn add_disk_consistency_group(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    group: &str,
    disk_name: &str,
) -> GcpResult<()> {
    let path = format!(
        "{}/disks/{}/addResourcePolicies",
        regional(project, region),
        disk_name
    );
    let body = serde_json::json!({ "resourcePolicies": [policy_link(project, region, group)] });
    let op: ComputeOperation = client
        .post(SERVICE, &path, &body)
        .await
        .context("regionDisks.addResourcePolicies")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Disk added")?;
    Ok(())
}

pub async fn remove_disk_consistency_group(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    group: &str,
    disk_name: &str,
) -> GcpResult<()> {
    let path = format!(
        "{}/disks/{}/removeResourcePolicies",
        regional(project, region),
        disk_name
    );
    let body = serde_json::json!({ "resourcePolicies": [policy_link(project, region, group)] });
    let op: ComputeOperation = client
        .post(SERVICE, &path, &body)
        .await
        .context("regionDisks.removeResourcePolicies")?;
    client.wait_compute_operation(project, op).await.context("Wait")?;
    writeln!(w, "Disk removed")?;
    Ok(())
}

/// Print `- {disk}` for every regional disk in the group.
pub async fn list_consistency_group(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    region: &str,
    group: &str,
) -> GcpResult<Vec<Disk>> {
    let path = format!("{}/disks", regional(project, region));
    let disks = client
        .get_all_pages(SERVICE, &path, &[], ListResponse::<Disk>::into_page)
        .await
        .context("regionDisks.list")?;

    let members: Vec<Disk> = disks
        .into_iter()
        .filter(|d| {
            d.resource_policies
                .iter()
                .any(|p| references_group(p, region, group))
        })
        .collect();
    for disk in &members {
        writeln!(w, "- {}", disk.name)?;
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_matching_uses_full_suffix() {
        let url = "https://www.googleapis.com/compute/v1/projects/p/regions/europe-west4/resourcePolicies/grp";
        assert!(references_group(url, "europe-west4", "grp"));
        assert!(!references_group(url, "europe-west4", "rp"));
        assert!(!references_group(url, "us-west3", "grp"));
    }
}
