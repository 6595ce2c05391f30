//! Regional secrets, served from `secretmanager.{location}.rep.googleapis.com`.
//!
//! Regional secrets have no replication policy; the location is the replica.

use super::{
    access_version, change_version_state, fetch_secret, fetch_secrets, fetch_version,
    fetch_versions, insert_secret, insert_version, patch_secret, remove_secret, update_accessor,
    Secret, SecretVersion, VersionAction, SERVICE,
};
use crate::client::GcpClient;
use crate::error::GcpResult;
use crate::iam::IamPolicy;
use std::collections::HashMap;
use std::io::Write;

fn endpoint(location: &str) -> String {
    GcpClient::regional(SERVICE, location)
}

fn parent(project: &str, location: &str) -> String {
    format!("projects/{}/locations/{}", project, location)
}

fn secret_name(project: &str, location: &str, secret_id: &str) -> String {
    format!("{}/secrets/{}", parent(project, location), secret_id)
}

fn version_name(project: &str, location: &str, secret_id: &str, version: &str) -> String {
    format!("{}/versions/{}", secret_name(project, location, secret_id), version)
}

pub async fn create_regional_secret(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let created = insert_secret(
        client,
        &endpoint(location),
        &parent(project, location),
        secret_id,
        &Secret::default(),
    )
    .await?;
    writeln!(w, "Created regional secret: {}", created.name)?;
    Ok(created)
}

pub async fn get_regional_secret(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let name = secret_name(project, location, secret_id);
    let secret = fetch_secret(client, &endpoint(location), &name).await?;
    writeln!(w, "Found regional secret {}", secret.name)?;
    Ok(secret)
}

pub async fn list_regional_secrets(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> GcpResult<Vec<Secret>> {
    let secrets =
        fetch_secrets(client, &endpoint(location), &parent(project, location), None).await?;
    for s in &secrets {
        writeln!(w, "Found regional secret {}", s.name)?;
    }
    Ok(secrets)
}

pub async fn list_regional_secrets_with_filter(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    filter: &str,
) -> GcpResult<Vec<Secret>> {
    let secrets = fetch_secrets(
        client,
        &endpoint(location),
        &parent(project, location),
        Some(filter),
    )
    .await?;
    for s in &secrets {
        writeln!(w, "Found regional secret {}", s.name)?;
    }
    Ok(secrets)
}

async fn relabel(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    etag: Option<&str>,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name(project, location, secret_id),
        etag: etag.map(str::to_string),
        labels: HashMap::from([("secretmanager".to_string(), "rocks".to_string())]),
        ..Default::default()
    };
    patch_secret(client, &endpoint(location), &secret, "labels").await
}

/// Replace the labels with `secretmanager=rocks`.
pub async fn update_regional_secret(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let updated = relabel(client, project, location, secret_id, None).await?;
    writeln!(w, "Updated regional secret: {}", updated.name)?;
    Ok(updated)
}

pub async fn update_regional_secret_with_etag(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    etag: &str,
) -> GcpResult<Secret> {
    let updated = relabel(client, project, location, secret_id, Some(etag)).await?;
    writeln!(w, "Updated regional secret: {}", updated.name)?;
    Ok(updated)
}

/// Point the `test` alias at version 1.
pub async fn update_regional_secret_with_alias(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name(project, location, secret_id),
        version_aliases: HashMap::from([("test".to_string(), "1".to_string())]),
        ..Default::default()
    };
    let updated = patch_secret(client, &endpoint(location), &secret, "version_aliases").await?;
    writeln!(w, "Updated regional secret: {}", updated.name)?;
    Ok(updated)
}

pub async fn delete_regional_secret(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
) -> GcpResult<()> {
    let name = secret_name(project, location, secret_id);
    remove_secret(client, &endpoint(location), &name, None).await
}

pub async fn delete_regional_secret_with_etag(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    etag: &str,
) -> GcpResult<()> {
    let name = secret_name(project, location, secret_id);
    remove_secret(client, &endpoint(location), &name, Some(etag)).await
}

// ── Versions ────────────────────────────────────────────────────────────

pub async fn add_regional_secret_version(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
) -> GcpResult<SecretVersion> {
    let name = secret_name(project, location, secret_id);
    let version =
        insert_version(client, &endpoint(location), &name, b"my super secret data").await?;
    writeln!(w, "Added regional secret version: {}", version.name)?;
    Ok(version)
}

pub async fn access_regional_secret_version(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
) -> GcpResult<Vec<u8>> {
    let name = version_name(project, location, secret_id, version);
    let data = access_version(client, &endpoint(location), &name).await?;
    writeln!(w, "Plaintext: {}", String::from_utf8_lossy(&data))?;
    Ok(data)
}

pub async fn get_regional_secret_version(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
) -> GcpResult<SecretVersion> {
    let name = version_name(project, location, secret_id, version);
    let v = fetch_version(client, &endpoint(location), &name).await?;
    writeln!(w, "Found regional secret version {} with state {}", v.name, v.state)?;
    Ok(v)
}

pub async fn list_regional_secret_versions(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
) -> GcpResult<Vec<SecretVersion>> {
    let name = secret_name(project, location, secret_id);
    let versions = fetch_versions(client, &endpoint(location), &name, None).await?;
    for v in &versions {
        writeln!(w, "{} with state {}", v.name, v.state)?;
    }
    Ok(versions)
}

pub async fn list_regional_secret_versions_with_filter(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    filter: &str,
) -> GcpResult<Vec<SecretVersion>> {
    let name = secret_name(project, location, secret_id);
    let versions = fetch_versions(client, &endpoint(location), &name, Some(filter)).await?;
    for v in &versions {
        writeln!(w, "{} with state {}", v.name, v.state)?;
    }
    Ok(versions)
}

async fn transition(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
    action: VersionAction,
    etag: Option<&str>,
) -> GcpResult<SecretVersion> {
    let name = version_name(project, location, secret_id, version);
    change_version_state(client, &endpoint(location), &name, action, etag).await
}

pub async fn enable_regional_secret_version(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
) -> GcpResult<SecretVersion> {
    transition(client, project, location, secret_id, version, VersionAction::Enable, None).await
}

pub async fn enable_regional_secret_version_with_etag(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
    etag: &str,
) -> GcpResult<SecretVersion> {
    transition(client, project, location, secret_id, version, VersionAction::Enable, Some(etag)).await
}

pub async fn disable_regional_secret_version(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
) -> GcpResult<SecretVersion> {
    transition(client, project, location, secret_id, version, VersionAction::Disable, None).await
}

pub async fn disable_regional_secret_version_with_etag(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
    etag: &str,
) -> GcpResult<SecretVersion> {
    transition(client, project, location, secret_id, version, VersionAction::Disable, Some(etag)).await
}

pub async fn destroy_regional_secret_version(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
) -> GcpResult<SecretVersion> {
    transition(client, project, location, secret_id, version, VersionAction::Destroy, None).await
}

pub async fn destroy_regional_secret_version_with_etag(
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    version: &str,
    etag: &str,
) -> GcpResult<SecretVersion> {
    transition(client, project, location, secret_id, version, VersionAction::Destroy, Some(etag)).await
}

// ── IAM ─────────────────────────────────────────────────────────────────

pub async fn iam_grant_access_with_regional_secret(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    member: &str,
) -> GcpResult<IamPolicy> {
    let name = secret_name(project, location, secret_id);
    let policy = update_accessor(client, &endpoint(location), &name, member, true).await?;
    writeln!(w, "Updated IAM policy for {}", name)?;
    Ok(policy)
}

pub async fn iam_revoke_access_with_regional_secret(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    secret_id: &str,
    member: &str,
) -> GcpResult<IamPolicy> {
    let name = secret_name(project, location, secret_id);
    let policy = update_accessor(client, &endpoint(location), &name, member, false).await?;
    writeln!(w, "Updated IAM policy for {}", name)?;
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regional_names() {
        assert_eq!(endpoint("us-central1"), "secretmanager.us-central1.rep");
        assert_eq!(
            version_name("p", "us-central1", "s", "latest"),
            "projects/p/locations/us-central1/secrets/s/versions/latest"
        );
    }
}
