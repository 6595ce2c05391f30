//! Global secrets and versions.
//!
//! `parent` is `projects/{p}`; `secret_name` is `projects/{p}/secrets/{s}`;
//! `version_name` is `projects/{p}/secrets/{s}/versions/{v}`.

use super::{
    access_version, change_version_state, fetch_secret, fetch_secrets, fetch_version,
    fetch_versions, insert_secret, insert_version, patch_secret, remove_secret, update_accessor,
    CustomerManagedEncryption, Replication, Rotation, Secret, SecretVersion, TopicRef,
    VersionAction, SERVICE,
};
use crate::client::GcpClient;
use crate::error::GcpResult;
use crate::iam::IamPolicy;
use chrono::{Duration, SecondsFormat, Utc};
use std::collections::HashMap;
use std::io::Write;

fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn rfc3339_from_now(offset: Duration) -> String {
    (Utc::now() + offset).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn automatic(secret: Secret) -> Secret {
    Secret {
        replication: Some(Replication::automatic()),
        ..secret
    }
}

// ── Create ──────────────────────────────────────────────────────────────

pub async fn create_secret(
    w: &mut impl Write,
    client: &GcpClient,
    parent: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let secret = automatic(Secret::default());
    let created = insert_secret(client, SERVICE, parent, secret_id, &secret).await?;
    writeln!(w, "Created secret: {}", created.name)?;
    Ok(created)
}

/// `ttl` is a duration string, e.g. `"900s"`.
pub async fn create_secret_with_ttl(
    w: &mut impl Write,
    client: &GcpClient,
    parent: &str,
    secret_id: &str,
    ttl: &str,
) -> GcpResult<Secret> {
    let secret = automatic(Secret {
        ttl: Some(ttl.to_string()),
        ..Default::default()
    });
    let created = insert_secret(client, SERVICE, parent, secret_id, &secret).await?;
    writeln!(w, "Created secret with ttl: {}", created.name)?;
    Ok(created)
}

pub async fn create_secret_with_labels(
    w: &mut impl Write,
    client: &GcpClient,
    parent: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let secret = automatic(Secret {
        labels: labels(&[("labelkey", "labelvalue")]),
        ..Default::default()
    });
    let created = insert_secret(client, SERVICE, parent, secret_id, &secret).await?;
    writeln!(w, "Created secret with labels: {}", created.name)?;
    Ok(created)
}

pub async fn create_secret_with_annotations(
    w: &mut impl Write,
    client: &GcpClient,
    parent: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let secret = automatic(Secret {
        annotations: labels(&[("annotationkey", "annotationvalue")]),
        ..Default::default()
    });
    let created = insert_secret(client, SERVICE, parent, secret_id, &secret).await?;
    writeln!(w, "Created secret with annotations: {}", created.name)?;
    Ok(created)
}

pub async fn create_user_managed_replication_secret(
    w: &mut impl Write,
    client: &GcpClient,
    parent: &str,
    secret_id: &str,
    locations: &[&str],
) -> GcpResult<Secret> {
    let secret = Secret {
        replication: Some(Replication::user_managed(locations)),
        ..Default::default()
    };
    let created = insert_secret(client, SERVICE, parent, secret_id, &secret).await?;
    writeln!(w, "Created secret with user managed replication: {}", created.name)?;
    Ok(created)
}

/// Secret encrypted with a Cloud KMS key,
/// `projects/p/locations/global/keyRings/r/cryptoKeys/k`.
pub async fn create_secret_with_cmek(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secret_id: &str,
    kms_key_name: &str,
) -> GcpResult<Secret> {
    let mut replication = Replication::automatic();
    if let Some(auto) = replication.automatic.as_mut() {
        auto.customer_managed_encryption = Some(CustomerManagedEncryption {
            kms_key_name: kms_key_name.to_string(),
        });
    }
    let secret = Secret {
        replication: Some(replication),
        ..Default::default()
    };
    let parent = format!("projects/{}", project);
    let created = insert_secret(client, SERVICE, &parent, secret_id, &secret).await?;
    writeln!(w, "Created secret {} with CMEK key {}", created.name, kms_key_name)?;
    Ok(created)
}

/// Secret that expires one hour from now.
pub async fn create_secret_with_expire_time(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let secret = automatic(Secret {
        expire_time: Some(rfc3339_from_now(Duration::hours(1))),
        ..Default::default()
    });
    let parent = format!("projects/{}", project);
    let created = insert_secret(client, SERVICE, &parent, secret_id, &secret).await?;
    writeln!(
        w,
        "Created secret {} with expire time {}",
        created.name,
        created.expire_time.as_deref().unwrap_or("")
    )?;
    Ok(created)
}

/// Secret that publishes change events to `topic_name`
/// (`projects/p/topics/t`).
pub async fn create_secret_with_topic(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secret_id: &str,
    topic_name: &str,
) -> GcpResult<Secret> {
    let secret = automatic(Secret {
        topics: vec![TopicRef {
            name: topic_name.to_string(),
        }],
        ..Default::default()
    });
    let parent = format!("projects/{}", project);
    let created = insert_secret(client, SERVICE, &parent, secret_id, &secret).await?;
    writeln!(w, "Created secret with topic: {}", created.name)?;
    Ok(created)
}

/// Secret rotated daily, first rotation in 24 hours. Rotation requires a
/// notification topic.
pub async fn create_secret_with_rotation(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secret_id: &str,
    topic_name: &str,
) -> GcpResult<Secret> {
    let secret = automatic(Secret {
        topics: vec![TopicRef {
            name: topic_name.to_string(),
        }],
        rotation: Some(Rotation {
            next_rotation_time: Some(rfc3339_from_now(Duration::hours(24))),
            rotation_period: Some("86400s".to_string()),
        }),
        ..Default::default()
    });
    let parent = format!("projects/{}", project);
    let created = insert_secret(client, SERVICE, &parent, secret_id, &secret).await?;
    writeln!(w, "Created secret with rotation: {}", created.name)?;
    Ok(created)
}

/// Secret whose destroyed versions stay recoverable for a day.
pub async fn create_secret_with_delayed_destroy(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    secret_id: &str,
) -> GcpResult<Secret> {
    let secret = automatic(Secret {
        version_destroy_ttl: Some("86400s".to_string()),
        ..Default::default()
    });
    let parent = format!("projects/{}", project);
    let created = insert_secret(client, SERVICE, &parent, secret_id, &secret).await?;
    writeln!(w, "Created secret with version destroy ttl: {}", created.name)?;
    Ok(created)
}

// ── Read ────────────────────────────────────────────────────────────────

pub async fn get_secret(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = fetch_secret(client, SERVICE, secret_name).await?;
    let policy = secret
        .replication
        .as_ref()
        .map(Replication::describe)
        .unwrap_or_default();
    writeln!(w, "Found secret {} with replication policy {}", secret.name, policy)?;
    Ok(secret)
}

pub async fn list_secrets(
    w: &mut impl Write,
    client: &GcpClient,
    parent: &str,
) -> GcpResult<Vec<Secret>> {
    let secrets = fetch_secrets(client, SERVICE, parent, None).await?;
    for s in &secrets {
        writeln!(w, "Found secret {}", s.name)?;
    }
    Ok(secrets)
}

/// `filter` uses the list filter syntax, e.g. `labels.env:prod` or `name:s1`.
pub async fn list_secrets_with_filter(
    w: &mut impl Write,
    client: &GcpClient,
    parent: &str,
    filter: &str,
) -> GcpResult<Vec<Secret>> {
    let secrets = fetch_secrets(client, SERVICE, parent, Some(filter)).await?;
    for s in &secrets {
        writeln!(w, "Found secret {}", s.name)?;
    }
    Ok(secrets)
}

pub async fn view_secret_labels(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<HashMap<String, String>> {
    let secret = fetch_secret(client, SERVICE, secret_name).await?;
    writeln!(w, "Found secret {}", secret.name)?;
    let mut keys: Vec<&String> = secret.labels.keys().collect();
    keys.sort();
    for k in keys {
        writeln!(w, "Label key: {}, Label value: {}", k, secret.labels[k])?;
    }
    Ok(secret.labels)
}

pub async fn view_secret_annotations(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<HashMap<String, String>> {
    let secret = fetch_secret(client, SERVICE, secret_name).await?;
    writeln!(w, "Found secret {}", secret.name)?;
    let mut keys: Vec<&String> = secret.annotations.keys().collect();
    keys.sort();
    for k in keys {
        writeln!(
            w,
            "Annotation key: {}, Annotation value: {}",
            k, secret.annotations[k]
        )?;
    }
    Ok(secret.annotations)
}

// ── Update ──────────────────────────────────────────────────────────────

/// Replace the labels with `secretmanager=rocks`.
pub async fn update_secret(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        labels: labels(&[("secretmanager", "rocks")]),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "labels").await?;
    writeln!(w, "Updated secret: {}", updated.name)?;
    Ok(updated)
}

/// Like [`update_secret`], but fails if the secret changed since `etag`
/// was read.
pub async fn update_secret_with_etag(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
    etag: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        etag: Some(etag.to_string()),
        labels: labels(&[("secretmanager", "rocks")]),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "labels").await?;
    writeln!(w, "Updated secret: {}", updated.name)?;
    Ok(updated)
}

/// Point the `test` alias at version 1.
pub async fn update_secret_with_alias(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        version_aliases: labels(&[("test", "1")]),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "version_aliases").await?;
    writeln!(w, "Updated secret: {}", updated.name)?;
    Ok(updated)
}

/// Set `labelkey=updatedlabelvalue`, keeping the other labels.
pub async fn create_update_secret_label(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let mut secret = fetch_secret(client, SERVICE, secret_name).await?;
    secret
        .labels
        .insert("labelkey".to_string(), "updatedlabelvalue".to_string());
    let updated = patch_secret(client, SERVICE, &secret, "labels").await?;
    writeln!(w, "Updated secret: {}", updated.name)?;
    Ok(updated)
}

pub async fn delete_secret_label(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let mut secret = fetch_secret(client, SERVICE, secret_name).await?;
    secret.labels.remove("labelkey");
    let updated = patch_secret(client, SERVICE, &secret, "labels").await?;
    writeln!(w, "Updated secret: {}", updated.name)?;
    Ok(updated)
}

/// Set `annotationkey=updatedannotationvalue`, keeping the other annotations.
pub async fn edit_secret_annotation(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let mut secret = fetch_secret(client, SERVICE, secret_name).await?;
    secret
        .annotations
        .insert("annotationkey".to_string(), "updatedannotationvalue".to_string());
    let updated = patch_secret(client, SERVICE, &secret, "annotations").await?;
    writeln!(w, "Updated secret: {}", updated.name)?;
    Ok(updated)
}

pub async fn delete_secret_annotation(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let mut secret = fetch_secret(client, SERVICE, secret_name).await?;
    secret.annotations.remove("annotationkey");
    let updated = patch_secret(client, SERVICE, &secret, "annotations").await?;
    writeln!(w, "Deleted annotation from secret: {}", updated.name)?;
    Ok(updated)
}

/// Move the expiration to two hours from now.
pub async fn update_secret_expiration(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        expire_time: Some(rfc3339_from_now(Duration::hours(2))),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "expire_time").await?;
    writeln!(
        w,
        "Updated secret {} expiration time to {}",
        updated.name,
        updated.expire_time.as_deref().unwrap_or("")
    )?;
    Ok(updated)
}

pub async fn delete_expiration(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "expire_time").await?;
    writeln!(w, "Removed expiration from secret {}", updated.name)?;
    Ok(updated)
}

/// Rotate every two days instead.
pub async fn update_secret_rotation_period(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        rotation: Some(Rotation {
            next_rotation_time: None,
            rotation_period: Some("172800s".to_string()),
        }),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "rotation.rotation_period").await?;
    let period = updated
        .rotation
        .as_ref()
        .and_then(|r| r.rotation_period.as_deref())
        .unwrap_or("");
    writeln!(w, "Updated secret {} rotation period to {}", updated.name, period)?;
    Ok(updated)
}

pub async fn delete_secret_rotation(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "rotation").await?;
    writeln!(w, "Updated secret {}: removed rotation", updated.name)?;
    Ok(updated)
}

/// Keep destroyed versions recoverable for two days.
pub async fn update_secret_with_delayed_destroy(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        version_destroy_ttl: Some("172800s".to_string()),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "version_destroy_ttl").await?;
    writeln!(w, "Updated secret: {}", updated.name)?;
    Ok(updated)
}

pub async fn delete_secret_version_destroy_ttl(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Secret> {
    let secret = Secret {
        name: secret_name.to_string(),
        ..Default::default()
    };
    let updated = patch_secret(client, SERVICE, &secret, "version_destroy_ttl").await?;
    writeln!(w, "Updated secret {}: removed version_destroy_ttl", updated.name)?;
    Ok(updated)
}

// ── Delete ──────────────────────────────────────────────────────────────

pub async fn delete_secret(client: &GcpClient, secret_name: &str) -> GcpResult<()> {
    remove_secret(client, SERVICE, secret_name, None).await
}

pub async fn delete_secret_with_etag(
    client: &GcpClient,
    secret_name: &str,
    etag: &str,
) -> GcpResult<()> {
    remove_secret(client, SERVICE, secret_name, Some(etag)).await
}

// ── Versions ────────────────────────────────────────────────────────────

/// Add the version payload `my super secret data`, with its CRC32C.
pub async fn add_secret_version(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<SecretVersion> {
    let version = insert_version(client, SERVICE, secret_name, b"my super secret data").await?;
    writeln!(w, "Added secret version: {}", version.name)?;
    Ok(version)
}

/// Print the payload of a version after verifying its checksum.
///
/// `version_name` may end in a number, `latest`, or an alias.
pub async fn access_secret_version(
    w: &mut impl Write,
    client: &GcpClient,
    version_name: &str,
) -> GcpResult<Vec<u8>> {
    let data = access_version(client, SERVICE, version_name).await?;
    writeln!(w, "Plaintext: {}", String::from_utf8_lossy(&data))?;
    Ok(data)
}

pub async fn get_secret_version(
    w: &mut impl Write,
    client: &GcpClient,
    version_name: &str,
) -> GcpResult<SecretVersion> {
    let version = fetch_version(client, SERVICE, version_name).await?;
    writeln!(w, "Found secret version {} with state {}", version.name, version.state)?;
    Ok(version)
}

pub async fn list_secret_versions(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
) -> GcpResult<Vec<SecretVersion>> {
    let versions = fetch_versions(client, SERVICE, secret_name, None).await?;
    for v in &versions {
        writeln!(w, "{} with state {}", v.name, v.state)?;
    }
    Ok(versions)
}

pub async fn list_secret_versions_with_filter(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
    filter: &str,
) -> GcpResult<Vec<SecretVersion>> {
    let versions = fetch_versions(client, SERVICE, secret_name, Some(filter)).await?;
    for v in &versions {
        writeln!(w, "{} with state {}", v.name, v.state)?;
    }
    Ok(versions)
}

pub async fn enable_secret_version(client: &GcpClient, version_name: &str) -> GcpResult<SecretVersion> {
    change_version_state(client, SERVICE, version_name, VersionAction::Enable, None).await
}

pub async fn enable_secret_version_with_etag(
    client: &GcpClient,
    version_name: &str,
    etag: &str,
) -> GcpResult<SecretVersion> {
    change_version_state(client, SERVICE, version_name, VersionAction::Enable, Some(etag)).await
}

pub async fn disable_secret_version(client: &GcpClient, version_name: &str) -> GcpResult<SecretVersion> {
    change_version_state(client, SERVICE, version_name, VersionAction::Disable, None).await
}

pub async fn disable_secret_version_with_etag(
    client: &GcpClient,
    version_name: &str,
    etag: &str,
) -> GcpResult<SecretVersion> {
    change_version_state(client, SERVICE, version_name, VersionAction::Disable, Some(etag)).await
}

pub async fn destroy_secret_version(client: &GcpClient, version_name: &str) -> GcpResult<SecretVersion> {
    change_version_state(client, SERVICE, version_name, VersionAction::Destroy, None).await
}

pub async fn destroy_secret_version_with_etag(
    client: &GcpClient,
    version_name: &str,
    etag: &str,
) -> GcpResult<SecretVersion> {
    change_version_state(client, SERVICE, version_name, VersionAction::Destroy, Some(etag)).await
}

// ── IAM ─────────────────────────────────────────────────────────────────

/// Grant `member` (e.g. `user:foo@example.com`) access to the secret's payloads.
pub async fn iam_grant_access(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
    member: &str,
) -> GcpResult<IamPolicy> {
    let policy = update_accessor(client, SERVICE, secret_name, member, true).await?;
    writeln!(w, "Updated IAM policy for {}", secret_name)?;
    Ok(policy)
}

pub async fn iam_revoke_access(
    w: &mut impl Write,
    client: &GcpClient,
    secret_name: &str,
    member: &str,
) -> GcpResult<IamPolicy> {
    let policy = update_accessor(client, SERVICE, secret_name, member, false).await?;
    writeln!(w, "Updated IAM policy for {}", secret_name)?;
    Ok(policy)
}
