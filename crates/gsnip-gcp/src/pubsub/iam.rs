//! IAM policy snippets for topics and subscriptions.

use super::{subscription_name, topic_name, SERVICE};
use crate::client::GcpClient;
use crate::error::{Context, GcpResult};
use crate::iam::{IamClient, IamPolicy};
use std::io::Write;

async fn print_policy(
    w: &mut impl Write,
    client: &GcpClient,
    resource: &str,
) -> GcpResult<IamPolicy> {
    let policy = IamClient::get_policy(client, SERVICE, resource)
        .await
        .context("GetIamPolicy")?;
    for binding in &policy.bindings {
        for member in &binding.members {
            writeln!(w, "role: {}, member: {}", binding.role, member)?;
        }
    }
    Ok(policy)
}

/// Grant `allUsers` viewer and `group:cloud-logs@google.com` editor.
async fn add_users(client: &GcpClient, resource: &str) -> GcpResult<IamPolicy> {
    let mut policy = IamClient::get_policy(client, SERVICE, resource)
        .await
        .context("GetIamPolicy")?;
    policy.add("roles/viewer", "allUsers");
    policy.add("roles/editor", "group:cloud-logs@google.com");
    // setIamPolicy fails if the policy changed since it was read (etag).
    IamClient::set_policy(client, SERVICE, resource, &policy)
        .await
        .context("SetIamPolicy")
}

async fn print_permissions(
    w: &mut impl Write,
    client: &GcpClient,
    resource: &str,
    permissions: &[&str],
) -> GcpResult<Vec<String>> {
    let allowed = IamClient::test_permissions(client, SERVICE, resource, permissions)
        .await
        .context("TestIamPermissions")?;
    for perm in &allowed {
        writeln!(w, "Allowed: {}", perm)?;
    }
    Ok(allowed)
}

pub async fn get_topic_policy(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<IamPolicy> {
    print_policy(w, client, &topic_name(project, topic_id)).await
}

pub async fn add_users_to_topic(
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<IamPolicy> {
    add_users(client, &topic_name(project, topic_id)).await
}

pub async fn test_topic_permissions(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    topic_id: &str,
) -> GcpResult<Vec<String>> {
    let resource = topic_name(project, topic_id);
    print_permissions(
        w,
        client,
        &resource,
        &["pubsub.topics.publish", "pubsub.topics.update"],
    )
    .await
}

pub async fn get_subscription_policy(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
) -> GcpResult<IamPolicy> {
    print_policy(w, client, &subscription_name(project, sub_id)).await
}

pub async fn add_users_to_subscription(
    client: &GcpClient,
    project: &str,
    sub_id: &str,
) -> GcpResult<IamPolicy> {
    add_users(client, &subscription_name(project, sub_id)).await
}

pub async fn test_subscription_permissions(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    sub_id: &str,
) -> GcpResult<Vec<String>> {
    let resource = subscription_name(project, sub_id);
    print_permissions(
        w,
        client,
        &resource,
        &["pubsub.subscriptions.consume", "pubsub.subscriptions.update"],
    )
    .await
}
