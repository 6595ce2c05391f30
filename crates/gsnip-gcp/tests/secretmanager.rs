//! Secret Manager snippets against a mock server.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{client, output, PROJECT};
use gsnip_gcp::secretmanager::{crc32c, regional, secrets};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn secret_name(id: &str) -> String {
    format!("projects/{}/secrets/{}", PROJECT, id)
}

#[tokio::test]
async fn create_secret_uses_automatic_replication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/secrets", PROJECT)))
        .and(query_param("secretId", "my-secret"))
        .and(body_partial_json(json!({ "replication": { "automatic": {} } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": secret_name("my-secret"),
            "replication": { "automatic": {} }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let parent = format!("projects/{}", PROJECT);
    secrets::create_secret(&mut out, &client, &parent, "my-secret")
        .await
        .unwrap();
    assert_eq!(
        output(out),
        format!("Created secret: {}\n", secret_name("my-secret"))
    );
}

#[tokio::test]
async fn add_secret_version_sends_checksum() {
    let server = MockServer::start().await;
    let data = b"my super secret data";
    Mock::given(method("POST"))
        .and(path(format!("/v1/{}:addVersion", secret_name("s"))))
        .and(body_json(json!({
            "payload": {
                "data": STANDARD.encode(data),
                "dataCrc32c": crc32c(data).to_string()
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": format!("{}/versions/1", secret_name("s")),
            "state": "ENABLED"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    secrets::add_secret_version(&mut out, &client, &secret_name("s"))
        .await
        .unwrap();
    assert_eq!(
        output(out),
        format!("Added secret version: {}/versions/1\n", secret_name("s"))
    );
}

#[tokio::test]
async fn access_secret_version_verifies_checksum() {
    let server = MockServer::start().await;
    let version = format!("{}/versions/latest", secret_name("s"));
    let data = b"hello world";
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}:access", version)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": format!("{}/versions/3", secret_name("s")),
            "payload": { "data": STANDARD.encode(data), "dataCrc32c": crc32c(data).to_string() }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let plaintext = secrets::access_secret_version(&mut out, &client, &version)
        .await
        .unwrap();
    assert_eq!(plaintext, data);
    assert_eq!(output(out), "Plaintext: hello world\n");
}

#[tokio::test]
async fn corrupted_payload_is_data_loss() {
    let server = MockServer::start().await;
    let version = format!("{}/versions/1", secret_name("s"));
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}:access", version)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": version,
            "payload": { "data": STANDARD.encode("tampered"), "dataCrc32c": "12345" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let err = secrets::access_secret_version(&mut out, &client, &version)
        .await
        .unwrap_err();
    assert_eq!(err.status, "DATA_LOSS");
    assert_eq!(err.message, "Data corruption detected.");
    assert!(out.is_empty());
}

#[tokio::test]
async fn get_secret_describes_replication() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", secret_name("s"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": secret_name("s"),
            "replication": {
                "userManaged": { "replicas": [{ "location": "us-east1" }, { "location": "us-east4" }] }
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    secrets::get_secret(&mut out, &client, &secret_name("s"))
        .await
        .unwrap();
    assert_eq!(
        output(out),
        format!(
            "Found secret {} with replication policy user_managed[us-east1, us-east4]\n",
            secret_name("s")
        )
    );
}

#[tokio::test]
async fn delete_secret_with_etag_passes_etag() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/v1/{}", secret_name("s"))))
        .and(query_param("etag", "\"abc\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    secrets::delete_secret_with_etag(&client, &secret_name("s"), "\"abc\"")
        .await
        .unwrap();
}

#[tokio::test]
async fn regional_secret_uses_location_path() {
    let server = MockServer::start().await;
    let name = format!("projects/{}/locations/us-central1/secrets/rs", PROJECT);
    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/locations/us-central1/secrets", PROJECT)))
        .and(query_param("secretId", "rs"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": name })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    regional::create_regional_secret(&mut out, &client, PROJECT, "us-central1", "rs")
        .await
        .unwrap();
    assert_eq!(output(out), format!("Created regional secret: {}\n", name));
}

#[tokio::test]
async fn disable_version_posts_state_change() {
    let server = MockServer::start().await;
    let version = format!("{}/versions/2", secret_name("s"));
    Mock::given(method("POST"))
        .and(path(format!("/v1/{}:disable", version)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": version, "state": "DISABLED"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let v = secrets::disable_secret_version(&client, &version).await.unwrap();
    assert_eq!(v.state, "DISABLED");
}
