//! Live Stream snippets against a mock server.

mod common;

use common::{client, output, PROJECT};
use gsnip_gcp::livestream;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOCATION: &str = "us-central1";

fn parent() -> String {
    format!("/v1/projects/{}/locations/{}", PROJECT, LOCATION)
}

#[tokio::test]
async fn create_input_unpacks_operation_response() {
    let server = MockServer::start().await;
    let op_name = format!("projects/{}/locations/{}/operations/op-1", PROJECT, LOCATION);
    let input_name = format!("projects/{}/locations/{}/inputs/my-input", PROJECT, LOCATION);

    Mock::given(method("POST"))
        .and(path(format!("{}/inputs", parent())))
        .and(query_param("inputId", "my-input"))
        .and(body_partial_json(json!({ "type": "RTMP_PUSH" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name, "done": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", op_name)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op_name,
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.cloud.video.livestream.v1.Input",
                "name": input_name,
                "type": "RTMP_PUSH"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let input = livestream::create_input(&mut out, &client, PROJECT, LOCATION, "my-input")
        .await
        .unwrap();
    assert_eq!(input.name, input_name);
    assert_eq!(output(out), format!("Input: {}\n", input_name));
}

#[tokio::test]
async fn operation_error_surfaces_with_wait_method() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/channels/ch:start", parent())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/p/locations/l/operations/op-2",
            "done": true,
            "error": { "code": 9, "message": "channel has no input" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let err = livestream::start_channel(&mut out, &client, PROJECT, LOCATION, "ch")
        .await
        .unwrap_err();
    assert_eq!(err.status, "FAILED_PRECONDITION");
    assert_eq!(err.method.as_deref(), Some("Wait"));
    assert!(out.is_empty());
}

#[tokio::test]
async fn create_channel_event_executes_now() {
    let server = MockServer::start().await;
    let event_name = format!(
        "projects/{}/locations/{}/channels/ch/events/ad-1",
        PROJECT, LOCATION
    );
    Mock::given(method("POST"))
        .and(path(format!("{}/channels/ch/events", parent())))
        .and(query_param("eventId", "ad-1"))
        .and(body_partial_json(json!({
            "adBreak": { "duration": "30s" },
            "executeNow": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": event_name })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    livestream::create_channel_event(&mut out, &client, PROJECT, LOCATION, "ch", "ad-1")
        .await
        .unwrap();
    assert_eq!(output(out), format!("Channel event: {}\n", event_name));
}

#[tokio::test]
async fn list_inputs_prints_header_and_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/inputs", parent())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "inputs": [{ "name": "inputs/a" }, { "name": "inputs/b" }]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    livestream::list_inputs(&mut out, &client, PROJECT, LOCATION)
        .await
        .unwrap();
    assert_eq!(output(out), "Inputs:\ninputs/a\ninputs/b\n");
}
