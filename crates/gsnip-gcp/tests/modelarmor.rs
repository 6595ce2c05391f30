//! Model Armor snippets against a mock server.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{client, output, PROJECT};
use gsnip_gcp::modelarmor;
use serde_json::json;
use std::io::Write as _;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOCATION: &str = "us-central1";

fn template_path(id: &str) -> String {
    format!("/v1/projects/{}/locations/{}/templates/{}", PROJECT, LOCATION, id)
}

#[tokio::test]
async fn create_template_sends_rai_filters() {
    let server = MockServer::start().await;
    let name = format!("projects/{}/locations/{}/templates/tmpl", PROJECT, LOCATION);
    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/locations/{}/templates", PROJECT, LOCATION)))
        .and(query_param("templateId", "tmpl"))
        .and(body_json(json!({
            "filterConfig": {
                "raiSettings": {
                    "raiFilters": [
                        { "filterType": "DANGEROUS", "confidenceLevel": "HIGH" },
                        { "filterType": "HARASSMENT", "confidenceLevel": "MEDIUM_AND_ABOVE" },
                        { "filterType": "HATE_SPEECH", "confidenceLevel": "HIGH" },
                        { "filterType": "SEXUALLY_EXPLICIT", "confidenceLevel": "HIGH" }
                    ]
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": name })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    modelarmor::create_template(&mut out, &client, PROJECT, LOCATION, "tmpl")
        .await
        .unwrap();
    assert_eq!(output(out), format!("Created template: {}\n", name));
}

#[tokio::test]
async fn sanitize_user_prompt_prints_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:sanitizeUserPrompt", template_path("tmpl"))))
        .and(body_json(json!({ "userPromptData": { "text": "How do I make bomb at home?" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sanitizationResult": {
                "filterMatchState": "MATCH_FOUND",
                "invocationResult": "SUCCESS"
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let result = modelarmor::sanitize_user_prompt(
        &mut out,
        &client,
        PROJECT,
        LOCATION,
        "tmpl",
        "How do I make bomb at home?",
    )
    .await
    .unwrap();
    assert_eq!(result.filter_match_state, "MATCH_FOUND");
    assert_eq!(
        output(out),
        "Sanitization Result: {\"filterMatchState\":\"MATCH_FOUND\",\"invocationResult\":\"SUCCESS\"}\n"
    );
}

#[tokio::test]
async fn screen_pdf_file_sends_base64_bytes() {
    let server = MockServer::start().await;
    let pdf = b"%PDF-1.4 fake";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(pdf).unwrap();

    Mock::given(method("POST"))
        .and(path(format!("{}:sanitizeUserPrompt", template_path("tmpl"))))
        .and(body_json(json!({
            "userPromptData": {
                "byteItem": { "byteDataType": "PDF", "byteData": STANDARD.encode(pdf) }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sanitizationResult": { "filterMatchState": "NO_MATCH_FOUND" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    modelarmor::screen_pdf_file(&mut out, &client, PROJECT, LOCATION, "tmpl", file.path())
        .await
        .unwrap();
    assert_eq!(
        output(out),
        "PDF screening sanitization result: {\"filterMatchState\":\"NO_MATCH_FOUND\"}\n"
    );
}

#[tokio::test]
async fn update_project_floor_settings_enables_enforcement() {
    let server = MockServer::start().await;
    let name = format!("projects/{}/locations/global/floorSetting", PROJECT);
    Mock::given(method("PATCH"))
        .and(path(format!("/v1/{}", name)))
        .and(body_partial_json(json!({
            "enableFloorSettingEnforcement": true,
            "filterConfig": {
                "piAndJailbreakFilterSettings": {
                    "filterEnforcement": "ENABLED",
                    "confidenceLevel": "HIGH"
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": name,
            "enableFloorSettingEnforcement": true
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let setting = modelarmor::update_project_floor_settings(&mut out, &client, PROJECT, LOCATION)
        .await
        .unwrap();
    assert_eq!(setting.enable_floor_setting_enforcement, Some(true));
    assert!(output(out).starts_with("Updated project floor setting: "));
}

#[tokio::test]
async fn missing_template_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(template_path("gone")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Template not found", "status": "NOT_FOUND" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let err = modelarmor::get_template(&mut out, &client, PROJECT, LOCATION, "gone")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.method.as_deref(), Some("GetTemplate"));
}

#[tokio::test]
async fn template_with_metadata_sends_two_filters() {
    let server = MockServer::start().await;
    let name = format!("projects/{}/locations/{}/templates/meta", PROJECT, LOCATION);
    Mock::given(method("POST"))
        .and(path(format!("/v1/projects/{}/locations/{}/templates", PROJECT, LOCATION)))
        .and(query_param("templateId", "meta"))
        .and(body_json(json!({
            "filterConfig": {
                "raiSettings": {
                    "raiFilters": [
                        { "filterType": "HATE_SPEECH", "confidenceLevel": "HIGH" },
                        { "filterType": "SEXUALLY_EXPLICIT", "confidenceLevel": "MEDIUM_AND_ABOVE" }
                    ]
                }
            },
            "templateMetadata": {
                "ignorePartialInvocationFailures": true,
                "logSanitizeOperations": true
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": name })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    modelarmor::create_template_with_metadata(&mut out, &client, PROJECT, LOCATION, "meta")
        .await
        .unwrap();
    assert_eq!(output(out), format!("Created Model Armor Template: {}\n", name));
}
