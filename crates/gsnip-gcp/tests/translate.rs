//! Cloud Translation v3 snippets against a mock server.

mod common;

use common::{client, output, PROJECT};
use gsnip_gcp::translate;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn location(loc: &str) -> String {
    format!("/v3/projects/{}/locations/{}", PROJECT, loc)
}

#[tokio::test]
async fn translate_text_runs_in_global() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:translateText", location("global"))))
        .and(body_json(json!({
            "contents": ["Hello, world!"],
            "mimeType": "text/plain",
            "sourceLanguageCode": "en-US",
            "targetLanguageCode": "fr"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translations": [{ "translatedText": "Bonjour le monde !" }]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    translate::translate_text(&mut out, &client, PROJECT, "en-US", "fr", "Hello, world!")
        .await
        .unwrap();
    assert_eq!(output(out), "Translated text: Bonjour le monde !\n");
}

#[tokio::test]
async fn detect_language_prints_code_and_confidence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:detectLanguage", location("global"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "languages": [{ "languageCode": "en", "confidence": 1.0 }]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    translate::detect_language(&mut out, &client, PROJECT, "Hello, world!")
        .await
        .unwrap();
    assert_eq!(output(out), "Detected Language: en\nConfidence: 1\n");
}

#[tokio::test]
async fn supported_languages_for_target_sends_display_language() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/supportedLanguages", location("global"))))
        .and(query_param("displayLanguageCode", "is"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "languages": [{ "languageCode": "en", "displayName": "enska" }]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    translate::get_supported_languages_for_target(&mut out, &client, PROJECT, "is")
        .await
        .unwrap();
    assert_eq!(output(out), "Language Code: en\nDisplay Name: enska\n");
}

#[tokio::test]
async fn create_glossary_waits_for_operation() {
    let server = MockServer::start().await;
    let op = format!("projects/{}/locations/us-central1/operations/g-1", PROJECT);
    let name = format!("projects/{}/locations/us-central1/glossaries/gl", PROJECT);
    let uri = "gs://cloud-samples-data/translation/glossary_ja.csv";

    Mock::given(method("POST"))
        .and(path(format!("{}/glossaries", location("us-central1"))))
        .and(body_partial_json(json!({
            "name": name,
            "languageCodesSet": { "languageCodes": ["en", "ja"] },
            "inputConfig": { "gcsSource": { "inputUri": uri } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": op })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v3/{}", op)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op,
            "done": true,
            "response": {
                "name": name,
                "inputConfig": { "gcsSource": { "inputUri": uri } },
                "entryCount": 9
            }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let glossary = translate::create_glossary(&mut out, &client, PROJECT, "us-central1", "gl", uri)
        .await
        .unwrap();
    assert_eq!(glossary.entry_count, Some(9));
    assert_eq!(
        output(out),
        format!(
            "Processing operation name: {}\nCreated: {}\nInput URI: {}\n",
            op, name, uri
        )
    );
}

#[tokio::test]
async fn batch_translate_reports_character_counts() {
    let server = MockServer::start().await;
    let op = format!("projects/{}/locations/us-central1/operations/b-1", PROJECT);
    Mock::given(method("POST"))
        .and(path(format!("{}:batchTranslateText", location("us-central1"))))
        .and(body_partial_json(json!({
            "sourceLanguageCode": "en",
            "targetLanguageCodes": ["ja"],
            "outputConfig": { "gcsDestination": { "outputUriPrefix": "gs://out/" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op,
            "done": true,
            "response": { "totalCharacters": "120", "translatedCharacters": "118" }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    translate::batch_translate_text(
        &mut out,
        &client,
        PROJECT,
        "us-central1",
        "gs://in/input.txt",
        "gs://out/",
        "en",
        "ja",
    )
    .await
    .unwrap();
    assert_eq!(
        output(out),
        format!(
            "Processing operation name: {}\nTotal Characters: 120\nTranslated Characters: 118\n",
            op
        )
    );
}

#[tokio::test]
async fn failed_glossary_delete_is_an_error() {
    let server = MockServer::start().await;
    let op = format!("projects/{}/locations/us-central1/operations/d-1", PROJECT);
    Mock::given(method("DELETE"))
        .and(path(format!("{}/glossaries/missing", location("us-central1"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": op,
            "done": true,
            "error": { "code": 5, "message": "Glossary not found." }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let mut out = Vec::new();
    let err = translate::delete_glossary(&mut out, &client, PROJECT, "us-central1", "missing")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.method.as_deref(), Some("Wait"));
    assert_eq!(output(out), format!("Processing operation name: {}\n", op));
}
