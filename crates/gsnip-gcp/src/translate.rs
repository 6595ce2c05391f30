//! Cloud Translation v3 snippets.
//!
//! API base: `https://translate.googleapis.com/v3`. Text calls run in the
//! `global` location; batch jobs, glossaries and custom models need a
//! regional one such as `us-central1`.

use crate::client::GcpClient;
use crate::error::{Context, GcpResult};
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::io::Write;

const SERVICE: &str = "translate";
const V3: &str = "/v3";

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    #[serde(default)]
    pub translated_text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub detected_language_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateTextResponse {
    #[serde(default)]
    pub translations: Vec<Translation>,
    #[serde(default)]
    pub glossary_translations: Vec<Translation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLanguage {
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
struct DetectLanguageResponse {
    #[serde(default)]
    languages: Vec<DetectedLanguage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedLanguage {
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub support_source: bool,
    #[serde(default)]
    pub support_target: bool,
}

#[derive(Debug, Deserialize)]
struct SupportedLanguages {
    #[serde(default)]
    languages: Vec<SupportedLanguage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTranslateResponse {
    #[serde(default, with = "crate::int64")]
    pub total_characters: Option<i64>,
    #[serde(default, with = "crate::int64")]
    pub translated_characters: Option<i64>,
    #[serde(default, with = "crate::int64")]
    pub failed_characters: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsSource {
    pub input_uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryInputConfig {
    #[serde(default)]
    pub gcs_source: GcsSource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageCodesSet {
    #[serde(default)]
    pub language_codes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Glossary {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_codes_set: Option<LanguageCodesSet>,
    #[serde(default)]
    pub input_config: GlossaryInputConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlossaryList {
    #[serde(default)]
    glossaries: Vec<Glossary>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGlossaryResponse {
    #[serde(default)]
    pub name: String,
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn location_path(project: &str, location: &str) -> String {
    format!("projects/{}/locations/{}", project, location)
}

fn glossary_name(project: &str, location: &str, glossary_id: &str) -> String {
    format!("{}/glossaries/{}", location_path(project, location), glossary_id)
}

async fn call_translate(
    client: &GcpClient,
    project: &str,
    location: &str,
    body: &serde_json::Value,
) -> GcpResult<TranslateTextResponse> {
    let path = format!("{}/{}:translateText", V3, location_path(project, location));
    client
        .post(SERVICE, &path, body)
        .await
        .context("TranslateText")
}

// ── Text ────────────────────────────────────────────────────────────────

pub async fn translate_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    source_lang: &str,
    target_lang: &str,
    text: &str,
) -> GcpResult<Vec<Translation>> {
    let body = serde_json::json!({
        "contents": [text],
        "mimeType": "text/plain",
        "sourceLanguageCode": source_lang,
        "targetLanguageCode": target_lang
    });
    let resp = call_translate(client, project, "global", &body).await?;
    for t in &resp.translations {
        writeln!(w, "Translated text: {}", t.translated_text)?;
    }
    Ok(resp.translations)
}

/// Translate with an AutoML custom model trained in `location`.
pub async fn translate_text_with_model(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    source_lang: &str,
    target_lang: &str,
    text: &str,
    model_id: &str,
) -> GcpResult<Vec<Translation>> {
    let model = format!("{}/models/{}", location_path(project, location), model_id);
    let body = serde_json::json!({
        "contents": [text],
        "mimeType": "text/plain",
        "sourceLanguageCode": source_lang,
        "targetLanguageCode": target_lang,
        "model": model
    });
    let resp = call_translate(client, project, location, &body).await?;
    for t in &resp.translations {
        writeln!(w, "Translated text: {}", t.translated_text)?;
    }
    Ok(resp.translations)
}

pub async fn translate_text_with_glossary(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    source_lang: &str,
    target_lang: &str,
    text: &str,
    glossary_id: &str,
) -> GcpResult<Vec<Translation>> {
    let body = serde_json::json!({
        "contents": [text],
        "mimeType": "text/plain",
        "sourceLanguageCode": source_lang,
        "targetLanguageCode": target_lang,
        "glossaryConfig": { "glossary": glossary_name(project, location, glossary_id) }
    });
    let resp = call_translate(client, project, location, &body).await?;
    for t in &resp.glossary_translations {
        writeln!(w, "Translated text: {}", t.translated_text)?;
    }
    Ok(resp.glossary_translations)
}

pub async fn detect_language(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    text: &str,
) -> GcpResult<Vec<DetectedLanguage>> {
    let path = format!("{}/{}:detectLanguage", V3, location_path(project, "global"));
    let body = serde_json::json!({ "content": text, "mimeType": "text/plain" });
    let resp: DetectLanguageResponse = client
        .post(SERVICE, &path, &body)
        .await
        .context("DetectLanguage")?;
    for lang in &resp.languages {
        writeln!(w, "Detected Language: {}", lang.language_code)?;
        writeln!(w, "Confidence: {}", lang.confidence)?;
    }
    Ok(resp.languages)
}

async fn supported_languages(
    client: &GcpClient,
    project: &str,
    display_language: Option<&str>,
) -> GcpResult<Vec<SupportedLanguage>> {
    let path = format!("{}/{}/supportedLanguages", V3, location_path(project, "global"));
    let query: Vec<(&str, &str)> = display_language
        .map(|l| vec![("displayLanguageCode", l)])
        .unwrap_or_default();
    let resp: SupportedLanguages = client
        .get(SERVICE, &path, &query)
        .await
        .context("GetSupportedLanguages")?;
    Ok(resp.languages)
}

pub async fn get_supported_languages(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
) -> GcpResult<Vec<SupportedLanguage>> {
    let languages = supported_languages(client, project, None).await?;
    for lang in &languages {
        writeln!(w, "Language Code: {}", lang.language_code)?;
    }
    Ok(languages)
}

/// List supported languages with names rendered in `language_code`.
pub async fn get_supported_languages_for_target(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    language_code: &str,
) -> GcpResult<Vec<SupportedLanguage>> {
    let languages = supported_languages(client, project, Some(language_code)).await?;
    for lang in &languages {
        writeln!(w, "Language Code: {}", lang.language_code)?;
        writeln!(w, "Display Name: {}", lang.display_name.as_deref().unwrap_or(""))?;
    }
    Ok(languages)
}

// ── Batch ───────────────────────────────────────────────────────────────

/// Translate a GCS text file into files under `output_uri` (a `gs://` prefix
/// ending in `/`). Blocks until the job finishes.
pub async fn batch_translate_text(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    input_uri: &str,
    output_uri: &str,
    source_lang: &str,
    target_lang: &str,
) -> GcpResult<BatchTranslateResponse> {
    let path = format!("{}/{}:batchTranslateText", V3, location_path(project, location));
    let body = serde_json::json!({
        "sourceLanguageCode": source_lang,
        "targetLanguageCodes": [target_lang],
        "inputConfigs": [{ "gcsSource": { "inputUri": input_uri }, "mimeType": "text/plain" }],
        "outputConfig": { "gcsDestination": { "outputUriPrefix": output_uri } }
    });
    let op: Operation = client
        .post(SERVICE, &path, &body)
        .await
        .context("BatchTranslateText")?;
    writeln!(w, "Processing operation name: {}", op.name)?;
    let resp: BatchTranslateResponse = client
        .wait_operation(SERVICE, V3, op)
        .await
        .context("Wait")?
        .into_response(SERVICE)?;
    writeln!(w, "Total Characters: {}", resp.total_characters.unwrap_or(0))?;
    writeln!(w, "Translated Characters: {}", resp.translated_characters.unwrap_or(0))?;
    Ok(resp)
}

// ── Glossaries ──────────────────────────────────────────────────────────

/// Create an English/Japanese glossary from a CSV at `glossary_input_uri`.
pub async fn create_glossary(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    glossary_id: &str,
    glossary_input_uri: &str,
) -> GcpResult<Glossary> {
    let glossary = Glossary {
        name: glossary_name(project, location, glossary_id),
        language_codes_set: Some(LanguageCodesSet {
            language_codes: vec!["en".to_string(), "ja".to_string()],
        }),
        input_config: GlossaryInputConfig {
            gcs_source: GcsSource {
                input_uri: glossary_input_uri.to_string(),
            },
        },
        ..Default::default()
    };
    let path = format!("{}/{}/glossaries", V3, location_path(project, location));
    let op: Operation = client
        .post(SERVICE, &path, &glossary)
        .await
        .context("CreateGlossary")?;
    writeln!(w, "Processing operation name: {}", op.name)?;
    let created: Glossary = client
        .wait_operation(SERVICE, V3, op)
        .await
        .context("Wait")?
        .into_response(SERVICE)?;
    writeln!(w, "Created: {}", created.name)?;
    writeln!(w, "Input URI: {}", created.input_config.gcs_source.input_uri)?;
    Ok(created)
}

fn print_glossary(w: &mut impl Write, g: &Glossary) -> std::io::Result<()> {
    writeln!(w, "Name: {}", g.name)?;
    writeln!(w, "Entry count: {}", g.entry_count.unwrap_or(0))?;
    writeln!(w, "Input URI: {}", g.input_config.gcs_source.input_uri)?;
    if let Some(ref set) = g.language_codes_set {
        writeln!(w, "Language codes: {}", set.language_codes.join(", "))?;
    }
    Ok(())
}

pub async fn get_glossary(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    glossary_id: &str,
) -> GcpResult<Glossary> {
    let path = format!("{}/{}", V3, glossary_name(project, location, glossary_id));
    let glossary: Glossary = client
        .get(SERVICE, &path, &[])
        .await
        .context("GetGlossary")?;
    print_glossary(w, &glossary)?;
    Ok(glossary)
}

pub async fn list_glossaries(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> GcpResult<Vec<Glossary>> {
    let path = format!("{}/{}/glossaries", V3, location_path(project, location));
    let glossaries = client
        .get_all_pages(SERVICE, &path, &[], |p: GlossaryList| (p.glossaries, p.next_page_token))
        .await
        .context("ListGlossaries")?;
    for g in &glossaries {
        print_glossary(w, g)?;
    }
    Ok(glossaries)
}

pub async fn delete_glossary(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    glossary_id: &str,
) -> GcpResult<DeleteGlossaryResponse> {
    let path = format!("{}/{}", V3, glossary_name(project, location, glossary_id));
    let op: Operation = client
        .delete(SERVICE, &path, &[])
        .await
        .context("DeleteGlossary")?;
    writeln!(w, "Processing operation name: {}", op.name)?;
    let resp: DeleteGlossaryResponse = client
        .wait_operation(SERVICE, V3, op)
        .await
        .context("Wait")?
        .into_response(SERVICE)?;
    writeln!(w, "Deleted: {}", resp.name)?;
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_counts_parse_from_strings() {
        let resp: BatchTranslateResponse = serde_json::from_value(serde_json::json!({
            "totalCharacters": "1024",
            "translatedCharacters": "1000"
        }))
        .unwrap();
        assert_eq!(resp.total_characters, Some(1024));
        assert_eq!(resp.translated_characters, Some(1000));
        assert_eq!(resp.failed_characters, None);
    }

    #[test]
    fn glossary_request_shape() {
        let g = Glossary {
            name: glossary_name("p", "us-central1", "g"),
            language_codes_set: Some(LanguageCodesSet {
                language_codes: vec!["en".into(), "ja".into()],
            }),
            input_config: GlossaryInputConfig {
                gcs_source: GcsSource {
                    input_uri: "gs://b/g.csv".into(),
                },
            },
            ..Default::default()
        };
        let v = serde_json::to_value(&g).unwrap();
        assert_eq!(v["name"], "projects/p/locations/us-central1/glossaries/g");
        assert_eq!(v["inputConfig"]["gcsSource"]["inputUri"], "gs://b/g.csv");
        assert!(v.get("entryCount").is_none());
    }
}
