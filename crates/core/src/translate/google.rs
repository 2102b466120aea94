use crate::config::{ApiKey, TargetLang};
use crate::lang;
use crate::translate::{ensure_success, TranslateError, Translation, Translator};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

/// Google Cloud Translation (v2, basic edition).
#[derive(Clone)]
pub struct GoogleTranslator {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl GoogleTranslator {
    pub fn new(api_key: ApiKey, base_url: &Url) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/language/translate/v2{}?key={}",
            self.base_url,
            path,
            urlencoding::encode(self.api_key.expose())
        )
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    format: &'static str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTranslation {
    translated_text: String,
    detected_source_language: Option<String>,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
}

#[derive(Deserialize)]
struct DetectResponse {
    data: DetectData,
}

#[derive(Deserialize)]
struct DetectData {
    detections: Vec<Vec<Detection>>,
}

#[derive(Deserialize)]
struct Detection {
    language: String,
}

impl Translator for GoogleTranslator {
    fn name(&self) -> &'static str {
        "google"
    }

    fn translate(
        &self,
        text: String,
        target: TargetLang,
        source_hint: Option<String>,
    ) -> BoxFuture<'_, Result<Translation, TranslateError>> {
        async move {
            let request = TranslateRequest {
                q: &text,
                target: target.as_str(),
                source: source_hint.as_deref(),
                format: "text",
            };

            let response = self
                .client
                .post(self.endpoint(""))
                .json(&request)
                .send()
                .await?;
            let response = ensure_success(response).await?;

            let body: TranslateResponse = response.json().await.map_err(|e| {
                TranslateError::InvalidResponse(format!("failed to parse Google response: {e}"))
            })?;

            let translation = body.data.translations.into_iter().next().ok_or_else(|| {
                TranslateError::InvalidResponse("no translations in response".into())
            })?;

            Ok(Translation {
                text: translation.translated_text,
                detected_source_lang: translation
                    .detected_source_language
                    .as_deref()
                    .and_then(lang::normalize),
            })
        }
        .boxed()
    }

    fn detect(&self, text: String) -> BoxFuture<'_, Result<Option<String>, TranslateError>> {
        async move {
            let response = self
                .client
                .post(self.endpoint("/detect"))
                .json(&DetectRequest { q: &text })
                .send()
                .await?;
            let response = ensure_success(response).await?;

            let body: DetectResponse = response.json().await.map_err(|e| {
                TranslateError::InvalidResponse(format!("failed to parse Google detection: {e}"))
            })?;

            Ok(body
                .data
                .detections
                .into_iter()
                .flatten()
                .next()
                .and_then(|d| lang::normalize(&d.language)))
        }
        .boxed()
    }
}
