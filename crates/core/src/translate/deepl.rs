use crate::config::{ApiKey, TargetLang};
use crate::lang;
use crate::translate::{ensure_success, TranslateError, Translation, Translator};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Clone)]
pub struct DeepLTranslator {
    client: Client,
    api_key: ApiKey,
    endpoint: String,
}

impl DeepLTranslator {
    /// Without an explicit base URL the free or pro host is picked from the
    /// key: free-tier keys end in `:fx`.
    pub fn new(api_key: ApiKey, base_url: Option<&Url>) -> Self {
        let base = match base_url {
            Some(url) => url.as_str().trim_end_matches('/').to_owned(),
            None if api_key.expose().ends_with(":fx") => "https://api-free.deepl.com".to_owned(),
            None => "https://api.deepl.com".to_owned(),
        };
        Self {
            client: Client::new(),
            api_key,
            endpoint: format!("{base}/v2/translate"),
        }
    }
}

#[derive(Serialize)]
struct DeepLRequest {
    text: Vec<String>,
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,
}

#[derive(Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Deserialize)]
struct DeepLTranslation {
    detected_source_language: Option<String>,
    text: String,
}

/// DeepL wants upper-case codes, and a handful of targets need a variant.
fn target_code(target: &str) -> String {
    match target.to_lowercase().as_str() {
        "zh-tw" => "ZH-HANT".to_string(),
        "en" => "EN-US".to_string(),
        "pt" => "PT-BR".to_string(),
        "pt-br" => "PT-BR".to_string(),
        "pt-pt" => "PT-PT".to_string(),
        "en-gb" => "EN-GB".to_string(),
        "en-us" => "EN-US".to_string(),
        _ => target.to_uppercase(),
    }
}

/// Source languages never carry a region.
fn source_code(source: &str) -> String {
    lang::primary_subtag(source).to_uppercase()
}

impl Translator for DeepLTranslator {
    fn name(&self) -> &'static str {
        "deepl"
    }

    fn translate(
        &self,
        text: String,
        target: TargetLang,
        source_hint: Option<String>,
    ) -> BoxFuture<'_, Result<Translation, TranslateError>> {
        async move {
            let request = DeepLRequest {
                text: vec![text],
                target_lang: target_code(target.as_str()),
                source_lang: source_hint.as_deref().map(source_code),
            };

            let response = self
                .client
                .post(&self.endpoint)
                .header(
                    "Authorization",
                    format!("DeepL-Auth-Key {}", self.api_key.expose()),
                )
                .json(&request)
                .send()
                .await?;
            let response = ensure_success(response).await?;

            let deepl_response: DeepLResponse = response.json().await.map_err(|e| {
                TranslateError::InvalidResponse(format!("Failed to parse JSON: {}", e))
            })?;

            let translation = deepl_response
                .translations
                .into_iter()
                .next()
                .ok_or_else(|| {
                    TranslateError::InvalidResponse("No translations in response".to_string())
                })?;

            Ok(Translation {
                text: translation.text,
                detected_source_lang: translation
                    .detected_source_language
                    .as_deref()
                    .and_then(lang::normalize),
            })
        }
        .boxed()
    }
}
