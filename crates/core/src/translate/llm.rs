use crate::config::TargetLanguages;
use crate::lang;
use crate::translate::{
    CompletionBackend, FailReason, LangResult, MultiTranslator, TranslationOutcome,
};
use crate::util::parse_object;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

const LOG_TARGET: &str = "translate::llm";
const DETECTED_LANGUAGE_KEYS: &[&str] = &[
    "detected_language",
    "detectedLanguage",
    "source_language",
    "sourceLanguage",
];
const RAW_PREVIEW_CHARS: usize = 200;

/// Primary translator: one generative call produces every target language.
#[derive(Clone)]
pub struct LlmTranslator<B> {
    backend: B,
    style: String,
}

impl<B: CompletionBackend> LlmTranslator<B> {
    pub fn new(backend: B, style: impl Into<String>) -> Self {
        Self {
            backend,
            style: style.into(),
        }
    }
}

/// System instruction naming every target and pinning the JSON shape.
pub fn build_instruction(targets: &TargetLanguages, style: &str) -> String {
    let keys: Vec<String> = targets
        .iter()
        .map(|t| format!("{}:\"...\"", Value::String(t.as_str().to_owned())))
        .collect();
    let shape = format!(
        "{{\"detected_language\":\"<ISO 639-1 code of the message>\",\"translations\":{{{}}}}}",
        keys.join(",")
    );

    let mut out = String::from(
        "You are a translation engine for a chat group.\n\
         Translate the user's message into each of the following languages:\n",
    );
    for target in targets.iter() {
        out.push_str(&format!(
            "- \"{}\": {}\n",
            target.as_str(),
            lang::display_name(target.as_str())
        ));
    }
    let style = style.trim();
    if !style.is_empty() {
        out.push_str(style);
        out.push('\n');
    }
    out.push_str("Respond with exactly one JSON object of this shape and nothing else:\n");
    out.push_str(&shape);
    out.push_str(
        "\nEvery listed language key must be present with a plain string value. \
         Do not add explanations, notes, or markdown code fences.",
    );
    out
}

fn lookup<'a>(map: &'a Map<String, Value>, code: &str) -> Option<&'a Value> {
    map.get(code).or_else(|| {
        map.iter()
            .find(|(k, _)| lang::normalize(k).as_deref() == Some(code))
            .map(|(_, v)| v)
    })
}

fn extract_outcome(map: &Map<String, Value>, targets: &TargetLanguages) -> TranslationOutcome {
    let translations = map
        .get("translations")
        .and_then(Value::as_object)
        .unwrap_or(map);

    let detected = DETECTED_LANGUAGE_KEYS
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str));

    TranslationOutcome::from_fn(targets, |target| {
        match lookup(translations, target.as_str())
            .and_then(Value::as_str)
            .map(str::trim)
        {
            Some(text) if !text.is_empty() => LangResult::Translated(text.to_owned()),
            _ => LangResult::Failed(FailReason::NoValue),
        }
    })
    .with_detected_language(detected)
}

fn preview(raw: &str) -> String {
    raw.chars().take(RAW_PREVIEW_CHARS).collect()
}

impl<B: CompletionBackend> MultiTranslator for LlmTranslator<B> {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        targets: &'a TargetLanguages,
    ) -> BoxFuture<'a, TranslationOutcome> {
        async move {
            let instruction = build_instruction(targets, &self.style);
            let raw = match self.backend.complete(instruction, text.to_owned()).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(target: LOG_TARGET, error = %e, "primary backend call failed");
                    return TranslationOutcome::failed(targets, FailReason::BackendError);
                }
            };

            let Some(map) = parse_object(&raw) else {
                tracing::warn!(
                    target: LOG_TARGET,
                    raw = %preview(&raw),
                    "primary backend returned no parseable JSON object"
                );
                return TranslationOutcome::failed(targets, FailReason::MalformedResponse);
            };

            let outcome = extract_outcome(&map, targets);
            tracing::debug!(
                target: LOG_TARGET,
                succeeded = outcome.succeeded(),
                detected = ?outcome.detected_language(),
                "primary translation parsed"
            );
            outcome
        }
        .boxed()
    }
}
