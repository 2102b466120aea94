mod deepl;
mod google;
mod llm;
mod openai;
mod secondary;

use crate::config::{TargetLang, TargetLanguages};
use crate::lang;
use crate::util::is_http_retryable;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use deepl::DeepLTranslator;
pub use google::GoogleTranslator;
pub use llm::{build_instruction, LlmTranslator};
pub use openai::OpenAiChatBackend;
pub use secondary::SecondaryTranslator;

/// One translated string from a single-target backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub detected_source_lang: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailReason {
    /// The backend answered but had nothing usable for this language.
    NoValue,
    /// The call for this language failed outright.
    BackendError,
    /// The whole response could not be parsed.
    MalformedResponse,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoValue => "no-value",
            Self::BackendError => "backend-error",
            Self::MalformedResponse => "malformed-response",
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LangResult {
    Translated(String),
    Failed(FailReason),
}

impl LangResult {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Translated(t) => Some(t),
            Self::Failed(_) => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageSlot {
    pub lang: TargetLang,
    pub result: LangResult,
}

/// Per-language results of one translation attempt.
///
/// There is always exactly one slot per configured target language, in
/// configuration order, so consumers can walk the full target set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslationOutcome {
    slots: Vec<LanguageSlot>,
    detected_language: Option<String>,
}

impl TranslationOutcome {
    pub fn from_fn(
        targets: &TargetLanguages,
        mut f: impl FnMut(&TargetLang) -> LangResult,
    ) -> Self {
        Self {
            slots: targets
                .iter()
                .map(|lang| LanguageSlot {
                    lang: lang.clone(),
                    result: f(lang),
                })
                .collect(),
            detected_language: None,
        }
    }

    /// Build from `(language, result)` pairs. Targets without a pair are
    /// recorded as [`FailReason::NoValue`]; pairs for other languages are
    /// ignored.
    pub fn from_pairs(
        targets: &TargetLanguages,
        pairs: impl IntoIterator<Item = (TargetLang, LangResult)>,
    ) -> Self {
        let mut pairs: Vec<_> = pairs.into_iter().collect();
        Self::from_fn(targets, |lang| {
            pairs
                .iter()
                .position(|(l, _)| l == lang)
                .map(|i| pairs.swap_remove(i).1)
                .unwrap_or(LangResult::Failed(FailReason::NoValue))
        })
    }

    /// Every target failed for the same reason.
    pub fn failed(targets: &TargetLanguages, reason: FailReason) -> Self {
        Self::from_fn(targets, |_| LangResult::Failed(reason))
    }

    pub fn with_detected_language(mut self, code: Option<&str>) -> Self {
        self.detected_language = code.and_then(lang::normalize);
        self
    }

    /// At least one target language produced a usable value.
    pub fn succeeded(&self) -> bool {
        self.slots
            .iter()
            .any(|s| matches!(s.result, LangResult::Translated(_)))
    }

    pub fn slots(&self) -> &[LanguageSlot] {
        &self.slots
    }

    pub fn get(&self, lang: &str) -> Option<&LangResult> {
        self.slots
            .iter()
            .find(|s| s.lang.as_str() == lang)
            .map(|s| &s.result)
    }

    /// Source language as reported by the backend itself, normalized.
    pub fn detected_language(&self) -> Option<&str> {
        self.detected_language.as_deref()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TranslateError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TranslateError {
    /// Worth another attempt against the same backend.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => is_http_retryable(*status),
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Turn a non-2xx response into [`TranslateError::Http`].
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, TranslateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(TranslateError::Http {
        status: status.as_u16(),
        body,
    })
}

/// A deterministic backend that translates into one language per call.
pub trait Translator: Send + Sync {
    fn name(&self) -> &'static str;

    fn translate(
        &self,
        text: String,
        target: TargetLang,
        source_hint: Option<String>,
    ) -> BoxFuture<'_, Result<Translation, TranslateError>>;

    /// Backends without a detection endpoint report nothing.
    fn detect(&self, _text: String) -> BoxFuture<'_, Result<Option<String>, TranslateError>> {
        async { Ok(None) }.boxed()
    }
}

/// A generative text backend: instruction plus user text in, free text out.
pub trait CompletionBackend: Send + Sync {
    fn complete(
        &self,
        instruction: String,
        text: String,
    ) -> BoxFuture<'_, Result<String, TranslateError>>;
}

/// Translates into the whole target set in one go. Never fails: problems are
/// recorded per language in the outcome.
pub trait MultiTranslator: Send + Sync {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        targets: &'a TargetLanguages,
    ) -> BoxFuture<'a, TranslationOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> TargetLanguages {
        TargetLanguages::default()
    }

    #[test]
    fn outcome_has_one_slot_per_target_in_order() {
        let outcome = TranslationOutcome::from_pairs(
            &targets(),
            vec![
                (
                    TargetLang::new("id").unwrap(),
                    LangResult::Translated("Halo".into()),
                ),
                (
                    TargetLang::new("fr").unwrap(),
                    LangResult::Translated("Bonjour".into()),
                ),
            ],
        );

        let langs: Vec<_> = outcome.slots().iter().map(|s| s.lang.as_str()).collect();
        assert_eq!(langs, vec!["zh-TW", "en", "id"]);
        assert_eq!(
            outcome.get("zh-TW"),
            Some(&LangResult::Failed(FailReason::NoValue))
        );
        assert_eq!(outcome.get("id").and_then(LangResult::text), Some("Halo"));
        assert_eq!(outcome.get("fr"), None);
        assert!(outcome.succeeded());
    }

    #[test]
    fn all_failed_is_not_success() {
        let outcome = TranslationOutcome::failed(&targets(), FailReason::BackendError);
        assert_eq!(outcome.slots().len(), 3);
        assert!(!outcome.succeeded());
    }

    #[test]
    fn detected_language_is_normalized() {
        let outcome = TranslationOutcome::failed(&targets(), FailReason::NoValue)
            .with_detected_language(Some("zh-CN"));
        assert_eq!(outcome.detected_language(), Some("zh-TW"));

        let outcome = outcome.with_detected_language(Some("und"));
        assert_eq!(outcome.detected_language(), None);
    }

    #[test]
    fn fail_reason_tags() {
        assert_eq!(FailReason::NoValue.to_string(), "no-value");
        assert_eq!(FailReason::BackendError.to_string(), "backend-error");
    }

    #[test]
    fn transient_classification() {
        let overloaded = TranslateError::Http {
            status: 529,
            body: "overloaded".into(),
        };
        let unauthorized = TranslateError::Http {
            status: 401,
            body: String::new(),
        };
        assert!(overloaded.is_transient());
        assert!(!unauthorized.is_transient());
        assert!(!TranslateError::InvalidResponse("x".into()).is_transient());
    }
}
