use crate::config::TargetLanguages;
use crate::lang;
use crate::translate::{FailReason, LangResult, TranslationOutcome, Translator};
use std::sync::Arc;

const LOG_TARGET: &str = "translate::secondary";

/// Fallback tier: one call per target language on a deterministic backend.
#[derive(Clone)]
pub struct SecondaryTranslator {
    backend: Arc<dyn Translator>,
}

impl SecondaryTranslator {
    pub fn new(backend: Arc<dyn Translator>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Languages are translated one after another. A target that is the same
    /// language as `source_hint` keeps the original text and costs no call.
    pub async fn translate(
        &self,
        text: &str,
        targets: &TargetLanguages,
        source_hint: Option<&str>,
    ) -> TranslationOutcome {
        let mut pairs = Vec::with_capacity(targets.len());
        let mut detected: Option<String> = None;

        for target in targets.iter() {
            if source_hint.is_some_and(|src| lang::same_language(src, target.as_str())) {
                pairs.push((target.clone(), LangResult::Translated(text.to_owned())));
                continue;
            }

            let result = match self
                .backend
                .translate(text.to_owned(), target.clone(), source_hint.map(str::to_owned))
                .await
            {
                Ok(t) if !t.text.trim().is_empty() => {
                    if detected.is_none() {
                        detected = t.detected_source_lang;
                    }
                    LangResult::Translated(t.text.trim().to_owned())
                }
                Ok(_) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        backend = self.backend.name(),
                        lang = %target,
                        "secondary backend returned an empty translation"
                    );
                    LangResult::Failed(FailReason::BackendError)
                }
                Err(e) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        backend = self.backend.name(),
                        lang = %target,
                        error = %e,
                        "secondary translation failed"
                    );
                    LangResult::Failed(FailReason::BackendError)
                }
            };
            pairs.push((target.clone(), result));
        }

        TranslationOutcome::from_pairs(targets, pairs).with_detected_language(detected.as_deref())
    }

    /// Source language according to the backend, if it can tell.
    pub async fn detect(&self, text: &str) -> Option<String> {
        match self.backend.detect(text.to_owned()).await {
            Ok(code) => code.as_deref().and_then(lang::normalize),
            Err(e) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    backend = self.backend.name(),
                    error = %e,
                    "secondary detection failed"
                );
                None
            }
        }
    }
}
