mod dispatch;

use crate::config::TargetLanguages;
use crate::detect::LanguageDetector;
use crate::reply::{self, ReplyFormatter, TRANSLATION_UNAVAILABLE};
use crate::translate::{MultiTranslator, SecondaryTranslator, TranslationOutcome};
use std::sync::Arc;

pub use dispatch::{BatchSummary, ChatEvent, Dispatch, Dispatcher, ReplyError, ReplySink};

const LOG_TARGET: &str = "pipeline";

/// Which tier produced the final outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Primary(TranslationOutcome),
    Fallback(TranslationOutcome),
    /// Primary failed and there was no usable fallback.
    Exhausted,
}

/// detect -> primary -> (fallback) -> filter -> format, for one message.
#[derive(Clone)]
pub struct TranslationPipeline {
    targets: TargetLanguages,
    detector: Arc<dyn LanguageDetector>,
    primary: Arc<dyn MultiTranslator>,
    secondary: Option<SecondaryTranslator>,
    formatter: ReplyFormatter,
}

impl TranslationPipeline {
    pub fn new(
        targets: TargetLanguages,
        detector: Arc<dyn LanguageDetector>,
        primary: Arc<dyn MultiTranslator>,
        formatter: ReplyFormatter,
    ) -> Self {
        Self {
            targets,
            detector,
            primary,
            secondary: None,
            formatter,
        }
    }

    pub fn with_secondary(mut self, secondary: SecondaryTranslator) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn targets(&self) -> &TargetLanguages {
        &self.targets
    }

    /// Reply text for `text`, or `None` when the message is blank and no
    /// reply should be sent at all.
    pub async fn run(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!(target: LOG_TARGET, "blank message, nothing to do");
            return None;
        }

        let (resolution, hint) = self.resolve(text).await;
        let reply = match resolution {
            Resolution::Primary(outcome) | Resolution::Fallback(outcome) => {
                let kept = reply::filter(&outcome, hint.as_deref(), text);
                tracing::info!(
                    target: LOG_TARGET,
                    source = hint.as_deref().unwrap_or("unknown"),
                    kept = kept.len(),
                    "translation ready"
                );
                self.formatter.format(&kept)
            }
            Resolution::Exhausted => {
                tracing::error!(target: LOG_TARGET, "all translation backends failed");
                TRANSLATION_UNAVAILABLE.to_owned()
            }
        };
        Some(reply)
    }

    /// Run the translation tiers for already-trimmed, non-empty `text`.
    ///
    /// Returns the winning outcome and the source-language hint to filter
    /// with. A language reported by the translating backend itself beats the
    /// detector's guess, since it was computed in the same call.
    pub async fn resolve(&self, text: &str) -> (Resolution, Option<String>) {
        let detected = self.detector.detect(text).await;
        tracing::debug!(target: LOG_TARGET, detected = ?detected, "detection done");

        let outcome = self.primary.translate(text, &self.targets).await;
        if outcome.succeeded() {
            let hint = outcome.detected_language().map(str::to_owned).or(detected);
            return (Resolution::Primary(outcome), hint);
        }

        let Some(secondary) = &self.secondary else {
            tracing::warn!(target: LOG_TARGET, "primary translation failed, no fallback configured");
            return (Resolution::Exhausted, detected);
        };

        tracing::warn!(
            target: LOG_TARGET,
            backend = secondary.backend_name(),
            "primary translation failed, falling back"
        );
        let hint = match detected {
            Some(code) => Some(code),
            None => secondary.detect(text).await,
        };
        let outcome = secondary.translate(text, &self.targets, hint.as_deref()).await;
        if !outcome.succeeded() {
            return (Resolution::Exhausted, hint);
        }
        let hint = outcome.detected_language().map(str::to_owned).or(hint);
        (Resolution::Fallback(outcome), hint)
    }
}
