mod local;

use crate::lang;
use crate::translate::Translator;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

pub use local::WhatlangDetector;

const LOG_TARGET: &str = "detect";

/// Best-effort source language guess. Detection is advisory: implementations
/// swallow their own errors and answer `None` when unsure.
pub trait LanguageDetector: Send + Sync {
    fn detect<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Option<String>>;
}

/// Uses a translation backend's own detection endpoint.
#[derive(Clone)]
pub struct BackendDetector {
    backend: Arc<dyn Translator>,
}

impl BackendDetector {
    pub fn new(backend: Arc<dyn Translator>) -> Self {
        Self { backend }
    }
}

impl LanguageDetector for BackendDetector {
    fn detect<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Option<String>> {
        async move {
            match self.backend.detect(text.to_owned()).await {
                Ok(code) => code.as_deref().and_then(lang::normalize),
                Err(e) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        backend = self.backend.name(),
                        error = %e,
                        "language detection failed"
                    );
                    None
                }
            }
        }
        .boxed()
    }
}

/// Never knows. Useful when detection is switched off.
#[derive(Clone, Debug, Default)]
pub struct NoDetector;

impl LanguageDetector for NoDetector {
    fn detect<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Option<String>> {
        async { None }.boxed()
    }
}
