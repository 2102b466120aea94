use crate::config::{ApiKey, LlmConfig};
use crate::translate::{ensure_success, CompletionBackend, TranslateError};
use crate::util::{retry_with_backoff, RetryPolicy};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const LOG_TARGET: &str = "translate::openai";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct OpenAiChatBackend {
    client: Client,
    api_key: ApiKey,
    model: String,
    endpoint: String,
    retry: RetryPolicy,
    timeout: Duration,
}

impl OpenAiChatBackend {
    pub fn new(config: &LlmConfig) -> Result<Self, TranslateError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.as_str().trim_end_matches('/')
            ),
            retry: RetryPolicy::default(),
            timeout: REQUEST_TIMEOUT,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-attempt deadline; each retry gets a fresh one.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn complete_once(&self, instruction: &str, text: &str) -> Result<String, TranslateError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.3,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: ChatResponse = response.json().await.map_err(|e| {
            TranslateError::InvalidResponse(format!("failed to parse chat response: {e}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| TranslateError::InvalidResponse("no content in chat response".into()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl CompletionBackend for OpenAiChatBackend {
    fn complete(
        &self,
        instruction: String,
        text: String,
    ) -> BoxFuture<'_, Result<String, TranslateError>> {
        async move {
            let content = retry_with_backoff(
                &self.retry,
                || self.complete_once(&instruction, &text),
                TranslateError::is_transient,
            )
            .await?;
            tracing::debug!(target: LOG_TARGET, model = %self.model, chars = content.len(), "completion received");
            Ok(content)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_url, DEFAULT_LLM_MODEL, DEFAULT_STYLE};
    use crate::config::TargetLanguages;
    use crate::translate::{FailReason, LangResult, LlmTranslator, MultiTranslator};
    use mockito::{Matcher, Server};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn backend_for(server: &Server) -> OpenAiChatBackend {
        let config = LlmConfig {
            api_key: ApiKey::new("sk-test").unwrap(),
            model: DEFAULT_LLM_MODEL.to_owned(),
            base_url: parse_url(&format!("{}/v1", server.url())).unwrap(),
            style: DEFAULT_STYLE.to_owned(),
        };
        OpenAiChatBackend::new(&config)
            .unwrap()
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": DEFAULT_LLM_MODEL,
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "system", "content": "translate"},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"{\"en\":\"Hello\"}"}}]}"#)
            .create_async()
            .await;

        let out = backend_for(&server)
            .complete("translate".into(), "Hello".into())
            .await
            .unwrap();

        assert_eq!(out, r#"{"en":"Hello"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retries_overload_then_gives_up() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(529)
            .with_body("overloaded")
            .expect(2)
            .create_async()
            .await;

        let err = backend_for(&server)
            .complete("translate".into(), "Hello".into())
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::Http { status: 529, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let err = backend_for(&server)
            .complete("translate".into(), "Hello".into())
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::Http { status: 401, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = backend_for(&server)
            .complete("translate".into(), "Hello".into())
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::InvalidResponse(_)));
    }

    /// Accepts connections and never answers. Returns the base URL and the
    /// number of connections seen so far.
    async fn silent_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                open.push(socket);
            }
        });
        (format!("http://{addr}/v1"), accepted)
    }

    fn stalled_backend(base_url: &str) -> OpenAiChatBackend {
        let config = LlmConfig {
            api_key: ApiKey::new("sk-test").unwrap(),
            model: DEFAULT_LLM_MODEL.to_owned(),
            base_url: parse_url(base_url).unwrap(),
            style: DEFAULT_STYLE.to_owned(),
        };
        OpenAiChatBackend::new(&config)
            .unwrap()
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
            .with_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn timeouts_are_retried_then_reported() {
        let (base_url, accepted) = silent_server().await;

        let err = stalled_backend(&base_url)
            .complete("translate".into(), "Hello".into())
            .await
            .unwrap_err();

        match &err {
            TranslateError::Network(e) => assert!(e.is_timeout(), "{e}"),
            other => panic!("expected a network error, got {other}"),
        }
        assert!(err.is_transient());
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = stalled_backend(&format!("http://{addr}/v1"))
            .complete("translate".into(), "Hello".into())
            .await
            .unwrap_err();

        assert!(matches!(&err, TranslateError::Network(e) if e.is_connect()));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn timed_out_primary_fails_every_language() {
        let (base_url, _accepted) = silent_server().await;
        let targets = TargetLanguages::default();
        let translator = LlmTranslator::new(stalled_backend(&base_url), "");

        let outcome = translator.translate("Hello", &targets).await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.slots().len(), targets.len());
        assert!(outcome
            .slots()
            .iter()
            .all(|s| s.result == LangResult::Failed(FailReason::BackendError)));
    }
}
