use crate::config::LineConfig;
use crate::pipeline::{ChatEvent, ReplyError, ReplySink};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use futures::FutureExt;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const LOG_TARGET: &str = "webhook::line";

pub const SIGNATURE_HEADER: &str = "x-line-signature";
/// Longest text message the platform accepts, in characters.
pub const MAX_TEXT_CHARS: usize = 5000;
/// Reply token the console sends when verifying the webhook URL.
const VERIFICATION_REPLY_TOKEN: &str = "00000000000000000000000000000000";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub reply_token: Option<String>,
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

impl WebhookBody {
    /// Text messages we can reply to. Everything else (follows, stickers,
    /// images, console verification pings) is dropped here.
    pub fn into_chat_events(self) -> Vec<ChatEvent> {
        self.events
            .into_iter()
            .filter_map(|event| {
                let chat = event.to_chat_event();
                if chat.is_none() {
                    tracing::debug!(target: LOG_TARGET, kind = %event.kind, "ignoring event");
                }
                chat
            })
            .collect()
    }
}

impl WebhookEvent {
    fn to_chat_event(&self) -> Option<ChatEvent> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref().filter(|m| m.kind == "text")?;
        let reply_token = self
            .reply_token
            .as_deref()
            .filter(|t| !t.is_empty() && *t != VERIFICATION_REPLY_TOKEN)?;
        Some(ChatEvent {
            reply_token: reply_token.to_owned(),
            text: message.text.clone().unwrap_or_default(),
        })
    }
}

/// Base64 HMAC-SHA256 of `body` keyed with the channel secret.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Constant-time check of the signature header against the raw body.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Cut `text` to the platform limit on a character boundary.
pub fn truncate_for_platform(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// Sends replies through the Messaging API reply endpoint.
#[derive(Clone)]
pub struct LineReplyClient {
    client: Client,
    access_token: String,
    endpoint: String,
}

impl LineReplyClient {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            client: Client::new(),
            access_token: config.access_token.expose().to_owned(),
            endpoint: format!(
                "{}/v2/bot/message/reply",
                config.api_base_url.as_str().trim_end_matches('/')
            ),
        }
    }
}

impl ReplySink for LineReplyClient {
    fn reply<'a>(
        &'a self,
        reply_token: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, Result<(), ReplyError>> {
        async move {
            let request = ReplyRequest {
                reply_token,
                messages: [TextMessage {
                    kind: "text",
                    text: truncate_for_platform(text),
                }],
            };

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.access_token)
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ReplyError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
            tracing::debug!(target: LOG_TARGET, "reply delivered");
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_url, ApiKey};
    use mockito::{Matcher, Server};

    const BODY: &str = r#"{
        "destination": "U0000",
        "events": [
            {"type": "message", "replyToken": "r1", "message": {"type": "text", "id": "1", "text": "Hello"}},
            {"type": "message", "replyToken": "r2", "message": {"type": "sticker", "id": "2"}},
            {"type": "follow", "replyToken": "r3"},
            {"type": "message", "replyToken": "00000000000000000000000000000000", "message": {"type": "text", "text": "ping"}},
            {"type": "unsend"}
        ]
    }"#;

    #[test]
    fn only_text_messages_become_chat_events() {
        let body: WebhookBody = serde_json::from_str(BODY).unwrap();
        assert_eq!(body.destination, "U0000");
        assert_eq!(
            body.into_chat_events(),
            vec![ChatEvent {
                reply_token: "r1".into(),
                text: "Hello".into(),
            }]
        );
    }

    #[test]
    fn empty_body_has_no_events() {
        let body: WebhookBody = serde_json::from_str("{}").unwrap();
        assert!(body.into_chat_events().is_empty());
    }

    #[test]
    fn signature_round_trip_and_tamper() {
        let sig = sign("secret", BODY.as_bytes());
        assert!(verify_signature("secret", BODY.as_bytes(), &sig));
        assert!(!verify_signature("other", BODY.as_bytes(), &sig));
        assert!(!verify_signature("secret", b"{}", &sig));
        assert!(!verify_signature("secret", BODY.as_bytes(), "not base64!"));
    }

    #[test]
    fn known_signature() {
        // echo -n '{}' | openssl dgst -sha256 -hmac secret -binary | base64
        assert_eq!(
            sign("secret", b"{}"),
            "dzJZAsrKgS3CWXM6rNBGtzgXNyx3e42VtAJkdHRRbhM="
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "字".repeat(MAX_TEXT_CHARS + 10);
        let cut = truncate_for_platform(&long);
        assert_eq!(cut.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(truncate_for_platform("short"), "short");
    }

    #[tokio::test]
    async fn reply_posts_to_messaging_api() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/bot/message/reply")
            .match_header("authorization", "Bearer token")
            .match_body(Matcher::Json(serde_json::json!({
                "replyToken": "r1",
                "messages": [{"type": "text", "text": "🇮🇩 Halo"}]
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = LineReplyClient::new(&LineConfig {
            channel_secret: ApiKey::new("secret").unwrap(),
            access_token: ApiKey::new("token").unwrap(),
            api_base_url: parse_url(&server.url()).unwrap(),
        });
        client.reply("r1", "🇮🇩 Halo").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_reply_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/bot/message/reply")
            .with_status(400)
            .with_body(r#"{"message":"Invalid reply token"}"#)
            .create_async()
            .await;

        let client = LineReplyClient::new(&LineConfig {
            channel_secret: ApiKey::new("secret").unwrap(),
            access_token: ApiKey::new("token").unwrap(),
            api_base_url: parse_url(&server.url()).unwrap(),
        });
        let err = client.reply("r1", "hi").await.unwrap_err();
        assert!(matches!(err, ReplyError::Http { status: 400, .. }));
    }
}
