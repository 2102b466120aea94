//! Messaging-platform transport: inbound webhook and outbound replies.

pub mod line;
mod server;

pub use line::{LineReplyClient, WebhookBody};
pub use server::{router, serve, AppState};
