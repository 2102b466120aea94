use crate::pipeline::TranslationPipeline;
use futures::future::BoxFuture;
use std::sync::Arc;

const LOG_TARGET: &str = "pipeline::dispatch";

/// A text message that can be answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEvent {
    pub reply_token: String,
    pub text: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ReplyError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("messaging api returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

/// Outbound side of the messaging platform.
pub trait ReplySink: Send + Sync {
    fn reply<'a>(&'a self, reply_token: &'a str, text: &'a str)
        -> BoxFuture<'a, Result<(), ReplyError>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Blank message, nothing sent.
    Skipped,
    Replied,
    DeliveryFailed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub replied: usize,
    pub skipped: usize,
    pub delivery_failed: usize,
    pub crashed: usize,
}

/// Runs the pipeline for incoming events and sends exactly one reply per
/// non-blank message.
#[derive(Clone)]
pub struct Dispatcher {
    pipeline: Arc<TranslationPipeline>,
    sink: Arc<dyn ReplySink>,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<TranslationPipeline>, sink: Arc<dyn ReplySink>) -> Self {
        Self { pipeline, sink }
    }

    pub async fn handle(&self, event: ChatEvent) -> Dispatch {
        let Some(reply) = self.pipeline.run(&event.text).await else {
            return Dispatch::Skipped;
        };

        match self.sink.reply(&event.reply_token, &reply).await {
            Ok(()) => Dispatch::Replied,
            Err(e) => {
                tracing::error!(target: LOG_TARGET, error = %e, "failed to deliver reply");
                Dispatch::DeliveryFailed
            }
        }
    }

    /// Every event gets its own task; the batch is joined only to log a
    /// summary. No ordering between replies is implied.
    pub async fn handle_batch(&self, events: Vec<ChatEvent>) -> BatchSummary {
        let handles: Vec<_> = events
            .into_iter()
            .map(|event| {
                let this = self.clone();
                tokio::spawn(async move { this.handle(event).await })
            })
            .collect();

        let mut summary = BatchSummary::default();
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Dispatch::Replied) => summary.replied += 1,
                Ok(Dispatch::Skipped) => summary.skipped += 1,
                Ok(Dispatch::DeliveryFailed) => summary.delivery_failed += 1,
                Err(e) => {
                    tracing::error!(target: LOG_TARGET, error = %e, "event task crashed");
                    summary.crashed += 1;
                }
            }
        }

        tracing::info!(
            target: LOG_TARGET,
            replied = summary.replied,
            skipped = summary.skipped,
            delivery_failed = summary.delivery_failed,
            crashed = summary.crashed,
            "batch handled"
        );
        summary
    }
}
