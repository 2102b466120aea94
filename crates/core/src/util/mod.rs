pub mod lenient_json;
pub mod retry;

pub use lenient_json::parse_object;
pub use retry::{is_http_retryable, retry_with_backoff, RetryPolicy};
