//! Tolerant extraction of a JSON object from model output.
//!
//! Generative backends are asked for bare JSON but regularly wrap it in code
//! fences or surround it with prose. Each strategy below gets one shot at the
//! raw text; the first one that yields a JSON object wins.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

const LOG_TARGET: &str = "util::lenient_json";

static FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("valid regex"));

static OUTER_BRACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

type Strategy = fn(&str) -> Option<Map<String, Value>>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("code_fence", parse_fenced),
    ("outer_braces", parse_outer_braces),
];

/// Parse the first JSON object found in `raw`, trying progressively looser
/// strategies. Returns `None` when nothing object-shaped can be recovered.
pub fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let parsed = strategy(raw)?;
        tracing::debug!(target: LOG_TARGET, strategy = name, "parsed model output");
        Some(parsed)
    })
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn parse_direct(raw: &str) -> Option<Map<String, Value>> {
    as_object(raw)
}

fn parse_fenced(raw: &str) -> Option<Map<String, Value>> {
    FENCED
        .captures_iter(raw)
        .filter_map(|c| c.get(1))
        .find_map(|m| as_object(m.as_str()))
}

fn parse_outer_braces(raw: &str) -> Option<Map<String, Value>> {
    OUTER_BRACES.find(raw).and_then(|m| as_object(m.as_str()))
}
