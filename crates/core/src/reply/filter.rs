use crate::lang;
use crate::reply::{FilteredReply, ReplyLine};
use crate::translate::{LangResult, TranslationOutcome};

/// Comparison key for echo detection: lower-cased alphanumerics with
/// whitespace collapsed. Punctuation, symbols and emoji drop out.
pub fn echo_key(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keep the translations worth replying with.
///
/// Dropped: failed slots, the slot for the source language itself, and
/// results that are just the input echoed back.
pub fn filter(
    outcome: &TranslationOutcome,
    source_hint: Option<&str>,
    original: &str,
) -> FilteredReply {
    let original_key = echo_key(original);
    outcome
        .slots()
        .iter()
        .filter(|slot| !source_hint.is_some_and(|src| lang::same_language(src, slot.lang.as_str())))
        .filter_map(|slot| match &slot.result {
            LangResult::Translated(text) => Some((slot, text)),
            LangResult::Failed(_) => None,
        })
        .filter(|(_, text)| echo_key(text) != original_key)
        .map(|(slot, text)| ReplyLine {
            lang: slot.lang.clone(),
            text: text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetLanguages;
    use crate::translate::FailReason;

    fn outcome(zh: LangResult, en: LangResult, id: LangResult) -> TranslationOutcome {
        let mut results = vec![zh, en, id].into_iter();
        TranslationOutcome::from_fn(&TargetLanguages::default(), |_| {
            results.next().unwrap()
        })
    }

    fn ok(s: &str) -> LangResult {
        LangResult::Translated(s.to_owned())
    }

    fn langs(reply: &FilteredReply) -> Vec<&str> {
        reply.lines().iter().map(|l| l.lang.as_str()).collect()
    }

    #[test]
    fn source_language_slot_is_dropped() {
        let out = outcome(ok("你好"), ok("Hello"), ok("Halo"));
        let reply = filter(&out, Some("en"), "Hello");
        assert_eq!(langs(&reply), vec!["zh-TW", "id"]);
    }

    #[test]
    fn chinese_source_drops_traditional_target() {
        let out = outcome(ok("你好"), ok("Hello"), ok("Halo"));
        let reply = filter(&out, Some("zh-CN"), "你好嗎");
        assert_eq!(langs(&reply), vec!["en", "id"]);
    }

    #[test]
    fn regional_hint_matches_bare_target() {
        let out = outcome(ok("你好"), ok("Hello"), ok("Halo"));
        let reply = filter(&out, Some("en-US"), "Hello");
        assert_eq!(langs(&reply), vec!["zh-TW", "id"]);
    }

    #[test]
    fn failures_are_dropped() {
        let out = outcome(
            LangResult::Failed(FailReason::NoValue),
            ok("Good morning"),
            LangResult::Failed(FailReason::BackendError),
        );
        let reply = filter(&out, None, "早安");
        assert_eq!(langs(&reply), vec!["en"]);
    }

    #[test]
    fn echoes_are_dropped() {
        let out = outcome(ok("Taipei 101!"), ok("taipei 101"), ok("Taipei  101"));
        assert!(filter(&out, None, "Taipei 101").is_empty());

        let out = outcome(ok("👍"), ok("👍👍"), ok("OK"));
        assert_eq!(langs(&filter(&out, None, "👍")), vec!["id"]);
    }

    #[test]
    fn order_follows_targets() {
        let out = outcome(ok("你好"), ok("Hi"), ok("Halo"));
        let reply = filter(&out, None, "Hei");
        assert_eq!(langs(&reply), vec!["zh-TW", "en", "id"]);
    }

    #[test]
    fn filtering_is_pure() {
        let out = outcome(ok("你好"), ok("Hello"), ok("Halo"));
        let first = filter(&out, Some("en"), "Hello");
        let second = filter(&out, Some("en"), "Hello");
        assert_eq!(first, second);
    }

    #[test]
    fn echo_key_normalization() {
        assert_eq!(echo_key("  Hello,   World! "), "hello world");
        assert_eq!(echo_key("你好！"), "你好");
        assert_eq!(echo_key("🎉🎉"), "");
    }
}
