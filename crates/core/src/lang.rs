//! Language code helpers shared by detection, translation and filtering.
//!
//! Every language code that enters the pipeline, whether from a detector or a
//! translation backend, is normalized here first. Chinese of any script or
//! region collapses to `zh-TW`, the only Chinese variant we ever translate into.

pub const CHINESE_TARGET: &str = "zh-TW";

/// Canonical form of a language code, or `None` when the input carries no
/// language information (`""`, `und`, `unknown`).
pub fn normalize(code: &str) -> Option<String> {
    let code = code.trim().replace('_', "-");
    let mut parts = code.split('-').filter(|p| !p.is_empty());
    let primary = parts.next()?.to_ascii_lowercase();

    match primary.as_str() {
        "und" | "unknown" | "auto" => return None,
        "zh" | "cmn" | "yue" => return Some(CHINESE_TARGET.to_owned()),
        _ => {}
    }

    let mut out = primary;
    for part in parts {
        out.push('-');
        if part.len() == 2 {
            out.push_str(&part.to_ascii_uppercase());
        } else {
            out.push_str(part);
        }
    }
    Some(out)
}

/// Primary subtag, lower-cased. `zh-Hant-TW` -> `zh`.
pub fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Whether two codes name the same language, ignoring region and script.
pub fn same_language(a: &str, b: &str) -> bool {
    let a = primary_subtag(a);
    !a.is_empty() && a == primary_subtag(b)
}

/// English name used when talking to the generative backend.
pub fn display_name(code: &str) -> String {
    let name = match code {
        CHINESE_TARGET => "Traditional Chinese (Taiwan)",
        _ => match primary_subtag(code).as_str() {
            "en" => "English",
            "id" => "Indonesian",
            "ja" => "Japanese",
            "ko" => "Korean",
            "th" => "Thai",
            "vi" => "Vietnamese",
            "ms" => "Malay",
            "tl" | "fil" => "Filipino",
            "fr" => "French",
            "de" => "German",
            "es" => "Spanish",
            "pt" => "Portuguese",
            "it" => "Italian",
            "ru" => "Russian",
            "ar" => "Arabic",
            "hi" => "Hindi",
            "zh" => "Chinese",
            _ => return code.to_owned(),
        },
    };
    name.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_variants_collapse_to_traditional_target() {
        for code in ["zh", "zh-CN", "zh_cn", "ZH-Hans", "zh-TW", "zh-Hant-HK", "cmn"] {
            assert_eq!(normalize(code).as_deref(), Some("zh-TW"), "{code}");
        }
    }

    #[test]
    fn region_is_upper_cased() {
        assert_eq!(normalize("EN_us").as_deref(), Some("en-US"));
        assert_eq!(normalize(" id ").as_deref(), Some("id"));
    }

    #[test]
    fn no_language_information() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("und"), None);
        assert_eq!(normalize("unknown"), None);
    }

    #[test]
    fn same_language_matches_by_prefix() {
        assert!(same_language("en", "en-US"));
        assert!(same_language("EN-gb", "en"));
        assert!(same_language("zh-TW", "zh"));
        assert!(!same_language("en", "id"));
        assert!(!same_language("", ""));
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("zh-TW"), "Traditional Chinese (Taiwan)");
        assert_eq!(display_name("en-US"), "English");
        assert_eq!(display_name("xx"), "xx");
    }
}
