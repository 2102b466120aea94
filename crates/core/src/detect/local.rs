use crate::detect::LanguageDetector;
use crate::lang;
use futures::future::BoxFuture;
use futures::FutureExt;
use whatlang::Lang;

/// Offline trigram classifier. Short or ambiguous text usually comes back
/// unreliable, which we report as unknown.
#[derive(Clone, Debug, Default)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect_now(&self, text: &str) -> Option<String> {
        let info = whatlang::detect(text)?;
        if !info.is_reliable() {
            return None;
        }
        lang::normalize(iso639_1(info.lang()))
    }
}

/// whatlang speaks ISO 639-3; the rest of the pipeline speaks 639-1.
fn iso639_1(lang: Lang) -> &'static str {
    match lang {
        Lang::Afr => "af",
        Lang::Aka => "ak",
        Lang::Amh => "am",
        Lang::Ara => "ar",
        Lang::Aze => "az",
        Lang::Bel => "be",
        Lang::Ben => "bn",
        Lang::Bul => "bg",
        Lang::Cat => "ca",
        Lang::Ces => "cs",
        Lang::Cmn => "zh",
        Lang::Dan => "da",
        Lang::Deu => "de",
        Lang::Ell => "el",
        Lang::Eng => "en",
        Lang::Epo => "eo",
        Lang::Est => "et",
        Lang::Fin => "fi",
        Lang::Fra => "fr",
        Lang::Guj => "gu",
        Lang::Heb => "he",
        Lang::Hin => "hi",
        Lang::Hrv => "hr",
        Lang::Hun => "hu",
        Lang::Hye => "hy",
        Lang::Ind => "id",
        Lang::Ita => "it",
        Lang::Jav => "jv",
        Lang::Jpn => "ja",
        Lang::Kan => "kn",
        Lang::Kat => "ka",
        Lang::Khm => "km",
        Lang::Kor => "ko",
        Lang::Lat => "la",
        Lang::Lav => "lv",
        Lang::Lit => "lt",
        Lang::Mal => "ml",
        Lang::Mar => "mr",
        Lang::Mkd => "mk",
        Lang::Mya => "my",
        Lang::Nep => "ne",
        Lang::Nld => "nl",
        Lang::Nob => "nb",
        Lang::Ori => "or",
        Lang::Pan => "pa",
        Lang::Pes => "fa",
        Lang::Pol => "pl",
        Lang::Por => "pt",
        Lang::Ron => "ro",
        Lang::Rus => "ru",
        Lang::Sin => "si",
        Lang::Slk => "sk",
        Lang::Slv => "sl",
        Lang::Sna => "sn",
        Lang::Spa => "es",
        Lang::Srp => "sr",
        Lang::Swe => "sv",
        Lang::Tam => "ta",
        Lang::Tel => "te",
        Lang::Tgl => "tl",
        Lang::Tha => "th",
        Lang::Tuk => "tk",
        Lang::Tur => "tr",
        Lang::Ukr => "uk",
        Lang::Urd => "ur",
        Lang::Uzb => "uz",
        Lang::Vie => "vi",
        Lang::Yid => "yi",
        Lang::Zul => "zu",
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Option<String>> {
        let detected = self.detect_now(text);
        async move { detected }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWEDISH: &str = "Vädret är väldigt fint idag, så vi tänker gå till parken \
        tillsammans efter lunchen och sedan fika med våra vänner i stan.";

    #[test]
    fn english_sentence() {
        let d = WhatlangDetector::new();
        assert_eq!(
            d.detect_now("The weather is really nice today, so we are going to walk to the park together after lunch.")
                .as_deref(),
            Some("en")
        );
    }

    #[test]
    fn chinese_maps_to_traditional_target() {
        let d = WhatlangDetector::new();
        assert_eq!(
            d.detect_now("今天天氣很好，我們吃完午餐以後一起去公園散步吧。").as_deref(),
            Some("zh-TW")
        );
    }

    #[test]
    fn digits_are_unknown() {
        assert_eq!(WhatlangDetector::new().detect_now("12345"), None);
    }

    #[test]
    fn swedish_sentence() {
        let d = WhatlangDetector::new();
        assert_eq!(d.detect_now(SWEDISH).as_deref(), Some("sv"));
    }

    #[test]
    fn every_language_maps_to_a_two_letter_code() {
        for &l in Lang::all() {
            let code = iso639_1(l);
            assert_eq!(code.len(), 2, "{l:?}");
            assert!(lang::normalize(code).is_some(), "{l:?}");
        }
        assert_eq!(iso639_1(Lang::Nob), "nb");
        assert_eq!(iso639_1(Lang::Pes), "fa");
    }
}
