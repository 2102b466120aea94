use crate::lang;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use url::Url;

pub const DEFAULT_TARGET_LANGS: &str = "zh-TW,en,id";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://translation.googleapis.com";
pub const DEFAULT_LINE_API_BASE_URL: &str = "https://api.line.me";
pub const DEFAULT_STYLE: &str =
    "Keep the tone natural and conversational, the way people write in a group chat.";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_TRANSLATE_API_KEY";
pub const ENV_DEEPL_API_KEY: &str = "DEEPL_API_KEY";
pub const ENV_LINE_CHANNEL_SECRET: &str = "LINE_CHANNEL_SECRET";
pub const ENV_LINE_CHANNEL_ACCESS_TOKEN: &str = "LINE_CHANNEL_ACCESS_TOKEN";
pub const ENV_TARGET_LANGS: &str = "TARGET_LANGS";
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";
pub const ENV_LLM_BASE_URL: &str = "LLM_BASE_URL";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TargetLang(pub String);

impl TargetLang {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        lang::normalize(&v)
            .map(Self)
            .ok_or(ConfigError::EmptyTargetLang)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed, ordered set of languages every message is translated into.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetLanguages(Vec<TargetLang>);

impl TargetLanguages {
    pub fn new<I, S>(codes: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut langs: Vec<TargetLang> = Vec::new();
        for code in codes {
            let lang = TargetLang::new(code)?;
            if !langs.iter().any(|l| lang::same_language(l.as_str(), lang.as_str())) {
                langs.push(lang);
            }
        }
        if langs.is_empty() {
            return Err(ConfigError::NoTargetLangs);
        }
        Ok(Self(langs))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetLang> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for TargetLanguages {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split(',').map(str::trim).filter(|c| !c.is_empty()))
    }
}

impl Default for TargetLanguages {
    fn default() -> Self {
        Self(
            ["zh-TW", "en", "id"]
                .into_iter()
                .map(|c| TargetLang(c.to_owned()))
                .collect(),
        )
    }
}

/// Decorative prefix shown in front of each translated line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageMarkers(BTreeMap<String, String>);

impl LanguageMarkers {
    pub fn with_overrides<I, S>(mut self, pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pair in pairs {
            let pair = pair.as_ref();
            let (code, marker) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidMarker(pair.to_owned()))?;
            let code =
                lang::normalize(code).ok_or_else(|| ConfigError::InvalidMarker(pair.to_owned()))?;
            let marker = marker.trim();
            if marker.is_empty() {
                return Err(ConfigError::InvalidMarker(pair.to_owned()));
            }
            self.0.insert(code, marker.to_owned());
        }
        Ok(self)
    }

    pub fn marker_for(&self, lang: &TargetLang) -> String {
        if let Some(m) = self.0.get(lang.as_str()) {
            return m.clone();
        }
        self.0
            .iter()
            .find(|(code, _)| lang::same_language(code, lang.as_str()))
            .map(|(_, m)| m.clone())
            .unwrap_or_else(|| format!("[{}]", lang.as_str()))
    }
}

impl Default for LanguageMarkers {
    fn default() -> Self {
        let defaults = [
            ("zh-TW", "🇹🇼"),
            ("en", "🇺🇸"),
            ("id", "🇮🇩"),
            ("ja", "🇯🇵"),
            ("ko", "🇰🇷"),
            ("th", "🇹🇭"),
            ("vi", "🇻🇳"),
        ];
        Self(
            defaults
                .into_iter()
                .map(|(c, m)| (c.to_owned(), m.to_owned()))
                .collect(),
        )
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v.trim().to_owned()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeys {
    pub openai: Option<ApiKey>,
    pub google: Option<ApiKey>,
    pub deepl: Option<ApiKey>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SecondaryBackend {
    #[default]
    Google,
    DeepL,
    Disabled,
}

impl FromStr for SecondaryBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "deepl" => Ok(Self::DeepL),
            "none" | "disabled" | "off" => Ok(Self::Disabled),
            other => Err(ConfigError::UnknownBackend(other.to_owned())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DetectorKind {
    #[default]
    Local,
    Google,
    Disabled,
}

impl FromStr for DetectorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "whatlang" => Ok(Self::Local),
            "google" => Ok(Self::Google),
            "none" | "disabled" | "off" => Ok(Self::Disabled),
            other => Err(ConfigError::UnknownBackend(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmConfig {
    pub api_key: ApiKey,
    pub model: String,
    pub base_url: Url,
    pub style: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineConfig {
    pub channel_secret: ApiKey,
    pub access_token: ApiKey,
    pub api_base_url: Url,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub target_langs: TargetLanguages,
    pub markers: LanguageMarkers,
    pub api_keys: ApiKeys,
    pub llm: LlmConfig,
    pub secondary: SecondaryBackend,
    pub detector: DetectorKind,
    pub google_base_url: Url,
    pub deepl_base_url: Option<Url>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target language must not be empty")]
    EmptyTargetLang,
    #[error("at least one target language is required")]
    NoTargetLangs,
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("missing required credential: set {0}")]
    MissingCredential(&'static str),
    #[error("invalid marker {0:?}, expected LANG=MARKER")]
    InvalidMarker(String),
    #[error("unknown backend {0:?}")]
    UnknownBackend(String),
    #[error("invalid url {0:?}")]
    InvalidUrl(String),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

/// Like [`resolve_api_key`], but a missing value is a startup error.
pub fn require_api_key(
    cli_value: Option<String>,
    env_key: &'static str,
    env: &impl Env,
) -> Result<ApiKey, ConfigError> {
    resolve_api_key(cli_value, env_key, env)?.ok_or(ConfigError::MissingCredential(env_key))
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|_| ConfigError::InvalidUrl(value.to_owned()))
}

/// The key needed by the chosen secondary backend, if any.
pub fn secondary_key(
    backend: SecondaryBackend,
    keys: &ApiKeys,
) -> Result<Option<ApiKey>, ConfigError> {
    match backend {
        SecondaryBackend::Google => keys
            .google
            .clone()
            .map(Some)
            .ok_or(ConfigError::MissingCredential(ENV_GOOGLE_API_KEY)),
        SecondaryBackend::DeepL => keys
            .deepl
            .clone()
            .map(Some)
            .ok_or(ConfigError::MissingCredential(ENV_DEEPL_API_KEY)),
        SecondaryBackend::Disabled => Ok(None),
    }
}
