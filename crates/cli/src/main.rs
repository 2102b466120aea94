#![deny(warnings)]

use anyhow::Context;
use chat_translator_core::config::{
    parse_url, require_api_key, resolve_api_key, resolve_string_with_default, secondary_key,
    ApiKeys, AppConfig, ConfigError, DetectorKind, Env, LanguageMarkers, LineConfig, LlmConfig,
    SecondaryBackend, StdEnv, TargetLanguages, DEFAULT_GOOGLE_BASE_URL, DEFAULT_HOST,
    DEFAULT_LINE_API_BASE_URL, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, DEFAULT_PORT,
    DEFAULT_STYLE, DEFAULT_TARGET_LANGS, ENV_DEEPL_API_KEY, ENV_GOOGLE_API_KEY,
    ENV_HOST, ENV_LINE_CHANNEL_ACCESS_TOKEN, ENV_LINE_CHANNEL_SECRET, ENV_LLM_BASE_URL,
    ENV_LLM_MODEL, ENV_OPENAI_API_KEY, ENV_PORT, ENV_TARGET_LANGS,
};
use chat_translator_core::detect::{
    BackendDetector, LanguageDetector, NoDetector, WhatlangDetector,
};
use chat_translator_core::pipeline::{Dispatcher, TranslationPipeline};
use chat_translator_core::reply::ReplyFormatter;
use chat_translator_core::translate::{
    DeepLTranslator, GoogleTranslator, LlmTranslator, OpenAiChatBackend, SecondaryTranslator,
    Translator,
};
use chat_translator_core::webhook::{self, AppState, LineReplyClient};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chat-translator")]
#[command(about = "Chat bot that replies to every message with its translations")]
struct Args {
    /// Comma-separated target languages, in reply order
    #[arg(long, global = true)]
    target_langs: Option<String>,

    /// Display marker override, e.g. `--marker id=🇮🇩` (repeatable)
    #[arg(long = "marker", global = true)]
    markers: Vec<String>,

    /// Fallback backend: google, deepl or none
    #[arg(long, global = true, default_value = "google")]
    secondary: SecondaryBackend,

    /// Language detector: local, google or none
    #[arg(long, global = true, default_value = "local")]
    detector: DetectorKind,

    #[arg(long, global = true, env = ENV_LLM_MODEL, default_value = DEFAULT_LLM_MODEL)]
    llm_model: String,

    #[arg(long, global = true, env = ENV_LLM_BASE_URL, default_value = DEFAULT_LLM_BASE_URL)]
    llm_base_url: String,

    /// Extra style instruction for the generative translator
    #[arg(long, global = true, default_value = DEFAULT_STYLE)]
    style: String,

    #[arg(long, global = true)]
    openai_api_key: Option<String>,

    #[arg(long, global = true)]
    google_api_key: Option<String>,

    #[arg(long, global = true)]
    deepl_api_key: Option<String>,

    #[arg(long, global = true, default_value = DEFAULT_GOOGLE_BASE_URL)]
    google_base_url: String,

    #[arg(long, global = true)]
    deepl_base_url: Option<String>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook server
    Serve(ServeArgs),
    /// Translate one message and print the reply that would be sent
    Translate {
        text: String,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    #[arg(long, env = ENV_HOST, default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, env = ENV_PORT, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long)]
    line_channel_secret: Option<String>,

    #[arg(long)]
    line_channel_access_token: Option<String>,

    #[arg(long, default_value = DEFAULT_LINE_API_BASE_URL)]
    line_api_base_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(&args, &env)?;

    tracing::info!(
        targets = ?cfg.target_langs.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        model = %cfg.llm.model,
        secondary = ?cfg.secondary,
        detector = ?cfg.detector,
        "config loaded"
    );

    let pipeline = Arc::new(build_pipeline(&cfg)?);

    match args.command {
        Command::Serve(serve) => run_server(pipeline, serve, &env).await,
        Command::Translate { text } => {
            match pipeline.run(&text).await {
                Some(reply) => println!("{reply}"),
                None => tracing::warn!("nothing to translate: input is blank"),
            }
            Ok(())
        }
    }
}

async fn run_server(
    pipeline: Arc<TranslationPipeline>,
    args: ServeArgs,
    env: &impl Env,
) -> anyhow::Result<()> {
    let line = LineConfig {
        channel_secret: require_api_key(args.line_channel_secret, ENV_LINE_CHANNEL_SECRET, env)?,
        access_token: require_api_key(
            args.line_channel_access_token,
            ENV_LINE_CHANNEL_ACCESS_TOKEN,
            env,
        )?,
        api_base_url: parse_url(&args.line_api_base_url)?,
    };

    let sink = Arc::new(LineReplyClient::new(&line));
    let dispatcher = Dispatcher::new(pipeline, sink);
    let state = AppState::new(dispatcher, line.channel_secret);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    webhook::serve(listener, state).await.context("server error")?;
    Ok(())
}

fn build_pipeline(cfg: &AppConfig) -> anyhow::Result<TranslationPipeline> {
    let chat = OpenAiChatBackend::new(&cfg.llm).context("failed to build LLM client")?;
    let primary = Arc::new(LlmTranslator::new(chat, cfg.llm.style.clone()));

    let google = cfg
        .api_keys
        .google
        .clone()
        .map(|key| Arc::new(GoogleTranslator::new(key, &cfg.google_base_url)) as Arc<dyn Translator>);

    let secondary: Option<Arc<dyn Translator>> = match secondary_key(cfg.secondary, &cfg.api_keys)? {
        None => None,
        Some(key) => match cfg.secondary {
            SecondaryBackend::DeepL => Some(Arc::new(DeepLTranslator::new(
                key,
                cfg.deepl_base_url.as_ref(),
            )) as Arc<dyn Translator>),
            _ => google.clone(),
        },
    };

    let detector: Arc<dyn LanguageDetector> = match cfg.detector {
        DetectorKind::Local => Arc::new(WhatlangDetector::new()),
        DetectorKind::Disabled => Arc::new(NoDetector),
        DetectorKind::Google => Arc::new(BackendDetector::new(google.clone().ok_or_else(
            || anyhow::anyhow!("the google detector needs {ENV_GOOGLE_API_KEY}"),
        )?)),
    };

    let pipeline = TranslationPipeline::new(
        cfg.target_langs.clone(),
        detector,
        primary,
        ReplyFormatter::new(cfg.markers.clone()),
    );
    Ok(match secondary {
        Some(backend) => pipeline.with_secondary(SecondaryTranslator::new(backend)),
        None => pipeline,
    })
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(args: &Args, env: &impl Env) -> anyhow::Result<AppConfig> {
    let target_langs: TargetLanguages = resolve_string_with_default(
        args.target_langs.clone(),
        ENV_TARGET_LANGS,
        env,
        DEFAULT_TARGET_LANGS,
    )
    .parse()?;
    let markers = LanguageMarkers::default().with_overrides(&args.markers)?;

    let api_keys = ApiKeys {
        openai: resolve_api_key(args.openai_api_key.clone(), ENV_OPENAI_API_KEY, env)?,
        google: resolve_api_key(args.google_api_key.clone(), ENV_GOOGLE_API_KEY, env)?,
        deepl: resolve_api_key(args.deepl_api_key.clone(), ENV_DEEPL_API_KEY, env)?,
    };

    let llm = LlmConfig {
        api_key: api_keys
            .openai
            .clone()
            .ok_or(ConfigError::MissingCredential(ENV_OPENAI_API_KEY))?,
        model: args.llm_model.clone(),
        base_url: parse_url(&args.llm_base_url)?,
        style: args.style.clone(),
    };

    // Fail at startup, not on the first fallback.
    secondary_key(args.secondary, &api_keys)?;

    Ok(AppConfig {
        target_langs,
        markers,
        api_keys,
        llm,
        secondary: args.secondary,
        detector: args.detector,
        google_base_url: parse_url(&args.google_base_url)?,
        deepl_base_url: args.deepl_base_url.as_deref().map(parse_url).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_translator_core::config::MapEnv;
    use clap::CommandFactory;
    use std::ffi::OsStr;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("chat-translator").chain(argv.iter().copied()))
    }

    #[test]
    fn builds_config_from_env() {
        let env = MapEnv::default()
            .with_var(ENV_OPENAI_API_KEY, "sk")
            .with_var(ENV_GOOGLE_API_KEY, "g")
            .with_var(ENV_TARGET_LANGS, "en,ja");
        let cfg = build_config(&parse(&["translate", "hi"]), &env).unwrap();

        let langs: Vec<_> = cfg.target_langs.iter().map(|t| t.as_str()).collect();
        assert_eq!(langs, vec!["en", "ja"]);
        assert_eq!(cfg.llm.api_key.expose(), "sk");
        assert_eq!(cfg.secondary, SecondaryBackend::Google);
    }

    #[test]
    fn env_backed_flags_use_config_names() {
        let cmd = Args::command();
        cmd.clone().debug_assert();

        let env_of = |cmd: &clap::Command, id: &str| {
            cmd.get_arguments()
                .find(|a| a.get_id() == id)
                .and_then(|a| a.get_env())
                .map(OsStr::to_owned)
        };
        assert_eq!(env_of(&cmd, "llm_model").as_deref(), Some(OsStr::new(ENV_LLM_MODEL)));
        assert_eq!(
            env_of(&cmd, "llm_base_url").as_deref(),
            Some(OsStr::new(ENV_LLM_BASE_URL))
        );

        let serve = cmd.find_subcommand("serve").unwrap();
        assert_eq!(env_of(serve, "host").as_deref(), Some(OsStr::new(ENV_HOST)));
        assert_eq!(env_of(serve, "port").as_deref(), Some(OsStr::new(ENV_PORT)));
    }

    #[test]
    fn missing_llm_key_is_fatal() {
        let env = MapEnv::default().with_var(ENV_GOOGLE_API_KEY, "g");
        let err = build_config(&parse(&["translate", "hi"]), &env).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingCredential(ENV_OPENAI_API_KEY))
        );
    }

    #[test]
    fn missing_fallback_key_is_fatal_unless_disabled() {
        let env = MapEnv::default().with_var(ENV_OPENAI_API_KEY, "sk");
        assert!(build_config(&parse(&["translate", "hi"]), &env).is_err());

        let cfg = build_config(&parse(&["--secondary", "none", "translate", "hi"]), &env).unwrap();
        assert_eq!(cfg.secondary, SecondaryBackend::Disabled);
    }

    #[test]
    fn cli_flags_override_env() {
        let env = MapEnv::default()
            .with_var(ENV_OPENAI_API_KEY, "env-sk")
            .with_var(ENV_DEEPL_API_KEY, "d:fx");
        let cfg = build_config(
            &parse(&[
                "--openai-api-key",
                "cli-sk",
                "--secondary",
                "deepl",
                "--target-langs",
                "id,zh-CN",
                "--marker",
                "id=ID",
                "translate",
                "hi",
            ]),
            &env,
        )
        .unwrap();

        assert_eq!(cfg.llm.api_key.expose(), "cli-sk");
        let langs: Vec<_> = cfg.target_langs.iter().map(|t| t.as_str()).collect();
        assert_eq!(langs, vec!["id", "zh-TW"]);
        assert!(build_pipeline(&cfg).is_ok());
    }
}
