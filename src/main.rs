use std::net::SocketAddr;
use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use ballu::chatbot::capabilities::{default_registry, CapabilitySettings};
use ballu::chatbot::prompts::DEFAULT_PERSONA;
use ballu::chatbot::whisper::Transcriber;
use ballu::chatbot::{BotEngine, Database, Dispatcher, DispatcherConfig, NullStore, Store, TelegramClient, Whisper};
use ballu::config::Config;
use ballu::extractor::LlmExtractor;
use ballu::llm::{GeminiClient, LanguageModel};
use ballu::server::{self, AppState};
use ballu::telegram_log::TelegramLogLayer;

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "ballu.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };
    let addr: SocketAddr = match config.bind_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Invalid bind_address '{}': {e}", config.bind_address);
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::never(&log_dir, "ballu.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(TelegramLogLayer::new(bot.clone(), ChatId(log_chat_id))).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting Ballu...");
    info!("Loaded config from {config_path}");

    let model: Arc<dyn LanguageModel> =
        Arc::new(GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone()));
    let extractor = Arc::new(LlmExtractor::new(model.clone()));
    let registry = Arc::new(default_registry(&CapabilitySettings::from_config(&config)));
    info!("🔧 Capabilities: {}", registry.function_names().join(", "));

    let db_path = config.data_dir.join("ballu.db");
    let store: Arc<dyn Store> = match Database::open(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            warn!("💾 Database unavailable at {:?}, running without history: {e}", db_path);
            Arc::new(NullStore)
        }
    };

    let transcriber: Option<Arc<dyn Transcriber>> = match &config.whisper_model_path {
        Some(path) => match Whisper::new(path) {
            Ok(whisper) => Some(Arc::new(whisper) as Arc<dyn Transcriber>),
            Err(e) => {
                warn!("🎤 Voice messages disabled: {e}");
                None
            }
        },
        None => {
            info!("🎤 No whisper_model_path configured, voice messages disabled");
            None
        }
    };

    let dispatcher_config = DispatcherConfig {
        keyword_rules: config.keyword_rules.clone(),
        persona: config.personality.clone().unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
        history_limit: config.history_limit,
        history_entry_chars: config.history_entry_chars,
        welcome_image: config.welcome_image.clone(),
    };
    let dispatcher = Dispatcher::new(dispatcher_config, extractor, model, registry, store.clone());
    let messenger = Arc::new(TelegramClient::new(bot.clone()));
    let engine = BotEngine::new(dispatcher, store, messenger, transcriber);

    if let Some(url) = &config.webhook_url {
        match url.parse::<reqwest::Url>() {
            Ok(parsed) => match bot.set_webhook(parsed).await {
                Ok(_) => info!("🔗 Webhook set to {url}"),
                Err(e) => warn!("Failed to set webhook: {e}"),
            },
            Err(e) => warn!("Invalid webhook_url '{url}': {e}"),
        }
    }

    if let Err(e) = server::serve(addr, AppState { engine: Arc::new(engine) }).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
