mod config;

use clap::{Parser, Subcommand};
use config::SwitchboardConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use switchboard_channels::{ChannelManager, TelegramChannel, WhatsAppChannel};
use switchboard_dialogue::RestDialogueClient;
use switchboard_gateway::{
    AuthConfig, GatewayComponents, GatewayServer, GatewaySettings, WebhookSettings,
};
use switchboard_security::{RateLimiter, Redactor};
use switchboard_session::{spawn_sweeper, InMemorySessionStore};
use switchboard_speech::SpeechClient;
use switchboard_voice::LoggingRecordSink;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle rate-limit buckets are dropped.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "switchboard", about = "Switchboard: multi-channel conversational gateway")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "switchboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print which capabilities the configuration enables
    CheckConfig,
}

async fn load_config(path: &Path) -> anyhow::Result<SwitchboardConfig> {
    let mut config = match tokio::fs::read_to_string(path).await {
        Ok(text) => SwitchboardConfig::from_toml(&text).map_err(|e| {
            anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e)
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "Config file not found, using defaults");
            SwitchboardConfig::default()
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        }
    };

    for key in config.apply_env(|key| std::env::var(key).ok()) {
        warn!(variable = key, "Ignoring unparseable environment override");
    }
    Ok(config)
}

fn build_channels(config: &SwitchboardConfig) -> ChannelManager {
    let mut channels = ChannelManager::new();
    if config.telegram.is_configured() {
        channels.add_channel(Box::new(TelegramChannel::new(config.telegram.clone())));
    } else {
        warn!("Telegram credentials missing; replies on that channel are disabled");
    }
    if config.whatsapp.is_configured() {
        channels.add_channel(Box::new(WhatsAppChannel::new(config.whatsapp.clone())));
    } else {
        warn!("WhatsApp credentials missing; replies on that channel are disabled");
    }
    channels
}

fn yes_no(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;
    let redactor = Redactor::with_secrets(config.secrets());

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            info!("Starting Switchboard gateway on {}:{}", host, port);

            let sessions = Arc::new(InMemorySessionStore::new(config.session.expiry));
            let _sweeper = spawn_sweeper(
                sessions.clone(),
                config.session.cleanup_interval(),
                config.session.ttl(),
            );
            info!(
                ttl_ms = config.session.timeout_ms,
                interval_ms = config.session.cleanup_interval_ms,
                expiry = ?config.session.expiry,
                "Session sweeper started"
            );

            if !config.speech.is_configured() {
                warn!("Speech credentials missing; voice replies fall back to platform speech");
            }
            if config.voice.webhook_base_url.is_empty() {
                warn!("TWILIO_WEBHOOK_BASE_URL is not set; TwiML callbacks will use relative paths");
            }

            let rate_limiter = Arc::new(RateLimiter::new(
                config.security.max_burst,
                config.security.max_requests_per_second,
            ));
            let _limiter_cleanup = rate_limiter.spawn_cleanup(RATE_LIMIT_CLEANUP_INTERVAL);
            if config.security.trust_forwarded_for {
                info!("Rate limiting by X-Forwarded-For client address");
            }
            let auth_config = AuthConfig::new(config.security.api_keys.clone());
            if auth_config.is_enabled() {
                info!(keys = auth_config.api_keys.len(), "API key auth enabled");
            }

            let components = GatewayComponents {
                sessions,
                dialogue: Arc::new(RestDialogueClient::new(config.dialogue.clone())),
                speech: Arc::new(SpeechClient::new(config.speech.clone())),
                records: Arc::new(LoggingRecordSink),
                channels: build_channels(&config),
            };
            let settings = GatewaySettings {
                dialogue_url: config.dialogue.base_url.clone(),
                ivr: config.voice.clone(),
                webhooks: WebhookSettings::from_configs(&config.telegram, &config.whatsapp),
                max_message_chars: config.security.max_message_length,
                recording_queue: config.server.recording_queue,
                trust_forwarded_for: config.security.trust_forwarded_for,
            };

            let app = GatewayServer::build_with_middleware(
                components,
                settings,
                Some(rate_limiter),
                auth_config,
            );

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Switchboard gateway listening on {}", addr);
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .map_err(|e| anyhow::anyhow!(redactor.redact(&e.to_string())))?;
        }
        Commands::CheckConfig => {
            println!("Configuration: {}", cli.config.display());
            println!("  listen:        {}:{}", config.server.host, config.server.port);
            println!("  dialogue:      {}", redactor.redact(&config.dialogue.base_url));
            println!("  speech:        {}", yes_no(config.speech.is_configured()));
            println!("  telegram:      {}", yes_no(config.telegram.is_configured()));
            println!("  whatsapp:      {}", yes_no(config.whatsapp.is_configured()));
            println!(
                "  operator:      {}",
                yes_no(!config.voice.operator_number.trim().is_empty())
            );
            println!(
                "  webhook base:  {}",
                if config.voice.webhook_base_url.is_empty() {
                    "(unset)".to_string()
                } else {
                    redactor.redact(&config.voice.webhook_base_url)
                }
            );
            println!(
                "  sessions:      ttl {}s, sweep every {}s, {:?}",
                config.session.ttl().as_secs(),
                config.session.cleanup_interval().as_secs(),
                config.session.expiry
            );
            println!(
                "  api auth:      {}",
                yes_no(!config.security.api_keys.is_empty())
            );
        }
    }

    Ok(())
}
