use crate::connection::ConnectionManager;
use crate::middleware::{auth_middleware, rate_limit_middleware, AuthConfig, MiddlewareState};
use crate::router::{ChatRequest, ConversationRouter};
use crate::{api, telegram, twilio, web, whatsapp};
use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use switchboard_channels::{ChannelManager, OutboundMessage, TelegramConfig, WhatsAppConfig};
use switchboard_core::{ChannelKind, TECHNICAL_DIFFICULTIES_TEXT};
use switchboard_dialogue::DialogueEngine;
use switchboard_security::{redact, RateLimiter, Sanitizer, DEFAULT_MAX_MESSAGE_CHARS};
use switchboard_session::SessionStore;
use switchboard_speech::SpeechService;
use switchboard_voice::{log_failures, ConversationRecordSink, IvrConfig, IvrEngine, RecordingWorker};
use tracing::{error, info};

const DEFAULT_RECORDING_QUEUE: usize = 64;

/// Secrets the inbound webhook routes verify against.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Expected `X-Telegram-Bot-Api-Secret-Token`; unchecked when `None`.
    pub telegram_secret_token: Option<String>,
    /// Token echoed back during WhatsApp subscription verification.
    pub whatsapp_verify_token: String,
    /// App secret for `X-Hub-Signature-256`; unchecked when `None`.
    pub whatsapp_app_secret: Option<String>,
}

impl WebhookSettings {
    pub fn from_configs(telegram: &TelegramConfig, whatsapp: &WhatsAppConfig) -> Self {
        Self {
            telegram_secret_token: telegram.secret_token.clone().filter(|s| !s.is_empty()),
            whatsapp_verify_token: whatsapp.verify_token.clone(),
            whatsapp_app_secret: whatsapp.app_secret.clone().filter(|s| !s.is_empty()),
        }
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self::from_configs(&TelegramConfig::default(), &WhatsAppConfig::default())
    }
}

/// Deployment settings for [`GatewayServer`].
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Reported by `/health`.
    pub dialogue_url: String,
    pub ivr: IvrConfig,
    pub webhooks: WebhookSettings,
    pub max_message_chars: usize,
    /// Capacity of the post-call recording queue.
    pub recording_queue: usize,
    /// Rate-limit by `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            dialogue_url: String::new(),
            ivr: IvrConfig::default(),
            webhooks: WebhookSettings::default(),
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            recording_queue: DEFAULT_RECORDING_QUEUE,
            trust_forwarded_for: false,
        }
    }
}

/// The collaborators the gateway routes traffic between.
pub struct GatewayComponents {
    pub sessions: Arc<dyn SessionStore>,
    pub dialogue: Arc<dyn DialogueEngine>,
    pub speech: Arc<dyn SpeechService>,
    pub records: Arc<dyn ConversationRecordSink>,
    pub channels: ChannelManager,
}

/// Shared application state.
pub struct AppState {
    pub router: Arc<ConversationRouter>,
    pub channels: Arc<ChannelManager>,
    pub ivr: Arc<IvrEngine>,
    pub recordings: RecordingWorker,
    pub connections: Arc<ConnectionManager>,
    pub webhooks: WebhookSettings,
    pub dialogue_url: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Run a messaging turn and deliver the reply to `recipient`.
    ///
    /// Failures are logged; the counterparty gets the technical-difficulties
    /// apology instead of the reply.
    pub async fn converse(&self, kind: ChannelKind, recipient: &str, request: ChatRequest) {
        let text = match self.router.handle(request).await {
            Ok(outcome) => outcome.reply.text,
            Err(e) => {
                error!(
                    channel = %kind,
                    recipient = %recipient,
                    error = %redact(&e.to_string()),
                    "Failed to process message"
                );
                TECHNICAL_DIFFICULTIES_TEXT.to_string()
            }
        };

        if let Err(e) = self
            .channels
            .send_to(kind, OutboundMessage::new(recipient, text))
            .await
        {
            error!(
                channel = %kind,
                recipient = %recipient,
                error = %redact(&e.to_string()),
                "Failed to deliver reply"
            );
        }
    }
}

/// The main gateway server.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth or rate limiting.
    ///
    /// Must be called inside a tokio runtime; the recording worker is
    /// spawned here.
    pub fn build(components: GatewayComponents, settings: GatewaySettings) -> Router {
        Self::build_with_middleware(components, settings, None, AuthConfig::default())
    }

    /// Build the gateway with optional rate limiting and auth middleware.
    ///
    /// Auth applies to the direct API only; the web widget is rate limited
    /// but public; platform webhooks carry their own verification.
    ///
    /// Rate limiting keys on the peer address, so serve the router with
    /// `into_make_service_with_connect_info::<SocketAddr>()`.
    pub fn build_with_middleware(
        components: GatewayComponents,
        settings: GatewaySettings,
        rate_limiter: Option<Arc<RateLimiter>>,
        auth_config: AuthConfig,
    ) -> Router {
        let GatewayComponents {
            sessions,
            dialogue,
            speech,
            records,
            channels,
        } = components;

        let router = Arc::new(ConversationRouter::new(
            sessions.clone(),
            dialogue.clone(),
            Sanitizer::new(settings.max_message_chars),
        ));
        let ivr = Arc::new(IvrEngine::new(
            sessions,
            dialogue,
            speech.clone(),
            records.clone(),
            settings.ivr,
        ));
        let (recordings, failures, _worker) =
            RecordingWorker::spawn(speech, records, settings.recording_queue);
        log_failures(failures);

        info!(
            channels = ?channels.channel_kinds(),
            dialogue_url = %settings.dialogue_url,
            "Gateway assembled"
        );

        let state = Arc::new(AppState {
            router,
            channels: Arc::new(channels),
            ivr,
            recordings,
            connections: ConnectionManager::new(),
            webhooks: settings.webhooks,
            dialogue_url: settings.dialogue_url,
            started_at: Utc::now(),
        });

        let mut direct_api = Router::new()
            .route("/api/chat", post(api::chat))
            .route("/api/voice", post(api::voice))
            .route("/api/session/{id}", get(api::session))
            .route("/api/handoff", post(api::handoff))
            .route("/api/dialogue/status", get(api::dialogue_status));

        let mut web_widget = Router::new()
            .route("/api/web/chat", post(web::chat))
            .route("/api/web/ws", get(web::ws_handler));

        // Apply middleware if configured
        if rate_limiter.is_some() || auth_config.is_enabled() {
            let mw_state = Arc::new(MiddlewareState {
                rate_limiter: rate_limiter
                    .unwrap_or_else(|| Arc::new(RateLimiter::new(1000.0, 1000.0))),
                auth: auth_config,
                trust_forwarded_for: settings.trust_forwarded_for,
            });

            direct_api = direct_api
                .layer(axum_mw::from_fn_with_state(
                    mw_state.clone(),
                    rate_limit_middleware,
                ))
                .layer(axum_mw::from_fn_with_state(mw_state.clone(), auth_middleware));
            web_widget = web_widget.layer(axum_mw::from_fn_with_state(
                mw_state,
                rate_limit_middleware,
            ));
        }

        let platform_webhooks = Router::new()
            .route(
                "/api/telegram/webhook",
                get(telegram::liveness).post(telegram::webhook),
            )
            .route(
                "/api/whatsapp/webhook",
                get(whatsapp::verify).post(whatsapp::webhook),
            )
            .route("/api/twilio/incoming", post(twilio::incoming))
            .route("/api/twilio/gather", post(twilio::gather))
            .route("/api/twilio/timeout", post(twilio::timeout))
            .route("/api/twilio/status", post(twilio::status))
            .route("/api/twilio/recording", post(twilio::recording));

        Router::new()
            .route("/health", get(health_handler))
            .merge(direct_api)
            .merge(web_widget)
            .merge(platform_webhooks)
            .with_state(state)
    }
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "switchboard",
        "timestamp": Utc::now(),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "dialogue_url": state.dialogue_url,
        "sessions": state.router.sessions().len().await,
        "connections": state.connections.connection_count().await,
        "channels": state.channels.channel_kinds(),
    }))
}
