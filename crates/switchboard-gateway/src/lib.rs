//! HTTP surface of the Switchboard gateway.
//!
//! One axum app carries the direct API, the web widget (HTTP and WebSocket),
//! the Telegram and WhatsApp webhooks and the TwiML voice webhooks. Text
//! surfaces share [`ConversationRouter`]; voice goes through the IVR engine.

pub mod api;
pub mod connection;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod telegram;
pub mod twilio;
pub mod web;
pub mod whatsapp;

pub use error::ApiError;
pub use middleware::AuthConfig;
pub use router::{ChatOutcome, ChatRequest, ConversationRouter};
pub use server::{AppState, GatewayComponents, GatewayServer, GatewaySettings, WebhookSettings};
