//! Platform adapters for the messaging channels and the voice markup.
//!
//! Each messaging platform gets its webhook payload types and an outbound
//! client implementing [`Channel`]. The telephony channel answers in TwiML,
//! rendered by [`TwimlResponse`].
//!
//! # Main types
//!
//! - [`Channel`] - Trait for sending a reply on a platform.
//! - [`ChannelManager`] - Routes outbound replies to the right platform.
//! - [`TelegramChannel`] / [`WhatsAppChannel`] - Bot API and Cloud API clients.
//! - [`TwimlResponse`] - Voice markup builder.

/// Core channel trait and outbound message type.
pub mod channel;
/// Channel manager for multi-channel routing.
pub mod manager;
/// Telegram Bot API integration.
pub mod telegram;
/// TwiML voice markup.
pub mod twiml;
/// WhatsApp Cloud API integration.
pub mod whatsapp;

pub use channel::{Channel, OutboundMessage};
pub use manager::ChannelManager;
pub use telegram::{TelegramChannel, TelegramConfig, TelegramUpdate};
pub use twiml::{Gather, TwimlResponse};
pub use whatsapp::{WhatsAppChannel, WhatsAppConfig, WhatsAppWebhook};
