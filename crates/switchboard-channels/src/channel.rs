use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_core::{ChannelKind, SwitchboardResult};

/// A reply addressed to a platform-native recipient (chat id, phone number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn send(&self, message: OutboundMessage) -> SwitchboardResult<()>;

    /// Acknowledge a platform interaction (for example an inline-keyboard
    /// press) by its platform id. Platforms without the notion do nothing.
    async fn acknowledge(&self, _interaction_id: &str) -> SwitchboardResult<()> {
        Ok(())
    }
}
