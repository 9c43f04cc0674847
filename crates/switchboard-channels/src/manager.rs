use crate::channel::{Channel, OutboundMessage};
use std::collections::HashMap;
use switchboard_core::{ChannelKind, SwitchboardError, SwitchboardResult};

/// Outbound clients for the configured messaging platforms.
///
/// A platform without credentials is simply not registered; sends to it fail
/// with [`SwitchboardError::Configuration`].
pub struct ChannelManager {
    channels: HashMap<ChannelKind, Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel, replacing any previous one of the same kind.
    pub fn add_channel(&mut self, channel: Box<dyn Channel>) {
        self.channels.insert(channel.kind(), channel);
    }

    pub fn get(&self, kind: ChannelKind) -> Option<&dyn Channel> {
        self.channels.get(&kind).map(std::convert::AsRef::as_ref)
    }

    /// Send a message on a specific platform.
    pub async fn send_to(&self, kind: ChannelKind, message: OutboundMessage) -> SwitchboardResult<()> {
        let channel = self.channels.get(&kind).ok_or_else(|| {
            SwitchboardError::Configuration(format!("Channel '{kind}' is not configured"))
        })?;
        channel.send(message).await
    }

    /// Acknowledge an interaction on a specific platform.
    pub async fn acknowledge(&self, kind: ChannelKind, interaction_id: &str) -> SwitchboardResult<()> {
        let channel = self.channels.get(&kind).ok_or_else(|| {
            SwitchboardError::Configuration(format!("Channel '{kind}' is not configured"))
        })?;
        channel.acknowledge(interaction_id).await
    }

    pub fn channel_kinds(&self) -> Vec<ChannelKind> {
        self.channels.keys().copied().collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
