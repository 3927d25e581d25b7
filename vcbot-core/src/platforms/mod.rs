// File: src/platforms/mod.rs

use std::sync::Arc;

use async_trait::async_trait;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

use crate::Error;
use crate::models::VoiceChannelRef;
use crate::services::audio_sink::AudioSink;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Flags sent with the voice-state update when joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    pub self_deaf: bool,
    pub self_mute: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self { self_deaf: true, self_mute: false }
    }
}

#[async_trait]
pub trait PlatformIntegration {
    async fn connect(&mut self) -> Result<(), Error>;
    async fn disconnect(&mut self) -> Result<(), Error>;
}

/// Voice signaling. `connect` resolves once the call is ready to carry audio;
/// callers apply their own deadline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(
        &self,
        guild_id: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
        options: JoinOptions,
    ) -> Result<(), Error>;

    async fn disconnect(&self, guild_id: Id<GuildMarker>) -> Result<(), Error>;

    async fn subscribe(&self, guild_id: Id<GuildMarker>, sink: Arc<AudioSink>) -> Result<(), Error>;

    /// The channel the voice layer currently believes the bot is in.
    async fn current_channel(&self, guild_id: Id<GuildMarker>) -> Option<Id<ChannelMarker>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatReplier: Send + Sync {
    async fn reply(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        content: &str,
    ) -> Result<(), Error>;
}

/// Looks up where a guild member is sitting in voice.
#[cfg_attr(test, mockall::automock)]
pub trait VoiceDirectory: Send + Sync {
    fn voice_channel_of(
        &self,
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
    ) -> Option<VoiceChannelRef>;
}

pub mod discord;
