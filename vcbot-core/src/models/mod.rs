//! Domain types shared between the Discord runtime and the command services.
//!
//! The runtime converts raw twilight gateway events into [`PlatformEvent`]s so
//! the handlers (and their tests) never touch gateway payloads directly.

use chrono::{DateTime, Utc};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

/// Events forwarded from the gateway shards to the event service.
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    Ready {
        user_id: Id<UserMarker>,
        user_name: String,
    },
    MessageCreate(InboundMessage),
    VoiceStateUpdate(VoicePresenceChange),
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: Id<MessageMarker>,
    pub channel_id: Id<ChannelMarker>,
    /// `None` for DMs.
    pub guild_id: Option<Id<GuildMarker>>,
    pub author_id: Id<UserMarker>,
    pub author_is_bot: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The new voice state of a single user after a change.
#[derive(Debug, Clone)]
pub struct VoicePresenceChange {
    pub user_id: Id<UserMarker>,
    pub guild_id: Option<Id<GuildMarker>>,
    /// `None` means the user is no longer in any voice channel.
    pub channel_id: Option<Id<ChannelMarker>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannelRef {
    pub id: Id<ChannelMarker>,
    pub name: String,
}

/// The bot's one voice-channel presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub guild_id: Id<GuildMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub channel_name: String,
}
