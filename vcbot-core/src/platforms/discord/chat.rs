use std::sync::Arc;

use async_trait::async_trait;
use twilight_cache_inmemory::InMemoryCache;
use twilight_http::Client as HttpClient;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

use crate::Error;
use crate::models::VoiceChannelRef;
use crate::platforms::{ChatReplier, VoiceDirectory};

/// Sends replies through the REST API, threaded onto the triggering message.
pub struct TwilightReplier {
    http: Arc<HttpClient>,
}

impl TwilightReplier {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatReplier for TwilightReplier {
    async fn reply(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        content: &str,
    ) -> Result<(), Error> {
        self.http
            .create_message(channel_id)
            .content(content)
            .reply(message_id)
            .await
            .map_err(|e| Error::Platform(format!("Error sending Discord reply: {e:?}")))?;
        Ok(())
    }
}

/// Answers voice lookups from the gateway cache (needs the VOICE_STATE and
/// CHANNEL resource types).
pub struct CacheDirectory {
    cache: Arc<InMemoryCache>,
}

impl CacheDirectory {
    pub fn new(cache: Arc<InMemoryCache>) -> Self {
        Self { cache }
    }
}

impl VoiceDirectory for CacheDirectory {
    fn voice_channel_of(
        &self,
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
    ) -> Option<VoiceChannelRef> {
        let channel_id = self.cache.voice_state(user_id, guild_id)?.channel_id();
        let name = self
            .cache
            .channel(channel_id)
            .and_then(|c| c.name.clone())
            .unwrap_or_else(|| channel_id.to_string());
        Some(VoiceChannelRef { id: channel_id, name })
    }
}
