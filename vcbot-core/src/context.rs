//! vcbot-core/src/context.rs
//!
//! The bot's application context: the session slot, the shared audio sink and
//! handles to the platform seams. Owned by the event service and lent `&mut`
//! to each handler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;

use crate::BotConfig;
use crate::platforms::{ChatReplier, VoiceDirectory, VoiceGateway};
use crate::services::audio_sink::AudioSink;
use crate::session::SessionSlot;

pub struct BotContext {
    pub voice: Arc<dyn VoiceGateway>,
    pub replier: Arc<dyn ChatReplier>,
    pub directory: Arc<dyn VoiceDirectory>,
    pub audio_sink: Arc<AudioSink>,
    pub session: SessionSlot,

    /// Known once the gateway reported READY (or the HTTP API told us at startup).
    pub bot_user_id: Option<Id<UserMarker>>,
    pub command_prefix: String,
    pub join_timeout: Duration,

    /// Wall clock used for ping latency.
    pub clock: fn() -> DateTime<Utc>,
}

impl BotContext {
    pub fn new(
        voice: Arc<dyn VoiceGateway>,
        replier: Arc<dyn ChatReplier>,
        directory: Arc<dyn VoiceDirectory>,
        config: &BotConfig,
    ) -> Self {
        Self {
            voice,
            replier,
            directory,
            audio_sink: Arc::new(AudioSink::default()),
            session: SessionSlot::new(),
            bot_user_id: None,
            command_prefix: config.command_prefix.clone(),
            join_timeout: config.join_timeout,
            clock: Utc::now,
        }
    }

    pub fn with_bot_user(mut self, user_id: Id<UserMarker>) -> Self {
        self.bot_user_id = Some(user_id);
        self
    }
}
