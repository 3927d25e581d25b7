// vcbot-core/src/test_utils/helpers.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};

use crate::{BotConfig, BotContext};
use crate::models::{InboundMessage, VoicePresenceChange};
use crate::test_utils::fakes::{FakeVoiceGateway, RecordingReplier, StaticDirectory};

pub const GUILD: u64 = 100;
pub const TEXT_CHANNEL: u64 = 200;
pub const LOUNGE: u64 = 300;
pub const STUDIO: u64 = 301;
pub const MEMBER: u64 = 400;
pub const BOT: u64 = 999;

/// A context wired to fakes, with `MEMBER` sitting in the "Lounge" voice channel.
pub struct Harness {
    pub ctx: BotContext,
    pub voice: Arc<FakeVoiceGateway>,
    pub replier: Arc<RecordingReplier>,
    pub directory: Arc<StaticDirectory>,
}

pub fn harness() -> Harness {
    harness_with_config(&BotConfig::default())
}

pub fn harness_with_config(config: &BotConfig) -> Harness {
    let voice = Arc::new(FakeVoiceGateway::new().for_bot(Id::new(BOT)));
    let replier = Arc::new(RecordingReplier::new());
    let directory = Arc::new(StaticDirectory::new());
    directory.place(guild(), member(), Id::new(LOUNGE), "Lounge");

    let ctx = BotContext::new(voice.clone(), replier.clone(), directory.clone(), config)
        .with_bot_user(Id::new(BOT));

    Harness { ctx, voice, replier, directory }
}

pub fn guild() -> Id<GuildMarker> {
    Id::new(GUILD)
}

pub fn member() -> Id<UserMarker> {
    Id::new(MEMBER)
}

pub fn channel(id: u64) -> Id<ChannelMarker> {
    Id::new(id)
}

pub fn fixed_time(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
}

/// A guild message from `MEMBER`, created at `fixed_time(1_700_000_000_000)`.
pub fn guild_message(content: &str) -> InboundMessage {
    InboundMessage {
        id: Id::new(5_000),
        channel_id: Id::new(TEXT_CHANNEL),
        guild_id: Some(guild()),
        author_id: member(),
        author_is_bot: false,
        content: content.to_string(),
        created_at: fixed_time(1_700_000_000_000),
    }
}

pub fn bot_left_voice() -> VoicePresenceChange {
    VoicePresenceChange {
        user_id: Id::new(BOT),
        guild_id: Some(guild()),
        channel_id: None,
    }
}
