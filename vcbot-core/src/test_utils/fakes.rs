// vcbot-core/src/test_utils/fakes.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker};

use crate::Error;
use crate::models::{VoiceChannelRef, VoicePresenceChange};
use crate::platforms::{ChatReplier, JoinOptions, VoiceDirectory, VoiceGateway};
use crate::services::audio_sink::AudioSink;

/// What the fake voice layer does when asked to connect.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    Ready,
    Fail(String),
    /// Never becomes ready; only the caller's timeout ends the attempt.
    Hang,
}

#[derive(Debug)]
struct FakeVoiceInner {
    behavior: ConnectBehavior,
    bot_user_id: Option<Id<UserMarker>>,
    calls: HashMap<Id<GuildMarker>, Id<ChannelMarker>>,
    connects: Vec<(Id<GuildMarker>, Id<ChannelMarker>, JoinOptions)>,
    disconnects: Vec<Id<GuildMarker>>,
    subscriptions: Vec<Id<GuildMarker>>,
}

/// Behaves like the songbird manager: one call per guild, `disconnect` errors
/// when there is no call, and the bot's own "no channel" voice state drops the
/// call for that guild. `disconnect` returns with the leave already confirmed,
/// the way `SongbirdVoice` waits for the echo.
#[derive(Debug)]
pub struct FakeVoiceGateway {
    inner: Mutex<FakeVoiceInner>,
}

impl FakeVoiceGateway {
    pub fn new() -> Self {
        Self::with_behavior(ConnectBehavior::Ready)
    }

    pub fn with_behavior(behavior: ConnectBehavior) -> Self {
        Self {
            inner: Mutex::new(FakeVoiceInner {
                behavior,
                bot_user_id: None,
                calls: HashMap::new(),
                connects: Vec::new(),
                disconnects: Vec::new(),
                subscriptions: Vec::new(),
            }),
        }
    }

    /// Voice states are only interpreted once the bot's own id is known.
    pub fn for_bot(self, bot_user_id: Id<UserMarker>) -> Self {
        self.inner.lock().unwrap().bot_user_id = Some(bot_user_id);
        self
    }

    pub fn set_behavior(&self, behavior: ConnectBehavior) {
        self.inner.lock().unwrap().behavior = behavior;
    }

    /// Same step the shard runner performs before forwarding a voice state.
    pub fn process_voice_state(&self, change: &VoicePresenceChange) {
        let mut inner = self.inner.lock().unwrap();
        if inner.bot_user_id != Some(change.user_id) || change.channel_id.is_some() {
            return;
        }
        if let Some(guild_id) = change.guild_id {
            inner.calls.remove(&guild_id);
        }
    }

    pub fn live_calls(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }

    pub fn connects(&self) -> Vec<(Id<GuildMarker>, Id<ChannelMarker>, JoinOptions)> {
        self.inner.lock().unwrap().connects.clone()
    }

    pub fn disconnects(&self) -> Vec<Id<GuildMarker>> {
        self.inner.lock().unwrap().disconnects.clone()
    }

    pub fn subscriptions(&self) -> Vec<Id<GuildMarker>> {
        self.inner.lock().unwrap().subscriptions.clone()
    }
}

impl Default for FakeVoiceGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceGateway for FakeVoiceGateway {
    async fn connect(
        &self,
        guild_id: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
        options: JoinOptions,
    ) -> Result<(), Error> {
        let behavior = {
            let mut inner = self.inner.lock().unwrap();
            inner.connects.push((guild_id, channel_id, options));
            inner.behavior.clone()
        };

        match behavior {
            ConnectBehavior::Ready => {
                self.inner.lock().unwrap().calls.insert(guild_id, channel_id);
                Ok(())
            }
            ConnectBehavior::Fail(reason) => Err(Error::Voice(reason)),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }

    async fn disconnect(&self, guild_id: Id<GuildMarker>) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.disconnects.push(guild_id);
        match inner.calls.remove(&guild_id) {
            Some(_) => Ok(()),
            None => Err(Error::Voice(format!("no call for guild {guild_id}"))),
        }
    }

    async fn subscribe(&self, guild_id: Id<GuildMarker>, sink: Arc<AudioSink>) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.calls.contains_key(&guild_id) {
            return Err(Error::Voice(format!("no call for guild {guild_id}")));
        }
        inner.subscriptions.push(guild_id);
        sink.record_subscription(&guild_id.to_string());
        Ok(())
    }

    async fn current_channel(&self, guild_id: Id<GuildMarker>) -> Option<Id<ChannelMarker>> {
        self.inner.lock().unwrap().calls.get(&guild_id).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub channel_id: Id<ChannelMarker>,
    pub message_id: Id<MessageMarker>,
    pub content: String,
}

/// Keeps every reply instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingReplier {
    sent: Mutex<Vec<SentReply>>,
}

impl RecordingReplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentReply> {
        self.sent.lock().unwrap().clone()
    }

    pub fn contents(&self) -> Vec<String> {
        self.sent().into_iter().map(|r| r.content).collect()
    }
}

#[async_trait]
impl ChatReplier for RecordingReplier {
    async fn reply(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        content: &str,
    ) -> Result<(), Error> {
        self.sent.lock().unwrap().push(SentReply {
            channel_id,
            message_id,
            content: content.to_string(),
        });
        Ok(())
    }
}

/// Fixed member -> voice channel table.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    members: Mutex<HashMap<(Id<GuildMarker>, Id<UserMarker>), VoiceChannelRef>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(&self, guild_id: Id<GuildMarker>, user_id: Id<UserMarker>, channel_id: Id<ChannelMarker>, name: &str) {
        self.members.lock().unwrap().insert(
            (guild_id, user_id),
            VoiceChannelRef { id: channel_id, name: name.to_string() },
        );
    }

    pub fn remove(&self, guild_id: Id<GuildMarker>, user_id: Id<UserMarker>) {
        self.members.lock().unwrap().remove(&(guild_id, user_id));
    }
}

impl VoiceDirectory for StaticDirectory {
    fn voice_channel_of(
        &self,
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
    ) -> Option<VoiceChannelRef> {
        self.members.lock().unwrap().get(&(guild_id, user_id)).cloned()
    }
}
