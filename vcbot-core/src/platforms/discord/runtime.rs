use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ::songbird::Songbird;
use ::songbird::shards::TwilightMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    self as gateway,
    CloseFrame,
    Config,
    Event,
    EventTypeFlags,
    Intents,
    MessageSender,
    Shard,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_model::channel::Message;
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;
use twilight_model::util::Timestamp;
use twilight_model::voice::VoiceState;

use crate::{BotConfig, BotContext, Error};
use crate::models::{InboundMessage, PlatformEvent, VoicePresenceChange};
use crate::platforms::discord::chat::{CacheDirectory, TwilightReplier};
use crate::platforms::discord::songbird::{SongbirdVoice, songbird_config};
use crate::platforms::{ConnectionStatus, PlatformIntegration};

const SHARD_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn intents() -> Intents {
    Intents::GUILDS | Intents::GUILD_VOICE_STATES | Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT
}

pub fn timestamp_to_utc(ts: Timestamp) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(ts.as_micros()).unwrap_or_else(Utc::now)
}

/// Maps the gateway events the bot cares about; everything else stays inside
/// the cache and songbird.
pub fn to_platform_event(event: &Event) -> Option<PlatformEvent> {
    match event {
        Event::Ready(ready) => Some(PlatformEvent::Ready {
            user_id: ready.user.id,
            user_name: ready.user.name.clone(),
        }),
        Event::MessageCreate(msg) => Some(PlatformEvent::MessageCreate(inbound_message(&msg.0))),
        Event::VoiceStateUpdate(update) => {
            Some(PlatformEvent::VoiceStateUpdate(presence_change(&update.0)))
        }
        _ => None,
    }
}

pub fn inbound_message(msg: &Message) -> InboundMessage {
    InboundMessage {
        id: msg.id,
        channel_id: msg.channel_id,
        guild_id: msg.guild_id,
        author_id: msg.author.id,
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
        created_at: timestamp_to_utc(msg.timestamp),
    }
}

pub fn presence_change(state: &VoiceState) -> VoicePresenceChange {
    VoicePresenceChange {
        user_id: state.user_id,
        guild_id: state.guild_id,
        channel_id: state.channel_id,
    }
}

/// Per-shard loop:
///   - updates the in-memory cache
///   - hands voice events to songbird (before anything can block on them)
///   - forwards the interesting events to `tx`.
async fn shard_runner(
    mut shard: Shard,
    tx: UnboundedSender<PlatformEvent>,
    cache: Arc<InMemoryCache>,
    voice: Arc<SongbirdVoice>,
) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };

        cache.update(&event);
        let platform_event = to_platform_event(&event);
        let voice_change = match &platform_event {
            Some(PlatformEvent::VoiceStateUpdate(change)) => Some(change),
            _ => None,
        };
        voice.process(&event, voice_change).await;

        if let Event::GatewayClose(frame) = &event {
            debug!("Shard {shard_id} => gateway closed: {frame:?}");
        }

        match platform_event {
            Some(platform_event) => {
                if tx.send(platform_event).is_err() {
                    warn!("Shard {shard_id} => event service is gone, stopping");
                    break;
                }
            }
            None => trace!("Shard {shard_id} => unhandled event: {:?}", event.kind()),
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

pub struct DiscordPlatform {
    pub token: String,
    pub connection_status: ConnectionStatus,

    /// Filled by `connect`; the event service takes it exactly once.
    rx: Mutex<Option<UnboundedReceiver<PlatformEvent>>>,

    pub shard_tasks: Vec<JoinHandle<()>>,
    pub shard_senders: Vec<MessageSender>,

    pub http: Option<Arc<HttpClient>>,
    pub cache: Option<Arc<InMemoryCache>>,
    pub voice: Option<Arc<SongbirdVoice>>,
    pub bot_user_id: Option<Id<UserMarker>>,

    /// Deadline handed to songbird's own gateway/driver handshakes.
    pub join_timeout: Duration,
}

impl DiscordPlatform {
    pub fn new(token: String, join_timeout: Duration) -> Self {
        Self {
            token,
            connection_status: ConnectionStatus::Disconnected,
            rx: Mutex::new(None),
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
            http: None,
            cache: None,
            voice: None,
            bot_user_id: None,
            join_timeout,
        }
    }

    pub async fn take_event_receiver(&self) -> Option<UnboundedReceiver<PlatformEvent>> {
        self.rx.lock().await.take()
    }

    /// Wires the live Discord clients into a fresh bot context.
    pub fn bot_context(&self, config: &BotConfig) -> Result<BotContext, Error> {
        let (Some(http), Some(cache), Some(voice), Some(user_id)) =
            (&self.http, &self.cache, &self.voice, self.bot_user_id)
        else {
            return Err(Error::Platform("Discord platform is not connected".into()));
        };

        let ctx = BotContext::new(
            voice.clone(),
            Arc::new(TwilightReplier::new(http.clone())),
            Arc::new(CacheDirectory::new(cache.clone())),
            config,
        )
        .with_bot_user(user_id);
        Ok(ctx)
    }
}

#[async_trait]
impl PlatformIntegration for DiscordPlatform {
    async fn connect(&mut self) -> Result<(), Error> {
        if matches!(self.connection_status, ConnectionStatus::Connected) {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }
        if self.token.is_empty() {
            return Err(Error::Config("Discord token is empty".into()));
        }

        let (tx, rx) = unbounded_channel::<PlatformEvent>();
        {
            let mut guard = self.rx.lock().await;
            *guard = Some(rx);
        }

        let http_client = Arc::new(
            ClientBuilder::new()
                .token(self.token.clone())
                .timeout(Duration::from_secs(30))
                .build(),
        );
        self.http = Some(http_client.clone());

        // Songbird needs our user id up front.
        let me = http_client
            .current_user()
            .await
            .map_err(|e| Error::Platform(format!("current_user error: {e}")))?
            .model()
            .await
            .map_err(|e| Error::Platform(format!("current_user parse error: {e}")))?;
        self.bot_user_id = Some(me.id);
        debug!("(DiscordPlatform) Bot user is {} ({})", me.name, me.id);

        let cache = Arc::new(
            InMemoryCache::builder()
                .resource_types(ResourceType::GUILD | ResourceType::CHANNEL | ResourceType::VOICE_STATE)
                .build(),
        );
        self.cache = Some(cache.clone());

        let config = Config::new(self.token.clone(), intents());
        let shards: Vec<Shard> = gateway::create_recommended(&http_client, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?
            .collect();

        let senders: HashMap<u32, MessageSender> = shards
            .iter()
            .map(|s| (s.id().number(), s.sender()))
            .collect();
        let songbird = Arc::new(Songbird::twilight_from_config(
            Arc::new(TwilightMap::new(senders)),
            me.id,
            songbird_config(self.join_timeout),
        ));
        let voice = Arc::new(SongbirdVoice::new(songbird, me.id));
        self.voice = Some(voice.clone());

        for shard in shards {
            self.shard_senders.push(shard.sender());

            let handle = tokio::spawn(shard_runner(shard, tx.clone(), cache.clone(), voice.clone()));
            self.shard_tasks.push(handle);
        }

        self.connection_status = ConnectionStatus::Connected;
        info!("(DiscordPlatform) Connected with {} shard(s)", self.shard_tasks.len());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.connection_status = ConnectionStatus::Disconnected;

        for sender in &self.shard_senders {
            if let Err(e) = sender.close(CloseFrame::NORMAL) {
                warn!("(DiscordPlatform) Could not send close frame => {e}");
            }
        }
        for mut task in self.shard_tasks.drain(..) {
            if tokio::time::timeout(SHARD_SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("(DiscordPlatform) Shard did not stop in time => aborting");
                task.abort();
            }
        }
        self.shard_senders.clear();

        {
            let mut guard = self.rx.lock().await;
            *guard = None;
        }
        Ok(())
    }
}
