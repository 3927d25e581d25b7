//! songbird.rs
//!
//! Voice integration on top of songbird's twilight backend. Songbird owns the
//! voice gateway handshake and the UDP session; this wrapper exposes just what
//! the command handlers need.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use songbird::{Config as VoiceConfig, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};
use twilight_gateway::Event as GatewayEvent;
use twilight_model::id::Id;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};

use crate::Error;
use crate::models::VoicePresenceChange;
use crate::platforms::{JoinOptions, VoiceGateway};
use crate::services::audio_sink::AudioSink;

/// Upper bound for Discord to echo our own "left voice" state after a leave.
pub const DEPARTURE_ECHO_WAIT: Duration = Duration::from_secs(5);

/// Songbird's own handshake deadlines follow the bot's join timeout, so the
/// caller's timeout is the one that decides.
pub fn songbird_config(join_timeout: Duration) -> VoiceConfig {
    VoiceConfig::default()
        .gateway_timeout(Some(join_timeout))
        .driver_timeout(Some(join_timeout))
}

/// Fans out "the bot has no voice channel in guild X" updates once songbird
/// has processed them.
#[derive(Debug, Clone)]
pub struct DepartureTracker {
    bot_user_id: Id<UserMarker>,
    tx: broadcast::Sender<Id<GuildMarker>>,
}

impl DepartureTracker {
    pub fn new(bot_user_id: Id<UserMarker>) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { bot_user_id, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Id<GuildMarker>> {
        self.tx.subscribe()
    }

    pub fn observe(&self, change: &VoicePresenceChange) {
        if change.user_id != self.bot_user_id || change.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = change.guild_id else {
            return;
        };
        if self.tx.send(guild_id).is_err() {
            trace!("Departure from guild {guild_id} observed, nobody waiting");
        }
    }

    /// Resolves true once `guild_id` shows up on `rx`, false on timeout.
    pub async fn wait_for(
        mut rx: broadcast::Receiver<Id<GuildMarker>>,
        guild_id: Id<GuildMarker>,
        limit: Duration,
    ) -> bool {
        let seen = async {
            loop {
                match rx.recv().await {
                    Ok(g) if g == guild_id => return true,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        };
        tokio::time::timeout(limit, seen).await.unwrap_or(false)
    }
}

/// Runs `leave`, then (if the bot was in a channel) holds until Discord echoes
/// the departure or `DEPARTURE_ECHO_WAIT` passes.
async fn leave_confirmed<F>(
    departures: &DepartureTracker,
    guild_id: Id<GuildMarker>,
    was_in_channel: bool,
    leave: F,
) -> Result<(), Error>
where
    F: Future<Output = Result<(), Error>>,
{
    let echoes = departures.subscribe();
    leave.await?;

    if was_in_channel && !DepartureTracker::wait_for(echoes, guild_id, DEPARTURE_ECHO_WAIT).await {
        debug!("Songbird: no leave echo for guild {guild_id} within {DEPARTURE_ECHO_WAIT:?}");
    }
    Ok(())
}

pub struct SongbirdVoice {
    songbird: Arc<Songbird>,
    departures: DepartureTracker,
}

impl SongbirdVoice {
    pub fn new(songbird: Arc<Songbird>, bot_user_id: Id<UserMarker>) -> Self {
        Self {
            songbird,
            departures: DepartureTracker::new(bot_user_id),
        }
    }

    /// Feeds one gateway event to songbird; called from the shard runners
    /// before the event reaches the command handlers.
    pub async fn process(&self, event: &GatewayEvent, change: Option<&VoicePresenceChange>) {
        self.songbird.process(event).await;
        if let Some(change) = change {
            self.departures.observe(change);
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdVoice {
    async fn connect(
        &self,
        guild_id: Id<GuildMarker>,
        channel_id: Id<ChannelMarker>,
        options: JoinOptions,
    ) -> Result<(), Error> {
        let call = self.songbird.get_or_insert(guild_id);

        // Keep the lock only while queueing the join; the shard runner needs it
        // to deliver the voice state/server updates that complete the join.
        let join = {
            let mut handler = call.lock().await;
            handler.join(channel_id).await?
        };
        join.await?;

        // deafen/mute re-send our voice state; before the join that state would
        // carry no channel and read as a leave.
        {
            let mut handler = call.lock().await;
            handler.deafen(options.self_deaf).await?;
            handler.mute(options.self_mute).await?;
        }

        debug!("Songbird: call ready in guild {guild_id}, channel {channel_id}");
        Ok(())
    }

    /// Returns once Discord confirmed the departure (or `DEPARTURE_ECHO_WAIT`
    /// passed), so the echo cannot land on a call created right after.
    async fn disconnect(&self, guild_id: Id<GuildMarker>) -> Result<(), Error> {
        let was_in_channel = self.current_channel(guild_id).await.is_some();
        let songbird = &self.songbird;

        leave_confirmed(&self.departures, guild_id, was_in_channel, async move {
            songbird.remove(guild_id).await?;
            info!("Songbird: left voice in guild {guild_id}");
            Ok(())
        })
        .await
    }

    async fn subscribe(&self, guild_id: Id<GuildMarker>, sink: Arc<AudioSink>) -> Result<(), Error> {
        let call = self
            .songbird
            .get(guild_id)
            .ok_or_else(|| Error::Voice(format!("no call for guild {guild_id}")))?;

        let mut handler = call.lock().await;
        handler.remove_all_global_events();
        handler.add_global_event(
            Event::Track(TrackEvent::Error),
            TrackErrorReporter { sink: sink.clone() },
        );
        sink.record_subscription(&guild_id.to_string());
        Ok(())
    }

    async fn current_channel(&self, guild_id: Id<GuildMarker>) -> Option<Id<ChannelMarker>> {
        let call = self.songbird.get(guild_id)?;
        let handler = call.lock().await;
        handler.current_channel().map(|c| Id::from(c.0))
    }
}

/// Forwards driver track failures to the shared sink.
struct TrackErrorReporter {
    sink: Arc<AudioSink>,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorReporter {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, handle) in tracks.iter() {
                self.sink
                    .report_error(&format!("track {} => {:?}", handle.uuid(), state.playing));
            }
        }
        None
    }
}
