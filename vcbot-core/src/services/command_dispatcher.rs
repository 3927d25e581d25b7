//! Text commands: `join`, `leave` and `ping` behind the configured prefix.
//!
//! Matching is case-insensitive over the whole message text; anything else in
//! the channel is ignored.

use tracing::{debug, error, info, trace, warn};
use twilight_model::id::Id;
use twilight_model::id::marker::GuildMarker;

use crate::{BotContext, Error};
use crate::models::{InboundMessage, Session};
use crate::platforms::JoinOptions;

pub const LEFT_REPLY: &str = "✅ Left the voice channel!";
pub const NOT_CONNECTED_REPLY: &str = "❌ I'm not in a voice channel!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    Join,
    Leave,
    Ping,
}

impl VoiceCommand {
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let folded = text.to_lowercase();
        let name = folded.strip_prefix(prefix.to_lowercase().as_str())?;
        match name {
            "join" => Some(VoiceCommand::Join),
            "leave" => Some(VoiceCommand::Leave),
            "ping" => Some(VoiceCommand::Ping),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VoiceCommand::Join => "join",
            VoiceCommand::Leave => "leave",
            VoiceCommand::Ping => "ping",
        }
    }
}

pub fn joined_reply(channel_name: &str, prefix: &str) -> String {
    format!("✅ Joined **{channel_name}**! I'll stay here until you use `{prefix}leave`.")
}

pub fn ping_reply(latency_ms: i64, connected: bool) -> String {
    let voice = if connected { "Connected 🔊" } else { "Not connected 🔇" };
    format!("🏓 Pong! Latency: {latency_ms}ms | Voice: {voice}")
}

/// Entry point for every inbound chat message.
pub async fn handle_message(ctx: &mut BotContext, msg: &InboundMessage) -> Result<(), Error> {
    if msg.author_is_bot {
        trace!("Ignoring bot message from {}", msg.author_id);
        return Ok(());
    }
    let Some(guild_id) = msg.guild_id else {
        trace!("Ignoring DM from {}", msg.author_id);
        return Ok(());
    };
    let Some(command) = VoiceCommand::parse(&msg.content, &ctx.command_prefix) else {
        return Ok(());
    };

    debug!("Command '{}' from {} in guild {}", command.name(), msg.author_id, guild_id);

    match command {
        VoiceCommand::Join => {
            if let Err(e) = handle_join(ctx, msg, guild_id).await {
                error!("Join error: {e}");
            }
            Ok(())
        }
        VoiceCommand::Leave => handle_leave(ctx, msg).await,
        VoiceCommand::Ping => handle_ping(ctx, msg).await,
    }
}

/// Leaves whatever session is recorded. Failures from the voice layer are only
/// logged; the slot is always emptied. Returns whether there was a session.
pub async fn terminate_session(ctx: &mut BotContext) -> bool {
    let Some(guild_id) = ctx.session.guild_id() else {
        return false;
    };
    if let Err(e) = ctx.voice.disconnect(guild_id).await {
        warn!("Could not leave voice in guild {guild_id} => {e}");
    }
    ctx.session.clear();
    true
}

async fn handle_join(
    ctx: &mut BotContext,
    msg: &InboundMessage,
    guild_id: Id<GuildMarker>,
) -> Result<(), Error> {
    terminate_session(ctx).await;

    let channel = ctx
        .directory
        .voice_channel_of(guild_id, msg.author_id)
        .ok_or_else(|| Error::NotInVoiceChannel(msg.author_id.to_string()))?;

    ctx.session.begin_connect(guild_id, channel.id);

    let voice = ctx.voice.clone();
    let attempt = tokio::time::timeout(
        ctx.join_timeout,
        voice.connect(guild_id, channel.id, JoinOptions::default()),
    )
    .await;
    let outcome = match attempt {
        Ok(result) => result,
        Err(elapsed) => Err(Error::from(elapsed)),
    };

    if let Err(e) = outcome {
        // Never keep a half-open handle around.
        ctx.session.clear();
        if let Err(cleanup) = voice.disconnect(guild_id).await {
            debug!("Cleanup after failed join in guild {guild_id} => {cleanup}");
        }
        return Err(e);
    }

    if let Err(e) = voice.subscribe(guild_id, ctx.audio_sink.clone()).await {
        error!("Audio sink subscription failed in guild {guild_id} => {e}");
    }

    ctx.session.activate(Session {
        guild_id,
        channel_id: channel.id,
        channel_name: channel.name.clone(),
    });

    let text = joined_reply(&channel.name, &ctx.command_prefix);
    ctx.replier.reply(msg.channel_id, msg.id, &text).await?;
    info!("🔊 Joined VC: {}", channel.name);
    Ok(())
}

async fn handle_leave(ctx: &mut BotContext, msg: &InboundMessage) -> Result<(), Error> {
    if terminate_session(ctx).await {
        ctx.replier.reply(msg.channel_id, msg.id, LEFT_REPLY).await?;
        info!("🔇 Left voice channel");
    } else {
        ctx.replier.reply(msg.channel_id, msg.id, NOT_CONNECTED_REPLY).await?;
    }
    Ok(())
}

async fn handle_ping(ctx: &mut BotContext, msg: &InboundMessage) -> Result<(), Error> {
    let now = (ctx.clock)();
    let latency = (now - msg.created_at).num_milliseconds().max(0);
    let text = ping_reply(latency, ctx.session.is_active());
    ctx.replier.reply(msg.channel_id, msg.id, &text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mockall::predicate::eq;

    use super::*;
    use crate::BotConfig;
    use crate::platforms::{MockChatReplier, MockVoiceDirectory, MockVoiceGateway, VoiceGateway};
    use crate::session::SessionState;
    use crate::test_utils::fakes::ConnectBehavior;
    use crate::test_utils::helpers::*;

    #[test]
    fn parse_is_case_insensitive_and_exact() {
        for text in ["!join", "!JOIN", "!Join", "!jOiN"] {
            assert_eq!(VoiceCommand::parse(text, "!"), Some(VoiceCommand::Join), "{text}");
        }
        assert_eq!(VoiceCommand::parse("!LeAvE", "!"), Some(VoiceCommand::Leave));
        assert_eq!(VoiceCommand::parse("!PING", "!"), Some(VoiceCommand::Ping));

        assert_eq!(VoiceCommand::parse("!join now", "!"), None);
        assert_eq!(VoiceCommand::parse(" !join", "!"), None);
        assert_eq!(VoiceCommand::parse("join", "!"), None);
        assert_eq!(VoiceCommand::parse("!", "!"), None);
        assert_eq!(VoiceCommand::parse("?join", "?"), Some(VoiceCommand::Join));
    }

    #[test]
    fn reply_texts() {
        assert_eq!(
            joined_reply("Lounge", "!"),
            "✅ Joined **Lounge**! I'll stay here until you use `!leave`."
        );
        assert_eq!(ping_reply(42, true), "🏓 Pong! Latency: 42ms | Voice: Connected 🔊");
        assert_eq!(ping_reply(0, false), "🏓 Pong! Latency: 0ms | Voice: Not connected 🔇");
    }

    #[tokio::test]
    async fn join_connects_deafened_and_replies() {
        let mut h = harness();

        handle_message(&mut h.ctx, &guild_message("!join")).await.unwrap();

        assert_eq!(
            h.voice.connects(),
            vec![(guild(), channel(LOUNGE), JoinOptions { self_deaf: true, self_mute: false })]
        );
        assert_eq!(h.voice.subscriptions(), vec![guild()]);
        assert_eq!(h.ctx.audio_sink.subscription_count(), 1);
        assert_eq!(
            h.ctx.session.active().map(|s| s.channel_name.as_str()),
            Some("Lounge")
        );
        assert_eq!(h.replier.contents(), vec![joined_reply("Lounge", "!")]);

        let sent = &h.replier.sent()[0];
        assert_eq!(sent.channel_id, channel(TEXT_CHANNEL));
        assert_eq!(sent.message_id, guild_message("!join").id);
    }

    #[tokio::test]
    async fn second_join_replaces_the_first_session() {
        let mut h = harness();

        handle_message(&mut h.ctx, &guild_message("!join")).await.unwrap();
        h.directory.place(guild(), member(), channel(STUDIO), "Studio");
        handle_message(&mut h.ctx, &guild_message("!JOIN")).await.unwrap();

        assert_eq!(h.voice.disconnects(), vec![guild()]);
        assert_eq!(h.voice.live_calls(), 1);
        assert_eq!(h.voice.current_channel(guild()).await, Some(channel(STUDIO)));
        assert_eq!(h.ctx.session.active().map(|s| s.channel_id), Some(channel(STUDIO)));
    }

    #[tokio::test]
    async fn join_without_voice_channel_is_logged_not_replied() {
        let mut h = harness();
        h.directory.remove(guild(), member());

        handle_message(&mut h.ctx, &guild_message("!join")).await.unwrap();

        assert!(h.voice.connects().is_empty());
        assert!(h.replier.sent().is_empty());
        assert!(h.ctx.session.is_absent());
    }

    #[tokio::test]
    async fn failed_join_clears_the_slot() {
        let mut h = harness();
        h.voice.set_behavior(ConnectBehavior::Fail("missing CONNECT permission".into()));

        handle_message(&mut h.ctx, &guild_message("!join")).await.unwrap();

        assert!(h.ctx.session.is_absent());
        assert!(h.replier.sent().is_empty());
        assert!(h.voice.subscriptions().is_empty());
        // best-effort teardown of the half-open attempt
        assert_eq!(h.voice.disconnects(), vec![guild()]);
    }

    #[tokio::test(start_paused = true)]
    async fn join_times_out_after_the_configured_deadline() {
        let config = BotConfig::default().with_join_timeout_secs(Some(30));
        let mut h = harness_with_config(&config);
        h.voice.set_behavior(ConnectBehavior::Hang);

        let started = tokio::time::Instant::now();
        handle_message(&mut h.ctx, &guild_message("!join")).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(h.ctx.session.state(), &SessionState::Absent);
        assert!(h.replier.sent().is_empty());
    }

    #[tokio::test]
    async fn leave_with_session_then_ping_reports_not_connected() {
        let mut h = harness();
        h.ctx.clock = || fixed_time(1_700_000_000_120);

        handle_message(&mut h.ctx, &guild_message("!join")).await.unwrap();
        handle_message(&mut h.ctx, &guild_message("!leave")).await.unwrap();
        assert!(h.ctx.session.is_absent());
        assert_eq!(h.voice.live_calls(), 0);

        handle_message(&mut h.ctx, &guild_message("!ping")).await.unwrap();
        let replies = h.replier.contents();
        assert_eq!(replies[1], LEFT_REPLY);
        assert_eq!(replies[2], ping_reply(120, false));
    }

    #[tokio::test]
    async fn leave_without_session_changes_nothing() {
        let mut h = harness();

        handle_message(&mut h.ctx, &guild_message("!leave")).await.unwrap();

        assert_eq!(h.replier.contents(), vec![NOT_CONNECTED_REPLY.to_string()]);
        assert!(h.voice.disconnects().is_empty());
        assert!(h.ctx.session.is_absent());
    }

    #[tokio::test]
    async fn ping_reports_connected_and_clamps_clock_skew() {
        let mut h = harness();
        handle_message(&mut h.ctx, &guild_message("!join")).await.unwrap();

        // message "created" after we handle it
        h.ctx.clock = || fixed_time(1_699_999_999_000);
        handle_message(&mut h.ctx, &guild_message("!Ping")).await.unwrap();

        assert_eq!(h.replier.contents().last().unwrap(), &ping_reply(0, true));
    }

    #[tokio::test]
    async fn bots_dms_and_chatter_are_ignored() {
        let mut h = harness();

        let mut from_bot = guild_message("!join");
        from_bot.author_is_bot = true;
        handle_message(&mut h.ctx, &from_bot).await.unwrap();

        let mut dm = guild_message("!ping");
        dm.guild_id = None;
        handle_message(&mut h.ctx, &dm).await.unwrap();

        handle_message(&mut h.ctx, &guild_message("hello there")).await.unwrap();

        assert!(h.voice.connects().is_empty());
        assert!(h.replier.sent().is_empty());
    }

    #[tokio::test]
    async fn custom_prefix_is_honoured_in_matching_and_reply() {
        let config = BotConfig::default().with_command_prefix(Some("vc.".into()));
        let mut h = harness_with_config(&config);

        handle_message(&mut h.ctx, &guild_message("!join")).await.unwrap();
        assert!(h.voice.connects().is_empty());

        handle_message(&mut h.ctx, &guild_message("VC.JOIN")).await.unwrap();
        assert_eq!(h.replier.contents(), vec![joined_reply("Lounge", "vc.")]);
    }

    #[tokio::test]
    async fn leave_survives_voice_layer_errors() {
        let mut voice = MockVoiceGateway::new();
        voice
            .expect_disconnect()
            .with(eq(guild()))
            .times(1)
            .returning(|_| Err(Error::Voice("gateway closed".into())));

        let mut replier = MockChatReplier::new();
        replier
            .expect_reply()
            .withf(|_, _, content| content.to_string() == LEFT_REPLY)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut ctx = BotContext::new(
            Arc::new(voice),
            Arc::new(replier),
            Arc::new(MockVoiceDirectory::new()),
            &BotConfig::default(),
        );
        ctx.session.begin_connect(guild(), channel(LOUNGE));
        ctx.session.activate(Session {
            guild_id: guild(),
            channel_id: channel(LOUNGE),
            channel_name: "Lounge".into(),
        });

        handle_message(&mut ctx, &guild_message("!leave")).await.unwrap();
        assert!(ctx.session.is_absent());
    }

    #[tokio::test]
    async fn sink_failure_does_not_abort_join() {
        let mut voice = MockVoiceGateway::new();
        voice.expect_connect().times(1).returning(|_, _, _| Ok(()));
        voice
            .expect_subscribe()
            .times(1)
            .returning(|_, _| Err(Error::Voice("driver offline".into())));

        let mut replier = MockChatReplier::new();
        replier.expect_reply().times(1).returning(|_, _, _| Ok(()));

        let mut directory = MockVoiceDirectory::new();
        directory.expect_voice_channel_of().returning(|_, _| {
            Some(crate::models::VoiceChannelRef { id: channel(LOUNGE), name: "Lounge".into() })
        });

        let mut ctx = BotContext::new(
            Arc::new(voice),
            Arc::new(replier),
            Arc::new(directory),
            &BotConfig::default(),
        );

        handle_message(&mut ctx, &guild_message("!join")).await.unwrap();
        assert!(ctx.session.is_active());
    }
}
