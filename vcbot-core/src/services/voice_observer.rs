//! Keeps the session slot honest when Discord removes the bot from voice on its
//! own (moderator disconnect, channel deleted, ...). Never replies.

use tracing::{debug, trace, warn};

use crate::BotContext;
use crate::models::VoicePresenceChange;

/// Returns true when the slot was cleared.
pub async fn handle_voice_state(ctx: &mut BotContext, change: &VoicePresenceChange) -> bool {
    let Some(bot_id) = ctx.bot_user_id else {
        trace!("Voice state change before READY => ignored");
        return false;
    };
    if change.user_id != bot_id {
        return false;
    }
    if let Some(channel_id) = change.channel_id {
        debug!("Bot voice state now in channel {channel_id}");
        return false;
    }
    let Some(guild_id) = ctx.session.guild_id() else {
        return false;
    };
    if change.guild_id.is_some_and(|g| g != guild_id) {
        debug!("Bot left voice in another guild ({:?}) => session in {guild_id} kept", change.guild_id);
        return false;
    }

    // Events queue up behind a channel switch; the voice layer has already
    // processed everything we are about to see.
    if let Some(current) = ctx.voice.current_channel(guild_id).await {
        debug!("Stale voice disconnect for guild {guild_id}; still in channel {current}");
        return false;
    }

    warn!("⚠️ Bot was disconnected from voice!");
    ctx.session.clear();
    true
}
