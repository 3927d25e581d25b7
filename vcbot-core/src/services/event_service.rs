use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tracing::{debug, error, info};
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;

use crate::BotContext;
use crate::models::PlatformEvent;
use crate::services::command_dispatcher::{handle_message, terminate_session};
use crate::services::voice_observer::handle_voice_state;

/// Single consumer of the platform event channel. Owns the bot context, so
/// handlers run one at a time and the session slot needs no lock.
pub struct VoiceEventService {
    ctx: BotContext,
}

impl VoiceEventService {
    pub fn new(ctx: BotContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    /// Runs until every sender is gone or `shutdown` fires (or its sender is
    /// dropped), then leaves voice and hands the context back.
    pub async fn run(
        mut self,
        mut rx: UnboundedReceiver<PlatformEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> BotContext {
        info!("VoiceEventService: Started, listening for platform events");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("VoiceEventService: Shutdown requested");
                    break;
                }
                maybe_event = rx.recv() => match maybe_event {
                    Some(event) => tokio::select! {
                        biased;
                        _ = &mut shutdown => {
                            info!("VoiceEventService: Shutdown requested while handling an event");
                            break;
                        }
                        _ = self.dispatch_event(event) => {}
                    },
                    None => break,
                },
            }
        }

        if terminate_session(&mut self.ctx).await {
            info!("VoiceEventService: Left voice channel on shutdown");
        }
        info!("VoiceEventService: Shutting down listener loop");
        self.ctx
    }

    pub async fn dispatch_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::Ready { user_id, user_name } => {
                self.handle_ready(user_id, &user_name);
            }
            PlatformEvent::MessageCreate(msg) => {
                if let Err(e) = handle_message(&mut self.ctx, &msg).await {
                    error!("VoiceEventService: message {} failed => {:?}", msg.id, e);
                }
            }
            PlatformEvent::VoiceStateUpdate(change) => {
                if handle_voice_state(&mut self.ctx, &change).await {
                    debug!("VoiceEventService: session cleared by voice state update");
                }
            }
        }
    }

    fn handle_ready(&mut self, user_id: Id<UserMarker>, user_name: &str) {
        if let Some(known) = self.ctx.bot_user_id {
            if known != user_id {
                error!("READY reports user {user_id}, but voice was set up for {known}");
            }
        }
        self.ctx.bot_user_id = Some(user_id);

        let prefix = &self.ctx.command_prefix;
        info!("✅ Logged in as {user_name}!");
        info!("📢 Use {prefix}join");
        info!("📢 Use {prefix}leave");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::unbounded_channel;
    use twilight_model::id::Id;

    use super::*;
    use crate::BotConfig;
    use crate::services::command_dispatcher::{LEFT_REPLY, NOT_CONNECTED_REPLY};
    use crate::test_utils::fakes::ConnectBehavior;
    use crate::test_utils::helpers::*;

    #[tokio::test]
    async fn ready_records_the_bot_identity() {
        let mut h = harness();
        h.ctx.bot_user_id = None;
        let mut svc = VoiceEventService::new(h.ctx);

        svc.dispatch_event(PlatformEvent::Ready {
            user_id: Id::new(BOT),
            user_name: "vcbot".into(),
        })
        .await;

        assert_eq!(svc.context().bot_user_id, Some(Id::new(BOT)));
    }

    #[tokio::test]
    async fn events_are_handled_in_order_and_shutdown_leaves_voice() {
        let h = harness();
        let (tx, rx) = unbounded_channel();

        tx.send(PlatformEvent::MessageCreate(guild_message("!join"))).unwrap();
        tx.send(PlatformEvent::MessageCreate(guild_message("!leave"))).unwrap();
        tx.send(PlatformEvent::MessageCreate(guild_message("!leave"))).unwrap();
        tx.send(PlatformEvent::MessageCreate(guild_message("!join"))).unwrap();
        drop(tx);

        let (_stop, stop_rx) = oneshot::channel();
        let ctx = VoiceEventService::new(h.ctx).run(rx, stop_rx).await;

        let replies = h.replier.contents();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[1], LEFT_REPLY);
        assert_eq!(replies[2], NOT_CONNECTED_REPLY);

        assert!(ctx.session.is_absent());
        assert_eq!(h.voice.live_calls(), 0);
        assert_eq!(h.voice.disconnects().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_signal_stops_the_loop_and_leaves_voice() {
        let h = harness();
        let voice = h.voice.clone();
        let (tx, rx) = unbounded_channel();
        let (stop, stop_rx) = oneshot::channel();

        let task = tokio::spawn(VoiceEventService::new(h.ctx).run(rx, stop_rx));
        tx.send(PlatformEvent::MessageCreate(guild_message("!join"))).unwrap();
        while voice.live_calls() == 0 {
            tokio::task::yield_now().await;
        }

        stop.send(()).unwrap();
        let ctx = tokio_test::assert_ok!(task.await);

        assert!(ctx.session.is_absent());
        assert_eq!(voice.live_calls(), 0);
        // the sender is still alive; only the signal ended the loop
        drop(tx);
    }

    #[tokio::test]
    async fn voice_state_updates_reach_the_observer() {
        let h = harness();
        let voice = h.voice.clone();
        let mut svc = VoiceEventService::new(h.ctx);

        svc.dispatch_event(PlatformEvent::MessageCreate(guild_message("!join"))).await;
        assert!(svc.context().session.is_active());

        voice.process_voice_state(&bot_left_voice());
        svc.dispatch_event(PlatformEvent::VoiceStateUpdate(bot_left_voice())).await;
        assert!(svc.context().session.is_absent());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_pending_join() {
        let h = harness_with_config(&BotConfig::default().with_join_timeout_secs(Some(3600)));
        h.voice.set_behavior(ConnectBehavior::Hang);
        let voice = h.voice.clone();
        let (tx, rx) = unbounded_channel();
        let (stop, stop_rx) = oneshot::channel();

        let task = tokio::spawn(VoiceEventService::new(h.ctx).run(rx, stop_rx));
        tx.send(PlatformEvent::MessageCreate(guild_message("!join"))).unwrap();
        while voice.connects().is_empty() {
            tokio::task::yield_now().await;
        }

        let started = tokio::time::Instant::now();
        stop.send(()).unwrap();
        let ctx = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("service kept waiting on the join")
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(ctx.session.is_absent());
        assert_eq!(voice.disconnects(), vec![guild()]);
        assert!(h.replier.sent().is_empty());
    }
}
