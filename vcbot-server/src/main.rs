use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use vcbot_core::BotConfig;
use vcbot_core::config::TOKEN_ENV_VAR;
use vcbot_core::liveness::start_liveness_server;
use vcbot_core::platforms::PlatformIntegration;
use vcbot_core::platforms::discord::DiscordPlatform;
use vcbot_core::services::VoiceEventService;

#[derive(Parser, Debug, Clone)]
#[command(name = "vcbot")]
#[command(author, version, about = "vcbot - keeps a Discord bot parked in a voice channel")]
struct Args {
    /// Port for the keep-alive HTTP endpoint
    #[arg(long)]
    port: Option<u16>,

    /// How long to wait for a voice connection to become ready
    #[arg(long)]
    join_timeout_secs: Option<u64>,

    /// Prefix for the chat commands
    #[arg(long)]
    prefix: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vcbot_core=debug"));
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = BotConfig::from_env()
        .with_http_port(args.port)
        .with_join_timeout_secs(args.join_timeout_secs)
        .with_command_prefix(args.prefix);
    config.validate()?;
    info!("vcbot starting => {:?}", config);

    let (liveness_task, liveness_stop) = start_liveness_server(config.http_port).await?;

    match config.discord_token.clone() {
        Some(token) => {
            if let Err(e) = run_discord(token, &config).await {
                error!("Discord error: {:?}", e);
                // keep answering uptime checks until someone stops us
                wait_for_ctrl_c().await;
            }
        }
        None => {
            error!("❌ ERROR: No Discord token found!");
            info!("💡 Set {} in the environment (or a .env file)", TOKEN_ENV_VAR);
            wait_for_ctrl_c().await;
        }
    }

    let _ = liveness_stop.send(());
    if let Err(e) = liveness_task.await {
        warn!("Keep-alive task ended abnormally: {:?}", e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {:?}", e);
    }
}

async fn run_discord(token: String, config: &BotConfig) -> anyhow::Result<()> {
    let mut platform = DiscordPlatform::new(token, config.join_timeout);
    platform.connect().await?;

    let ctx = platform.bot_context(config)?;
    let rx = platform
        .take_event_receiver()
        .await
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut service_task = tokio::spawn(VoiceEventService::new(ctx).run(rx, stop_rx));

    tokio::select! {
        _ = wait_for_ctrl_c() => {
            info!("Ctrl-C detected, leaving voice and closing the gateway...");
            let _ = stop_tx.send(());
            if let Err(e) = (&mut service_task).await {
                error!("Event service task failed: {:?}", e);
            }
        }
        res = &mut service_task => {
            if let Err(e) = res {
                error!("Event service task failed: {:?}", e);
            }
            warn!("Event service stopped on its own");
        }
    }

    platform.disconnect().await?;
    Ok(())
}
