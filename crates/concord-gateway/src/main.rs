//! Concord gateway demo client
//!
//! Run with:
//! ```bash
//! DISCORD_TOKEN=... cargo run -p concord-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use concord_common::{try_init_tracing, BotConfig};
use concord_core::Message;
use concord_gateway::{debug, Client, GatewayConfig, GatewayError};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway client stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting Concord gateway client...");

    // Load configuration
    let config = BotConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        shard = config.shard.id,
        shard_count = config.shard.count,
        policy = ?config.cache.policy,
        delegation = ?config.cache.delegation,
        "Configuration loaded"
    );

    let client = Client::builder(GatewayConfig::from(&config))
        .on("MESSAGE_CREATE", |ctx, args| async move {
            if let Some(message) = args.first::<Message>() {
                info!(
                    shard_id = ctx.shard_id(),
                    channel_id = %message.channel_id,
                    author = %message.author.display_name(),
                    "Message received"
                );
            }
        })
        .build()?;

    // Surface the debug channel in the logs
    tokio::spawn(debug::trace_events(client.subscribe_debug()));

    let shard = client.shard(config.shard.id);
    let handle = shard.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            handle.shutdown();
        }
    });

    match shard.run().await {
        Ok(()) => {
            info!("Gateway client stopped");
            Ok(())
        }
        Err(GatewayError::Fatal(code)) => {
            error!(close_code = code.as_u16(), reason = %code, "Gateway refused the session");
            Err(GatewayError::Fatal(code).into())
        }
        Err(e) => Err(e.into()),
    }
}
