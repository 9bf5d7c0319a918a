//! Smalltalk bot - IRC small-talk companion
//!
//! Joins a channel, reaches out to someone after a quiet spell, and walks a
//! fixed conversation graph with whoever answers first.

mod config;
mod irc;
mod nick;
mod phrases;
mod runtime;
mod state_machine;
mod timer;

use clap::Parser;
use config::{BotConfig, Cli};
use phrases::PhraseCatalog;
use rand::rngs::StdRng;
use rand::SeedableRng;
use runtime::DialogueRuntime;
use state_machine::TransitionTable;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const QUIT_MESSAGE: &str = "Goodbye";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smalltalk_bot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = BotConfig::from_cli(Cli::parse())?;

    let table = Arc::new(TransitionTable::standard()?);

    let mut catalog = PhraseCatalog::standard();
    if let Some(path) = &config.phrases_path {
        tracing::info!(path = %path.display(), "Loading phrase overrides");
        catalog = catalog.with_overrides(PhraseCatalog::load_overrides(path)?);
    }
    catalog.validate(&table)?;
    let catalog = Arc::new(catalog);

    // Connect
    let connection = irc::connect(
        &config.server,
        &config.nickname,
        &config.channel,
        irc::ReconnectPolicy::default(),
    )
    .await?;
    let transport = connection.transport;

    let runtime = DialogueRuntime::new(
        config.channel.clone(),
        table,
        catalog,
        config.timings,
        transport.clone(),
        Box::new(StdRng::from_entropy()),
        connection.inbound_rx,
    );

    tokio::select! {
        result = runtime.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    if let Err(e) = transport.quit(QUIT_MESSAGE).await {
        tracing::warn!(error = %e, "Failed to send QUIT");
    }
    drop(transport);
    connection.tasks.finish(SHUTDOWN_GRACE).await;

    Ok(())
}
