use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rotogram::catalog::JsonCatalog;
use rotogram::channel::http::{HttpBroadcastChannel, HttpChannelConfig};
use rotogram::config::Config;
use rotogram::error::Error;
use rotogram::format::PlainFormatter;
use rotogram::scheduler::{
    DispatcherConfig, PublishDispatcher, SystemClock, TriggerConfig, TriggerScheduler,
};
use rotogram::storage::{AuditLog, StateStore};

#[derive(Parser)]
#[command(
    name = "rotogram",
    version,
    about = "Deterministic content rotation publisher for broadcast channels",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (TOML); falls back to environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish one random unposted item, outside the rotation
    Random,

    /// Publish a specific item by id
    Item {
        /// Catalog item id
        id: String,
    },

    /// Publish today's whole plan in one run
    Batch,

    /// Publish the next slot of today's plan
    Single,

    /// Show the upcoming daily plans without publishing
    Preview {
        /// Number of days to forecast
        #[arg(short, long, default_value = "3")]
        days: usize,
    },

    /// Run the trigger loop until interrupted
    Run,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_format, cli.verbose) {
        eprintln!("failed to initialize logging: {e:#}");
        std::process::exit(1);
    }

    if let Err(err) = run(cli).await {
        tracing::error!(category = ?err.category(), error = %err, "rotogram failed");
        // Machine-readable failure payload on stderr, non-zero exit
        eprintln!("{}", error_payload(&err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> rotogram::error::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    config.validate()?;

    tracing::info!("rotogram starting");

    match cli.command {
        Commands::Random => {
            let dispatcher = build_dispatcher(&config)?;
            let outcome = dispatcher.publish_random().await?;
            print_json(&outcome)?;
        }

        Commands::Item { id } => {
            tracing::info!(item = %id, "Publishing item by id");
            let dispatcher = build_dispatcher(&config)?;
            let outcome = dispatcher.publish_item(&id).await?;
            print_json(&outcome)?;
        }

        Commands::Batch => {
            let dispatcher = build_dispatcher(&config)?;
            let outcome = dispatcher.publish_batch().await?;
            print_json(&outcome)?;
        }

        Commands::Single => {
            let dispatcher = build_dispatcher(&config)?;
            let outcome = dispatcher.publish_next().await?;
            print_json(&outcome)?;
        }

        Commands::Preview { days } => {
            let dispatcher = build_dispatcher(&config)?;
            let plans = dispatcher.preview(days).await;
            print_json(&plans)?;
        }

        Commands::Run => {
            run_loop(&config).await?;
        }
    }

    tracing::info!("rotogram completed");
    Ok(())
}

fn error_payload(err: &Error) -> serde_json::Value {
    serde_json::json!({
        "error": err.to_string(),
        "category": err.category(),
        "recoverable": err.is_recoverable(),
    })
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("rotogram=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("rotogram=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    }
}

fn build_dispatcher(config: &Config) -> Result<PublishDispatcher> {
    let catalog = JsonCatalog::from_file(&config.storage.catalog_path)?;
    tracing::info!(
        items = catalog.len(),
        path = %config.storage.catalog_path.display(),
        "Catalog loaded"
    );

    let mut channel_config = HttpChannelConfig::new(&config.channel.endpoint)
        .with_timeout(config.channel.timeout_secs)
        .with_max_retries(config.channel.max_retries);
    if !config.channel.auth_token.is_empty() {
        channel_config = channel_config.with_auth_token(&config.channel.auth_token);
    }
    let channel = HttpBroadcastChannel::new(channel_config)
        .map_err(|e| anyhow::anyhow!("channel setup failed: {e}"))?;

    let dispatcher_config = DispatcherConfig::new(config.families())
        .with_posts_per_day(config.rotation.posts_per_day)
        .with_reset_on_end(config.rotation.reset_on_end)
        .with_inter_post_delay(config.inter_post_delay())
        .with_thread_resolution(
            Duration::from_secs(config.channel.thread_resolve_timeout_secs),
            Duration::from_secs(config.channel.thread_resolve_interval_secs),
        );

    Ok(PublishDispatcher::new(
        Arc::new(catalog),
        Arc::new(channel),
        Arc::new(PlainFormatter),
        Arc::new(SystemClock),
        StateStore::new(&config.storage.state_path),
        AuditLog::new(&config.storage.audit_path).with_max_entries(config.storage.audit_max_entries),
        dispatcher_config,
    ))
}

async fn run_loop(config: &Config) -> Result<()> {
    let dispatcher = Arc::new(build_dispatcher(config)?);
    let trigger_config = TriggerConfig {
        windows: config.rotation.windows.clone(),
    };

    let scheduler = Arc::new(
        TriggerScheduler::new(trigger_config, dispatcher, Arc::new(SystemClock))
            .context("invalid trigger configuration")?,
    );

    let loop_handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, stopping trigger loop");

    scheduler.stop().await;
    loop_handle
        .await
        .context("trigger loop panicked")?
        .map_err(|e| anyhow::anyhow!("trigger loop failed: {e}"))?;

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotogram::channel::ChannelError;

    #[test]
    fn test_error_payload_shape() {
        let err = Error::Channel(ChannelError::Other("connection reset".to_string()));
        let payload = error_payload(&err);

        assert_eq!(payload["category"], "channel");
        assert_eq!(payload["recoverable"], true);
        assert!(payload["error"]
            .as_str()
            .unwrap()
            .contains("connection reset"));
    }
}
