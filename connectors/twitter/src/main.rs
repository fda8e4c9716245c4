//! `twitter-stream` - print a Twitter stream as JSON lines.
//!
//! Messages go to stdout, one per line. Connection events are logged to
//! stderr. Ctrl-C stops the stream.

#![forbid(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use twitter_stream::{
    DisconnectReason, FilterParams, StreamMonitor, StreamService, TwitterConfig,
    TwitterStreamClient, UserStreamParams,
};

#[derive(Debug, Parser)]
#[command(name = "twitter-stream", version, about = "Follow a Twitter stream")]
struct Cli {
    /// JSON configuration file. Credentials are read from the environment otherwise.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(flatten)]
    credentials: Credentials,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Credentials {
    #[arg(long, env = "TWITTER_CONSUMER_KEY", hide_env_values = true)]
    consumer_key: Option<String>,

    #[arg(long, env = "TWITTER_CONSUMER_SECRET", hide_env_values = true)]
    consumer_secret: Option<String>,

    #[arg(long, env = "TWITTER_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, env = "TWITTER_ACCESS_TOKEN_SECRET", hide_env_values = true)]
    access_token_secret: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Public statuses matching keywords or users.
    Filter {
        /// Comma-separated keywords.
        #[arg(long, value_delimiter = ',')]
        track: Option<Vec<String>>,

        /// Comma-separated user IDs.
        #[arg(long, value_delimiter = ',')]
        follow: Option<Vec<String>>,

        #[arg(long)]
        stall_warnings: bool,
    },
    /// The authenticated user's stream.
    User {
        /// `followings` or `user`.
        #[arg(long, default_value = "followings")]
        with: String,

        /// Pass `all` to receive all replies.
        #[arg(long)]
        replies: Option<String>,

        #[arg(long)]
        stall_warnings: bool,
    },
}

impl Cli {
    fn load_config(&self) -> Result<TwitterConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?
            }
            None => TwitterConfig::default(),
        };

        let overrides = [
            (&self.credentials.consumer_key, &mut config.consumer_key),
            (&self.credentials.consumer_secret, &mut config.consumer_secret),
            (&self.credentials.access_token, &mut config.access_token),
            (
                &self.credentials.access_token_secret,
                &mut config.access_token_secret,
            ),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                field.clone_from(value);
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn print_message(message: &serde_json::Value) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{message}").and_then(|()| stdout.flush()) {
        tracing::warn!(error = %e, "Failed to write message");
    }
}

fn build_service(client: &TwitterStreamClient, command: Command) -> Result<StreamService> {
    let service = match command {
        Command::Filter {
            track,
            follow,
            stall_warnings,
        } => {
            let params = FilterParams {
                follow,
                track,
                locations: None,
                stall_warnings: stall_warnings.then_some(true),
            };
            client.stream_filter(|msg| print_message(&msg), &params)?
        }
        Command::User {
            with,
            replies,
            stall_warnings,
        } => {
            let params = UserStreamParams {
                stall_warnings: stall_warnings.then_some(true),
                with: Some(with),
                replies,
            };
            client.userstream_user(|msg| print_message(&msg), &params)?
        }
    };

    service.set_connect_callback(|monitor: &StreamMonitor| {
        tracing::info!(connections = monitor.connections(), "Stream connected");
    });
    service.set_disconnect_callback(|monitor: &StreamMonitor, reason: &DisconnectReason| {
        tracing::info!(%reason, connections = monitor.connections(), "Stream disconnected");
    });

    Ok(service)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    let client = TwitterStreamClient::new(&config)?;

    let mut service = build_service(&client, cli.command)?;
    service.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("Interrupted, stopping");
    service.stop().await;

    Ok(())
}
