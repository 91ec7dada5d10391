use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slack_export::api::SlackClient;
use slack_export::config::ExportConfig;
use slack_export::export::{RateLimitedCaller, RetryPolicy, ThreadSleeper};
use slack_export::exporter::{run_export, ExportOptions};
use slack_export::workspace::Selection;

/// Export Slack history to per-day JSON files
#[derive(Debug, Parser)]
#[command(name = "slack-export", version, about)]
struct Cli {
    /// Slack API token
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    token: String,

    /// Cookie header to send with browser-session (xoxc) tokens
    #[arg(long)]
    cookie: Option<String>,

    /// Export the given Public Channels (all when no names are given)
    #[arg(long, num_args = 0.., value_name = "CHANNEL_NAME")]
    public_channels: Option<Vec<String>>,

    /// Export the given Private Channels / Group DMs (all when no names are given)
    #[arg(long, num_args = 0.., value_name = "GROUP_NAME")]
    groups: Option<Vec<String>>,

    /// Export 1:1 DMs with the given users (all when no names are given)
    #[arg(long, num_args = 0.., value_name = "USER_NAME")]
    direct_messages: Option<Vec<String>>,

    /// List the conversations that would be exported, without fetching history
    #[arg(long)]
    dry_run: bool,

    /// Do not export archived conversations
    #[arg(long)]
    exclude_archived: bool,

    /// Only export public channels the token owner is a member of
    #[arg(long)]
    exclude_non_member: bool,

    /// Directory in which the timestamped export directory is created
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Config file (defaults to <config dir>/slack-export/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Messages per history page (1-1000)
    #[arg(long)]
    page_size: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = ExportConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }
    config.validate();

    let client = SlackClient::new(&config, cli.token, cli.cookie)?;
    let caller = RateLimitedCaller::new(RetryPolicy::from_config(&config.rate_limit), ThreadSleeper);

    let root = cli
        .output_dir
        .join(format!("{}-slack_export", Local::now().format("%Y%m%d-%H%M%S")));

    let options = ExportOptions {
        root,
        page_size: config.page_size,
        dry_run: cli.dry_run,
        selection: Selection {
            public_channels: cli.public_channels,
            groups: cli.groups,
            direct_messages: cli.direct_messages,
            exclude_archived: cli.exclude_archived,
            exclude_non_member: cli.exclude_non_member,
        },
    };

    let report = run_export(&client, &caller, &config, &options)?;

    if !options.dry_run {
        tracing::info!(
            conversations = report.conversations.len(),
            messages = report.total_messages(),
            "Export written to {}",
            options.root.display()
        );
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
