use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use nudge_gateway::channels::TelegramChannel;
use nudge_gateway::{Config, Daemon};

/// Nudge - proactive conversational agent for Telegram
#[derive(Parser)]
#[command(name = "nudge", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "NUDGE_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Register the configured webhook URL with Telegram
    SetWebhook {
        /// Public URL; defaults to the configured webhook URL
        url: Option<String>,
    },
    /// Remove the webhook so long polling can be used
    DeleteWebhook,
    /// Load and validate configuration, then print a summary
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,nudge_gateway=info",
        1 => "info,nudge_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let port = cli.port.unwrap_or(config.port);

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::SetWebhook { url } => set_webhook(&config, url).await,
            Command::DeleteWebhook => delete_webhook(&config).await,
            Command::CheckConfig => {
                check_config(&config, port);
                Ok(())
            }
        };
    }

    tracing::info!(port, "starting nudge gateway");

    let daemon = Daemon::new(config, port)?;
    daemon.run().await?;

    Ok(())
}

fn telegram(config: &Config) -> anyhow::Result<TelegramChannel> {
    let token = config
        .telegram
        .bot_token
        .clone()
        .context("TELEGRAM_BOT_TOKEN is not set")?;
    Ok(TelegramChannel::new(token))
}

async fn set_webhook(config: &Config, url: Option<String>) -> anyhow::Result<()> {
    let url = url
        .or_else(|| config.telegram.webhook_url.clone())
        .context("no webhook URL given and NUDGE_WEBHOOK_URL is not set")?;
    let tg = telegram(config)?;

    let me = tg.get_me().await.context("bot token rejected by Telegram")?;
    let secret = config
        .telegram
        .webhook_secret
        .as_ref()
        .map(|s| s.expose_secret().to_string());
    tg.set_webhook(&url, secret.as_deref()).await?;

    println!(
        "Webhook for @{} set to {url}",
        me.username.as_deref().unwrap_or(&me.first_name)
    );
    Ok(())
}

async fn delete_webhook(config: &Config) -> anyhow::Result<()> {
    telegram(config)?.delete_webhook().await?;
    println!("Webhook deleted");
    Ok(())
}

fn check_config(config: &Config, port: u16) {
    let set = |present: bool| if present { "set" } else { "not set" };

    println!("Configuration OK");
    println!("  port:             {port}");
    println!("  llm model:        {}", config.llm.model);
    println!("  llm api url:      {}", config.llm.api_url);
    println!("  llm api key:      {}", set(config.llm.api_key.is_some()));
    println!("  telegram token:   {}", set(config.telegram.bot_token.is_some()));
    println!("  telegram mode:    {}", config.telegram.mode);
    println!(
        "  silence window:   {}s..{}s (poll every {}s)",
        config.proactive.silence_min.as_secs(),
        config.proactive.silence_max.as_secs(),
        config.proactive.poll_interval.as_secs()
    );
    println!("  history budget:   {} chars", config.max_history_chars);
    println!("  default persona:  {}", config.default_persona);
    println!(
        "  inflection:       {}",
        if config.inflection.enabled {
            config.inflection.url.as_str()
        } else {
            "disabled"
        }
    );
}
