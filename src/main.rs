//! Convene - multi-agent conversations in the terminal
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use convene::cli::{StdinFeedback, Supervisor, TerminalObserver};
use convene::{Config, Outcome, ProviderType, Route, SchedulerBuilder};

/// Convene - multi-agent conversations in the terminal
#[derive(Parser, Debug)]
#[command(name = "convene")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file declaring agents and channels
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Sender of the opening message
    #[arg(long, required_unless_present = "print_config")]
    from: Option<String>,

    /// Recipient of the opening message (agent or channel)
    #[arg(long, required_unless_present = "print_config")]
    to: Option<String>,

    /// Opening message
    #[arg(long, short = 'm', required_unless_present = "print_config")]
    message: Option<String>,

    /// Default backend ("openai" or "anthropic")
    #[arg(long, short = 'p')]
    provider: Option<String>,

    /// Default model
    #[arg(long)]
    model: Option<String>,

    /// Seconds to wait before retrying a transient backend failure
    #[arg(long, default_value_t = 60)]
    retry_delay: u64,

    /// Write the chat log as JSON to this file
    #[arg(long)]
    history: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::default_config_toml());
        return Ok(());
    }

    // Build configuration
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load(),
    };

    // Apply CLI overrides
    if let Some(ref provider) = args.provider {
        config.defaults.provider = provider.parse::<ProviderType>()?;
    }
    if let Some(ref model) = args.model {
        config.defaults.model = Some(model.clone());
    }
    if args.debug {
        config.defaults.debug = true;
    }

    init_tracing(config.defaults.debug);

    let (Some(from), Some(to), Some(message)) = (args.from, args.to, args.message) else {
        anyhow::bail!("--from, --to and --message are required");
    };

    let scheduler = SchedulerBuilder::from_config(&config)
        .observer(Arc::new(TerminalObserver::new(config.defaults.debug)))
        .build()?;

    let mut supervisor = Supervisor::new(scheduler, StdinFeedback)
        .with_retry_delay(Duration::from_secs(args.retry_delay));
    if let Some(path) = args.history {
        supervisor = supervisor.with_history(path);
    }

    let outcome = supervisor.start(Route::new(from, to), &message).await?;
    if let Outcome::Failed { route, .. } = &outcome {
        eprintln!("Conversation stopped after a failed turn on {}", route);
    }

    let cost = supervisor.scheduler().total_cost();
    if cost > 0.0 {
        println!("💰 Estimated cost: ${:.4}", cost);
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "convene=debug" } else { "convene=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
