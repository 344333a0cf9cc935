mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hearth::config::HearthConfig;

#[derive(Parser)]
#[command(name = "hearth", version, about = "Memory and wake-context store for a home assistant agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show fact and anticipation statistics
    Stats,
    /// List active facts
    Facts {
        /// Only facts in this category (user, home, device, routine, preference, architecture)
        #[arg(long)]
        category: Option<String>,
    },
    /// Recall facts by keyword and, with an embedder configured, by meaning
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List anticipations
    Anticipations {
        /// Include resolved, expired, and deleted anticipations
        #[arg(long)]
        all: bool,
    },
    /// Embed every fact that has no embedding yet
    Backfill,
    /// Print the context block the agent would receive for a message
    Context {
        message: String,
        /// Subject tag to pull keyed facts for (repeatable)
        #[arg(long = "subject")]
        subjects: Vec<String>,
        /// Entity that changed state, for anticipation matching
        #[arg(long)]
        entity: Option<String>,
        /// New state of --entity
        #[arg(long, requires = "entity")]
        state: Option<String>,
        #[arg(long)]
        zone: Option<String>,
        /// Zone transition, e.g. enter or leave
        #[arg(long, requires = "zone")]
        zone_action: Option<String>,
        #[arg(long)]
        event: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = HearthConfig::load()?;

    // Log to stderr so stdout carries only command output.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Stats => cli::stats::stats(&config)?,
        Command::Facts { category } => cli::facts::facts(&config, category.as_deref())?,
        Command::Search { query, limit } => cli::search::search(&config, &query, limit).await?,
        Command::Anticipations { all } => cli::anticipations::anticipations(&config, all)?,
        Command::Backfill => cli::backfill::backfill(&config).await?,
        Command::Context {
            message,
            subjects,
            entity,
            state,
            zone,
            zone_action,
            event,
        } => {
            let wake = cli::context::WakeArgs {
                entity,
                state,
                zone,
                zone_action,
                event,
            };
            cli::context::context(&config, &message, subjects, wake).await?
        }
    }

    Ok(())
}
