mod commands;
mod schedule;
mod sources;

#[cfg(test)]
mod tests;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "yjtrack")]
#[command(about = "Queensland youth justice statistics tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run collection tasks, or a single task by name
    Run {
        /// Restrict the run to one task
        task: Option<String>,

        /// Show what would run without collecting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Show current health status per task
    Health,
    /// Show recent run records
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show alerts (open only by default)
    Alerts {
        /// Include resolved alerts
        #[arg(long)]
        all: bool,
    },
    /// Database administration
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run the cron scheduler in the foreground
    Schedule,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations to the primary store
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = yjtrack_core::load_app_config_from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run { task, dry_run }) => {
            commands::run(&config, task.as_deref(), dry_run).await
        }
        Some(Commands::Health) => commands::health(&config).await,
        Some(Commands::Runs { limit }) => commands::runs(&config, limit).await,
        Some(Commands::Alerts { all }) => commands::alerts(&config, all).await,
        Some(Commands::Db {
            command: DbCommands::Migrate,
        }) => commands::migrate(&config).await,
        Some(Commands::Schedule) => schedule::run_scheduler(config).await,
        None => {
            println!("yjtrack: use `run`, `health`, `runs`, `alerts`, `db migrate`, or `schedule`");
            Ok(())
        }
    }
}
