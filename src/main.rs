//! # Restock CLI
//!
//! Host for the scheduled replenishment and notification engine.
//!
//! Usage:
//!   restock run                        # Start the engine until Ctrl+C
//!   restock run-job auto_request       # Run one job now (per-day guard applies)
//!   restock run-job reassurance --force
//!   restock status                     # Last run / last error per job
//!   restock sweep                      # Apply retention immediately
//!   restock config show                # Show configuration (secrets masked)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use restock_core::RestockConfig;
use restock_core::traits::InventoryStore;
use restock_scheduler::{Engine, RunStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "restock",
    version,
    about = "📦 Restock — scheduled replenishment requests and inventory alerts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the engine and run until Ctrl+C
    Run,

    /// Run a single job immediately
    RunJob {
        /// auto_request, reassurance, missing_counts or data_cleanup
        job: String,

        /// Run even if the job already completed today, re-sending its messages
        #[arg(short, long)]
        force: bool,
    },

    /// Show per-job health
    Status,

    /// Delete records older than the retention horizon now
    Sweep,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Validate configuration
    Check,
    /// Write a default config file if none exists
    Init,
}

fn masked(config: &RestockConfig) -> RestockConfig {
    let mut config = config.clone();
    if config.telegram.bot_token.is_some() {
        config.telegram.bot_token = Some("***".into());
    }
    if let Some(webhook) = config.webhook.as_mut() {
        if webhook.secret.is_some() {
            webhook.secret = Some("***".into());
        }
    }
    config
}

fn build_engine(config: &RestockConfig) -> Result<Engine> {
    let store = restock_store::open_store(&config.store)
        .with_context(|| format!("opening store at {}", config.store.path))?;
    let notifier = restock_channels::create_notifier(config);
    let engine = Engine::new(config.clone(), Arc::new(store), notifier)?;
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "restock=debug,restock_core=debug,restock_store=debug,restock_channels=debug,restock_scheduler=debug"
    } else {
        "restock=info,restock_scheduler=info,restock_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(RestockConfig::default_path);
    if let Commands::Config { action: ConfigAction::Init } = cli.command {
        if config_path.exists() {
            println!("Config already exists: {}", config_path.display());
        } else {
            RestockConfig::default().save_to(&config_path)?;
            println!("✅ Config saved to: {}", config_path.display());
            println!("\n📋 Next steps:");
            println!("  1. Set channel ids under [channels]");
            println!("  2. Set [telegram] bot_token or export RESTOCK_TELEGRAM_TOKEN");
            println!("  3. Check it: restock config check");
        }
        return Ok(());
    }

    let config = if cli.config.is_some() {
        RestockConfig::load_from(&config_path)?
    } else {
        RestockConfig::load()?
    };

    match cli.command {
        Commands::Run => {
            let engine = build_engine(&config)?;
            let status = engine.status();
            println!("📦 Restock v{}", env!("CARGO_PKG_VERSION"));
            println!("   Timezone: {} | Transport: {}", status.timezone, status.notifier);
            if status.test_mode {
                println!("   🧪 Test mode: every message goes to the test channel");
            }
            for job in &status.jobs {
                println!("   ⏰ {:<15} {}", job.job.as_str(), job.trigger);
            }

            engine.start()?;
            println!("\nEngine is running. Press Ctrl+C to stop.");
            tokio::signal::ctrl_c().await?;
            engine.stop().await?;
            println!("\n👋 Engine stopped.");
        }

        Commands::RunJob { job, force } => {
            let engine = build_engine(&config)?;
            match engine.run_now(&job, force).await {
                Ok(outcome) => match outcome.status {
                    RunStatus::Completed => {
                        println!("✅ {} completed for {}", outcome.job, outcome.trigger_date);
                        if let Some(report) = outcome.report {
                            println!("   {report}");
                        }
                    }
                    RunStatus::AlreadyRan => {
                        println!("↩️ {} already ran for {}. Use --force to run again.", outcome.job, outcome.trigger_date);
                    }
                    RunStatus::Failed { error } => println!("❌ {} failed: {error}", outcome.job),
                },
                Err(e) => {
                    println!("❌ {job} failed: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Status => {
            let engine = build_engine(&config)?;
            let status = engine.status();
            println!("📦 Restock status ({})", status.timezone);
            println!("   Test mode: {}", if status.test_mode { "on" } else { "off" });
            println!("   Transport: {}\n", status.notifier);
            for job in &status.jobs {
                let last = job
                    .last_run
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".into());
                println!("  {:<15} {:<22} last run: {last}", job.job.as_str(), job.trigger);
                if let Some(err) = &job.last_error {
                    println!("  {:<15} ❌ {} ({})", "", err.message, err.at.to_rfc3339());
                }
            }
        }

        Commands::Sweep => {
            let store = restock_store::open_store(&config.store)?;
            let tz = config.engine.tz()?;
            let cutoff = restock_scheduler::retention::cutoff(chrono::Utc::now(), tz, &config.retention)?;
            println!("🧹 Deleting records older than {}", cutoff.to_rfc3339());
            let report = restock_scheduler::retention::sweep(&store, cutoff, config.retention.batch_size).await?;
            for (record_type, deleted) in &report.deleted {
                println!("   {record_type:<18} {deleted}");
            }
            println!("✅ {} records deleted from {}", report.total(), store.name());
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let content = toml::to_string_pretty(&masked(&config))?;
                println!("# {}", config_path.display());
                println!("{content}");
            }
            ConfigAction::Check => match config.validate() {
                Ok(()) => println!("✅ Configuration is valid"),
                Err(e) => {
                    println!("❌ {e}");
                    std::process::exit(1);
                }
            },
            ConfigAction::Init => {}
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_secrets() {
        let mut config = RestockConfig::default();
        config.telegram.bot_token = Some("123:secret".into());
        config.webhook = Some(restock_core::config::WebhookConfig {
            outbound_url: "http://localhost/hook".into(),
            secret: Some("shh".into()),
            enabled: true,
        });
        let shown = toml::to_string_pretty(&masked(&config)).unwrap();
        assert!(!shown.contains("123:secret"));
        assert!(!shown.contains("shh"));
    }

    #[test]
    fn test_cli_parses_run_job() {
        let cli = Cli::try_parse_from(["restock", "run-job", "auto_request", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::RunJob { ref job, force: true } if job == "auto_request"));
    }
}
