//! surebet-migrate CLI - copy the surebet tracker database to another PostgreSQL.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use surebet_migrate::error::EXIT_TARGET_ERROR;
use surebet_migrate::{
    Config, MigrateError, MigrationResult, MigrationService, RunOutcome, EXPORT_CONTENT_TYPE,
    EXPORT_FILE_NAME,
};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Conventional exit status after SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "surebet-migrate")]
#[command(about = "Copy the surebet tracker database into another PostgreSQL instance")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (optional; environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a target database accepts connections
    TestConnection {
        /// Target connection string
        #[arg(long, env = "TARGET_DATABASE_URL", hide_env_values = true)]
        target: String,
    },

    /// Drop and recreate the schema on a target, then copy every table
    Migrate {
        /// Target connection string
        #[arg(long, env = "TARGET_DATABASE_URL", hide_env_values = true)]
        target: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Show per-table row counts on the source
    Stats,

    /// Write the source database as a SQL script
    Export {
        /// Output file, or "-" for stdout
        #[arg(short, long, default_value = EXPORT_FILE_NAME)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::from_env()?,
    };

    let service = MigrationService::from_config(&config)?;

    match cli.command {
        Commands::TestConnection { target } => {
            let check = service.test_connection(&target).await;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&check)?);
            } else if check.success {
                println!("Connection successful");
            } else {
                println!(
                    "Connection failed: {}",
                    check.error.as_deref().unwrap_or("unknown error")
                );
            }
            if !check.success {
                return Ok(ExitCode::from(EXIT_TARGET_ERROR));
            }
        }

        Commands::Migrate { target, yes } => {
            if !yes && !confirm_destructive_run()? {
                println!("Migration cancelled");
                return Ok(ExitCode::SUCCESS);
            }

            let result = tokio::select! {
                result = service.execute_migration(&target) => result,
                _ = tokio::signal::ctrl_c() => {
                    // Dropping the run releases the target pool.
                    warn!("Interrupted, migration abandoned");
                    return Ok(ExitCode::from(EXIT_INTERRUPTED));
                }
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_migration(&result);
            }

            if result.outcome() != RunOutcome::FullSuccess {
                return Ok(ExitCode::from(result.exit_code()));
            }
        }

        Commands::Stats => {
            let stats = service.export_stats().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Source tables:");
                for table in &stats.tables {
                    println!("  {:<16} {:>8}", table.name, table.count);
                }
                println!("  {:<16} {:>8}", "total", stats.total_records);
            }
        }

        Commands::Export { output } => {
            let script = service.export_sql().await?;
            if output.as_os_str() == "-" {
                print!("{}", script);
            } else {
                std::fs::write(&output, &script)?;
                if cli.output_json {
                    let summary = serde_json::json!({
                        "file": output.display().to_string(),
                        "bytes": script.len(),
                        "contentType": EXPORT_CONTENT_TYPE,
                    });
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    println!("Wrote {} bytes to {}", script.len(), output.display());
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn confirm_destructive_run() -> Result<bool, MigrateError> {
    if !std::io::stdin().is_terminal() {
        return Err(MigrateError::Config(
            "migrate drops every table on the target; pass --yes to run non-interactively"
                .into(),
        ));
    }
    Confirm::new()
        .with_prompt("This drops and recreates all tables on the target. Continue?")
        .default(false)
        .interact()
        .map_err(|e| MigrateError::Config(e.to_string()))
}

fn print_migration(result: &MigrationResult) {
    let status_msg = match result.outcome() {
        RunOutcome::FullSuccess => "Migration completed!",
        RunOutcome::PartialFailure => "Migration finished with errors",
        RunOutcome::TotalFailure => "Migration failed",
    };
    println!("\n{}", status_msg);

    if let Some(ref err) = result.error {
        println!("  Error: {}", err);
    }
    if !result.tables.is_empty() {
        println!("  Tables:");
        for table in &result.tables {
            match table.error() {
                None => println!("    {:<16} {:>8}", table.name(), table.count()),
                Some(err) => println!("    {:<16} {:>8}  FAILED: {}", table.name(), 0, err),
            }
        }
    }
    println!("  Records: {}", result.total_records);
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG, when set, wins over --verbosity.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
