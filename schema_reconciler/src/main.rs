use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use schema_reconciler::config::LoggingConfig;
use schema_reconciler::utils::init_logging;
use schema_reconciler::{export_schema, init};

#[derive(Parser, Debug)]
#[command(name = "schema_reconciler", version, about = "Converge a MySQL schema to a TOML document")]
struct Cli {
    /// Declarative schema document
    #[arg(long, default_value = "schema.toml")]
    toml_path: String,

    /// Selects the `[database_<env>]` connection profile
    #[arg(long)]
    env: Option<String>,

    /// Read the connection profile from this file instead
    #[arg(long)]
    connection_path: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// `text` or `json`
    #[arg(long, default_value = "text")]
    log_format: String,

    #[arg(long)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the changes needed to match the document
    Apply {
        /// Print the statements instead of executing them
        #[arg(long)]
        sql_only: bool,

        /// Fail if any metadata row could not be read
        #[arg(long)]
        strict: bool,
    },
    /// Print the live schema as a document
    Export,
    /// Print the pending changes as JSON
    Diff {
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        file: cli.log_file.clone(),
        format: cli.log_format.clone(),
        console: true,
    })
    .context("failed to initialize logging")?;

    let reconciler = init(
        &cli.toml_path,
        cli.env.as_deref(),
        cli.connection_path.as_deref(),
    )
    .await
    .with_context(|| format!("failed to load {}", cli.toml_path))?;

    let outcome = run(&reconciler, &cli.command).await;
    reconciler.close().await;
    outcome
}

async fn run(reconciler: &schema_reconciler::Reconciler, command: &Command) -> Result<()> {
    match command {
        Command::Apply { sql_only, strict } => {
            let statements = reconciler.sync_database(*sql_only, *strict).await?;
            tracing::info!(statements = statements.len(), sql_only = *sql_only, "Reconciliation finished");
        }
        Command::Export => {
            let live = reconciler.analyze_database_schema(false).await?;
            print!("{}", export_schema(&live));
        }
        Command::Diff { strict } => {
            let diff = reconciler.generate_schema_diff(*strict).await?;
            println!("{}", serde_json::to_string_pretty(&diff)?);
        }
    }
    Ok(())
}
