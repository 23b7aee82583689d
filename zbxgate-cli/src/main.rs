mod commands;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::FilterArgs;
use tracing_subscriber::EnvFilter;
use zbxgate_common::{GatewayConfig, SortKey};

#[derive(Parser)]
#[command(name = "zbxgate")]
#[command(version = "0.1.0")]
#[command(about = "Query Zabbix alerts from the terminal", long_about = None)]
struct Cli {
    /// Print the raw JSON response instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Alerts raised since midnight UTC
    Today {
        /// Maximum number of alerts (default: 100)
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Alerts ranked by severity, frequency or time
    Top {
        /// Sort key: severity, frequency or time
        #[arg(long, default_value = "severity")]
        by: SortKey,

        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Structured alert query
    Query {
        #[command(flatten)]
        filters: FilterArgs,

        /// Severity to keep, 0-5 (repeatable)
        #[arg(long = "severity")]
        severities: Vec<i32>,

        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Alerts whose name contains any of the keywords
    Associate {
        /// Keywords, matched case-insensitively
        #[arg(required = true)]
        keywords: Vec<String>,

        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Free-text query, e.g. "top 5 by severity" or "最近2小时 严重"
    Nl {
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = GatewayConfig::from_env().context("Failed to load configuration")?;
    let source = config.build_source()?;
    let source = source.as_ref();
    let json = cli.json;

    let response = match cli.command {
        Commands::Today { limit } => commands::today::execute(source, limit).await?,
        Commands::Top { by, limit } => commands::top::execute(source, by, limit).await?,
        Commands::Query {
            filters,
            severities,
            limit,
        } => commands::query::execute(source, &filters, severities, limit).await?,
        Commands::Associate {
            keywords,
            filters,
            limit,
        } => commands::associate::execute(source, keywords, &filters, limit).await?,
        Commands::Nl { text } => commands::nl::execute(source, &text).await?,
    };

    output::print_alerts(&response, json)
}
