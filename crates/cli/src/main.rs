mod commands;
mod config;
mod seed;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::PactConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Partner agreement lifecycle and indicator engine.
#[derive(Parser)]
#[command(
    name = "pact",
    version,
    about = "Partner agreement lifecycle and indicator engine"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a pact.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config and PACT_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Requests per minute per client IP (overrides config and PACT_RATE_LIMIT)
        #[arg(long)]
        rate_limit: Option<u64>,
        /// JSON seed document to load at start-up
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Print the deliverable catalog of a contract type
    Catalog {
        /// Contract type (full, partial, limited, observer)
        contract_type: String,
        /// JSON seed document
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Compute an indicator's target for a reported baseline
    Evaluate {
        /// Indicator id
        indicator: String,
        /// Reported baseline percentage, e.g. 93.7
        baseline: String,
        /// JSON seed document
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Validate every indicator rule set of a seed document
    CheckRules {
        /// JSON seed document
        #[arg(long)]
        seed: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let serving = matches!(cli.command, Commands::Serve { .. });
    init_tracing(cli.verbose, serving);

    let config = match PactConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("failed to create tokio runtime: {}", e),
                cli.output,
                cli.quiet,
            );
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve {
            port,
            rate_limit,
            seed,
        } => {
            let mut server = config.server.clone();
            if let Some(port) = port {
                server.port = port;
            }
            if let Some(rate_limit) = rate_limit {
                server.rate_limit = rate_limit;
            }
            let engine = commands::seeded_engine(&rt, &config, seed.as_deref(), cli.output, cli.quiet);
            if let Err(e) = rt.block_on(serve::start_server(engine, &server)) {
                report_error(&format!("server error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        }
        Commands::Catalog {
            contract_type,
            seed,
        } => {
            let engine = commands::seeded_engine(&rt, &config, seed.as_deref(), cli.output, cli.quiet);
            commands::catalog::cmd_catalog(&rt, &engine, &contract_type, cli.output, cli.quiet);
        }
        Commands::Evaluate {
            indicator,
            baseline,
            seed,
        } => {
            let engine = commands::seeded_engine(&rt, &config, seed.as_deref(), cli.output, cli.quiet);
            commands::evaluate::cmd_evaluate(
                &rt, &engine, &indicator, &baseline, cli.output, cli.quiet,
            );
        }
        Commands::CheckRules { seed } => {
            let path = seed.or_else(|| config.seed.path.clone());
            commands::check_rules::cmd_check_rules(path.as_deref(), cli.output, cli.quiet);
        }
    }
}

/// Install the fmt subscriber on stderr. `RUST_LOG` wins; otherwise the
/// server logs at `info`, one-shot commands at `warn`, `--verbose` at `debug`.
fn init_tracing(verbose: bool, serving: bool) {
    let filter = match (verbose, serving) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Report an error message in the requested output format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
