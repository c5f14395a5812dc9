mod run;

use clap::{Parser, Subcommand};
use stylesync_core::JobMode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stylesync")]
#[command(about = "Extract styles, stock and purchase orders from the SpySystem back office")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one extraction job and print its events to stdout
    Run {
        /// What to extract per item: detail, stock, statstock_free, purchases, stock_pre
        #[arg(long, default_value = "detail")]
        mode: JobMode,
        /// Explicit style URL to process instead of listing the catalog (repeatable)
        #[arg(long = "link")]
        links: Vec<String>,
        /// Process at most this many items
        #[arg(long)]
        limit: Option<i64>,
        /// Filter the catalog listing by season option text (e.g. "AW25")
        #[arg(long)]
        season: Option<String>,
        /// Report listed rows without opening each style
        #[arg(long)]
        skip_details: bool,
        /// Print one JSON report at the end instead of streaming NDJSON
        #[arg(long)]
        buffered: bool,
    },
    /// Check that the configured credentials reach a logged-in session
    Login,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = stylesync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    // stdout carries job output; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run {
            mode,
            links,
            limit,
            season,
            skip_details,
            buffered,
        }) => {
            let request = run::build_request(mode, links, limit, season, skip_details);
            run::run_extraction(&config, &request, buffered).await?;
        }
        Some(Commands::Login) => run::run_login(&config).await?,
        None => println!("stylesync: pass `run` or `login` (see --help)"),
    }

    Ok(())
}
