use anyhow::Context;
use clap::{Parser, Subcommand};
use configuration::{init_tracing, load_config, Config};
use engine::{Collaborators, InMemoryMarketData, MarketSnapshot, SignalPipeline, ZScoreService};
use futures::future::join_all;
use standardization::InMemorySeriesRepository;
use std::path::PathBuf;
use std::sync::Arc;

/// The main entry point for the signal pipeline.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    let _log_guard = init_tracing(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Run(args) => handle_run(args, config).await,
        Commands::Standardize(args) => handle_standardize(args, config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Standardizes economic series and scores market symbols with regime-aware z-scores.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a toml configuration file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the pipeline over a market snapshot and score one batch.
    Run(RunArgs),
    /// Run Bronze -> Silver -> Gold for the series in a snapshot.
    Standardize(StandardizeArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// JSON market snapshot (volatility index, symbol prices and factors).
    #[arg(long)]
    snapshot: PathBuf,

    /// Symbols to score. Defaults to the configured watchlist, or every symbol in the snapshot.
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Volatility-index level to use instead of the snapshot's reading.
    #[arg(long)]
    volatility: Option<f64>,
}

#[derive(Parser)]
struct StandardizeArgs {
    /// JSON snapshot whose `series` section holds definitions and raw observations.
    #[arg(long)]
    snapshot: PathBuf,

    /// Series to standardize. Defaults to every series in the snapshot.
    #[arg(long, value_delimiter = ',')]
    series: Vec<String>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn build_service(snapshot: &MarketSnapshot, config: &Config) -> anyhow::Result<Arc<ZScoreService>> {
    let market = Arc::new(InMemoryMarketData::from_snapshot(snapshot).await);
    let series = Arc::new(InMemorySeriesRepository::new());
    for s in &snapshot.series {
        series.add_definition(s.definition.clone()).await;
        series.append_raw(s.observations.clone()).await;
    }
    let service = ZScoreService::new(config, Collaborators::in_memory(market, series))?;
    Ok(Arc::new(service))
}

async fn handle_run(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    let snapshot = MarketSnapshot::from_json_file(&args.snapshot)?;
    if config.orchestrator.watchlist.is_empty() {
        config.orchestrator.watchlist = snapshot.symbols.iter().map(|s| s.symbol.clone()).collect();
    }

    let service = build_service(&snapshot, &config).await?;
    let pipeline = SignalPipeline::new(service.clone(), &config);
    let report = pipeline.start().await?;
    if !report.all_succeeded() {
        tracing::warn!(steps = ?report.steps, "Pipeline started with failed steps");
    }

    let symbols = if args.symbols.is_empty() {
        config.orchestrator.watchlist.clone()
    } else {
        args.symbols
    };
    let results = service.calculate_batch(&symbols, args.volatility).await;
    tracing::info!(requested = symbols.len(), scored = results.len(), "Batch scored");

    println!("{}", serde_json::to_string_pretty(&results)?);
    pipeline.shutdown().await;
    Ok(())
}

async fn handle_standardize(args: StandardizeArgs, config: Config) -> anyhow::Result<()> {
    let snapshot = MarketSnapshot::from_json_file(&args.snapshot)?;
    let series_ids: Vec<String> = if args.series.is_empty() {
        snapshot.series.iter().map(|s| s.definition.series_id.clone()).collect()
    } else {
        args.series
    };

    let service = build_service(&snapshot, &config).await?;
    let outcomes = join_all(series_ids.iter().map(|id| service.standardize_series(id))).await;

    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed > 0 {
        tracing::warn!(failed, total = outcomes.len(), "Some series failed to standardize");
    }
    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}
