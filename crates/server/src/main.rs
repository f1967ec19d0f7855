//! Spread Scanner: debit call spread finder for US equity options
//!
//! Usage:
//!   spread-scanner analyze --tickers AAPL,MSFT   # Analyze from CLI
//!   spread-scanner serve --port 3001             # Launch the JSON API
//!   spread-scanner strategies                    # Show strategy bands
//!   spread-scanner cache-purge                   # Drop expired cache rows

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine::{
    AnalysisError, CacheStore, EngineConfig, MemoryCache, PolygonClient, SpreadAnalyzer,
    SqliteCache, StrategyOutcome, TickerReport,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));
const DEFAULT_CACHE_DB_PATH: &str = "data/spread_cache.db";

#[derive(Parser)]
#[command(name = "spread-scanner")]
#[command(about = "Debit call spread scanner over live option chains", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON engine config; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the JSON API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Analyze tickers from CLI (no web server)
    Analyze {
        /// Tickers to analyze (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        tickers: Vec<String>,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
    },
    /// Print the active strategy bands
    Strategies,
    /// Delete expired rows from the SQLite cache
    CachePurge,
}

#[derive(Clone)]
struct AppState {
    analyzer: Arc<SpreadAnalyzer>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,spread_scanner=debug,sqlx=warn")
    } else {
        EnvFilter::new("info,engine=info,spread_scanner=info,sqlx=warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(p) => {
            let config = EngineConfig::from_json_file(p)
                .map_err(|e| anyhow::anyhow!("Config {} rejected: {}", p.display(), e))?;
            info!("Config loaded: {}", p.display());
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn cache_db_path() -> Option<String> {
    std::env::var("SPREAD_CACHE_DB_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
}

/// Polygon client behind the limiter and the configured cache
async fn build_analyzer(config: EngineConfig) -> anyhow::Result<SpreadAnalyzer> {
    let api_key = std::env::var("POLYGON_API_KEY")
        .map_err(|_| anyhow::anyhow!("POLYGON_API_KEY is not set"))?;
    let polygon = PolygonClient::new(api_key)
        .map_err(|e| anyhow::anyhow!("HTTP client initialization failed: {}", e))?;

    let cache: Arc<dyn CacheStore> = match cache_db_path() {
        Some(path) => {
            let db = persistence::Database::new(&path).await.map_err(|e| {
                error!("Failed to initialize cache database: {}", e);
                anyhow::anyhow!("Cache database initialization failed: {}", e)
            })?;
            info!("Cache database: {}", path);
            Arc::new(SqliteCache::new(db.pool_clone()))
        }
        None => {
            info!("Cache: in-memory");
            Arc::new(MemoryCache::new())
        }
    };

    Ok(SpreadAnalyzer::layered(Arc::new(polygon), Some(cache), config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(config, &host, port).await?;
        }
        Commands::Analyze { tickers, export } => {
            cmd_analyze(config, tickers, export).await?;
        }
        Commands::Strategies => {
            cmd_strategies(&config);
        }
        Commands::CachePurge => {
            cmd_cache_purge().await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command: Axum JSON API
// ============================================================================

async fn cmd_serve(config: EngineConfig, host: &str, port: u16) -> anyhow::Result<()> {
    info!("Spread Scanner v{} starting...", APP_VERSION);

    let state = AppState {
        analyzer: Arc::new(build_analyzer(config).await?),
    };

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/strategies", get(api_strategies))
        .route("/analyze", post(api_analyze_batch))
        .route("/analyze/:ticker", get(api_analyze_ticker))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Spread Scanner v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  GET  /api/strategies          - Active strategy bands");
    println!("  GET  /api/analyze/:ticker     - Analyze one ticker");
    println!("  POST /api/analyze             - Analyze a batch of tickers");
    println!(
        "\n  Cache: {}",
        cache_db_path().unwrap_or_else(|| "in-memory".to_string())
    );
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Analyze command: CLI mode (no web server)
// ============================================================================

async fn cmd_analyze(
    config: EngineConfig,
    tickers: Vec<String>,
    export: Option<String>,
) -> anyhow::Result<()> {
    println!("\n=== Spread Scanner v{} ===", APP_VERSION);
    println!("Tickers: {}", tickers.join(", "));
    println!(
        "Max width: {} | Strike band: ±{}% | Timeout: {}s",
        config.max_width,
        config.strike_band * rust_decimal::Decimal::ONE_HUNDRED,
        config.ticker_timeout_ms / 1000
    );
    println!();

    let analyzer = build_analyzer(config).await?;
    let reports = analyzer.analyze_batch(&tickers).await;

    for report in &reports {
        print_report(report);
    }

    if let Some(export_path) = export {
        let export_data = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "version": APP_VERSION,
            "reports": reports,
        });
        let json = serde_json::to_string_pretty(&export_data)?;
        std::fs::write(&export_path, &json)?;
        println!("\nResults exported to {}", export_path);
    }

    Ok(())
}

fn print_report(report: &TickerReport) {
    match report {
        TickerReport::Failed(f) => {
            println!("{}: FAILED [{}] {}\n", f.ticker, f.error, f.message);
        }
        TickerReport::Analyzed(result) => {
            println!(
                "{} @ {:.2} ({} of {} strategies found)",
                result.ticker,
                result.current_price,
                result.found_count(),
                result.strategies.len()
            );
            println!(
                "  {:<14} {:>8} {:>8} {:>5} {:>7} {:>8} {:>9} {:>10}",
                "Strategy", "Long", "Short", "DTE", "Cost", "MaxProf", "ROI%", "Breakeven"
            );
            println!("  {}", "-".repeat(76));
            for (name, outcome) in &result.strategies {
                match outcome {
                    StrategyOutcome::Found { valuation: v, .. } => println!(
                        "  {:<14} {:>8.2} {:>8.2} {:>5} {:>7.2} {:>8.2} {:>9.2} {:>10.2}",
                        name,
                        v.long_strike,
                        v.short_strike,
                        v.dte,
                        v.cost,
                        v.max_profit,
                        v.roi_percent,
                        v.breakeven,
                    ),
                    StrategyOutcome::NotFound { reason } => {
                        println!("  {:<14} not found: {}", name, reason)
                    }
                }
            }
            println!();
        }
    }
}

// ============================================================================
// Strategies command
// ============================================================================

fn cmd_strategies(config: &EngineConfig) {
    let (lo, hi) = config.feasibility_window();
    println!("\nStrategy bands:");
    println!("  {:<14} {:>9} {:>13}", "Strategy", "DTE", "ROI %");
    println!("  {}", "-".repeat(38));
    for s in &config.strategies {
        println!(
            "  {:<14} {:>4}-{:<4} {:>6}-{:<6}",
            s.name, s.dte_min, s.dte_max, s.roi_min_percent, s.roi_max_percent
        );
    }
    println!("\nContracts quoted for DTE {}-{}", lo, hi);
}

// ============================================================================
// Cache purge command
// ============================================================================

async fn cmd_cache_purge() -> anyhow::Result<()> {
    let db_path = cache_db_path().unwrap_or_else(|| DEFAULT_CACHE_DB_PATH.to_string());
    info!("Spread Scanner cache purge: {}", db_path);

    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to open cache database: {}", e);
        anyhow::anyhow!("Cache database initialization failed: {}", e)
    })?;

    let cache = SqliteCache::new(db.pool_clone());
    let removed = cache
        .purge_expired()
        .await
        .map_err(|e| anyhow::anyhow!("Purge failed: {}", e))?;

    info!("Running VACUUM to reclaim disk space...");
    cache
        .vacuum()
        .await
        .map_err(|e| anyhow::anyhow!("VACUUM failed: {}", e))?;

    let remaining = cache.count().await.unwrap_or(0);
    info!("Done! Removed {} expired entries, {} remaining.", removed, remaining);
    Ok(())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "spread-scanner",
        "version": APP_VERSION,
    }))
}

/// GET /api/strategies
async fn api_strategies(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (lo, hi) = state.analyzer.config().feasibility_window();
    Json(serde_json::json!({
        "strategies": state.analyzer.strategies(),
        "feasibility_window": { "dte_min": lo, "dte_max": hi },
    }))
}

fn status_for(e: &AnalysisError) -> StatusCode {
    match e {
        AnalysisError::PriceUnavailable { .. }
        | AnalysisError::NoContractsFound { .. }
        | AnalysisError::NoLiquidContracts { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::UpstreamApi { .. } => StatusCode::BAD_GATEWAY,
        AnalysisError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AnalysisError::StrategyTask { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /api/analyze/:ticker
async fn api_analyze_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.analyzer.analyze(&ticker).await {
        Ok(result) => (
            StatusCode::OK,
            Json(serde_json::to_value(&result).unwrap_or_default()),
        ),
        Err(e) => (
            status_for(&e),
            Json(serde_json::json!({
                "success": false,
                "ticker": e.ticker(),
                "error": e.code(),
                "message": e.to_string(),
            })),
        ),
    }
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    tickers: Vec<String>,
}

/// POST /api/analyze: `{ "tickers": [...] }`
async fn api_analyze_batch(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if request.tickers.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let reports = state.analyzer.analyze_batch(&request.tickers).await;
    Ok(Json(serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "reports": reports,
    })))
}
