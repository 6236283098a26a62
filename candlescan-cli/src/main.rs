//! Candlescan CLI: watchlist scans, cache inspection, and pattern listing.
//!
//! Commands:
//! - `scan`: refresh prices, detect candlestick patterns, and score each symbol
//! - `cache status`: report cached symbols and their date ranges
//! - `patterns`: list the recognizers with their bias weights

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use candlescan_core::data::{CircuitBreaker, ParquetStore, PriceStore, YahooProvider};
use candlescan_core::patterns::RECOGNIZERS;
use candlescan_core::scoring::{BiasTable, ScoreCategory, Variant};
use candlescan_runner::{
    from_symbols, load_watchlist, save_results, BatchCoordinator, LogProgress, ResultStatus,
    ScanConfig, SymbolResult,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "candlescan",
    about = "Candlescan: candlestick pattern scanner for stock watchlists"
)]
struct Cli {
    /// Log at debug level.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan symbols for candlestick patterns on the latest session.
    Scan {
        /// Symbols to scan (e.g., AAPL MSFT 7203). Combined with --watchlist.
        symbols: Vec<String>,

        /// Watchlist CSV with a ticker column.
        #[arg(long)]
        watchlist: Option<PathBuf>,

        /// Path to a TOML scan config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Write results to this file (.json or .csv).
        #[arg(long)]
        export: Option<PathBuf>,

        /// Re-run failed symbols up to this many extra rounds.
        #[arg(long, default_value_t = 0)]
        retry_failed: u32,

        /// Comma-separated recognizer subset (e.g., CDLHAMMER,CDLENGULFING).
        #[arg(long, value_delimiter = ',')]
        patterns: Vec<String>,

        /// Bias table CSV overriding the builtin weights.
        #[arg(long)]
        bias: Option<PathBuf>,

        /// Ignore the cache and refetch the whole lookback window.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Include a hit timeline for the last N sessions.
        #[arg(long)]
        history: Option<usize>,

        /// Offline mode: score cached data only.
        #[arg(long, default_value_t = false)]
        offline: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// List available recognizers and their bias weights.
    Patterns {
        /// Bias table CSV overriding the builtin weights.
        #[arg(long)]
        bias: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached symbols, date ranges, and bar counts.
    Status {
        /// Limit the report to these symbols.
        symbols: Vec<String>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

struct ScanArgs {
    symbols: Vec<String>,
    watchlist: Option<PathBuf>,
    config: Option<PathBuf>,
    cache_dir: PathBuf,
    export: Option<PathBuf>,
    retry_failed: u32,
    patterns: Vec<String>,
    bias: Option<PathBuf>,
    force: bool,
    history: Option<usize>,
    offline: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan {
            symbols,
            watchlist,
            config,
            cache_dir,
            export,
            retry_failed,
            patterns,
            bias,
            force,
            history,
            offline,
        } => run_scan(ScanArgs {
            symbols,
            watchlist,
            config,
            cache_dir,
            export,
            retry_failed,
            patterns,
            bias,
            force,
            history,
            offline,
        }),
        Commands::Cache { action } => match action {
            CacheAction::Status { symbols, cache_dir } => run_cache_status(&cache_dir, &symbols),
        },
        Commands::Patterns { bias } => run_patterns(bias.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,candlescan={level},candlescan_core={level},candlescan_runner={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_bias(path: Option<&Path>) -> Result<BiasTable> {
    let table = match path {
        Some(path) => BiasTable::from_file(path)?,
        None => BiasTable::builtin()?,
    };
    Ok(table)
}

fn run_scan(args: ScanArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    if !args.patterns.is_empty() {
        config.analysis.enabled_patterns = Some(args.patterns.clone());
    }
    if let Some(days) = args.history {
        config.analysis.history_lookback = days;
    }
    config.fetch.force_refresh |= args.force;
    config.fetch.offline |= args.offline;
    config.validate()?;

    let mut records = Vec::new();
    if let Some(path) = &args.watchlist {
        records.extend(load_watchlist(path)?);
    }
    if !args.symbols.is_empty() {
        records.extend(from_symbols(&args.symbols)?);
    }
    if records.is_empty() {
        bail!("no symbols given: pass symbols or --watchlist");
    }

    let bias_path = args.bias.as_deref().or(config.analysis.bias_table.as_deref());
    let bias = Arc::new(load_bias(bias_path)?);

    let store: Arc<dyn PriceStore> = Arc::new(ParquetStore::new(&args.cache_dir));
    let mut batch = BatchCoordinator::new(config.clone(), store, bias, records)?
        .with_progress(Arc::new(LogProgress));

    if !config.fetch.offline {
        let breaker = Arc::new(CircuitBreaker::default_provider());
        let timeout = Duration::from_secs(config.fetch.http_timeout_secs);
        let provider = Arc::new(YahooProvider::new(breaker, timeout)?);
        batch = batch
            .with_price_source(provider.clone())
            .with_metadata_source(provider);
    }

    let summary = batch.run(None)?;
    info!(done = summary.counts.done, failed = summary.counts.failed, "scan finished");

    for round in 1..=args.retry_failed {
        if !batch.has_failures() {
            break;
        }
        info!(round, "retrying failed symbols");
        batch.retry_failed(None)?;
    }

    let results = batch.results();
    print_results(&results, config.analysis.history_lookback > 0);

    if let Some(path) = &args.export {
        let generated = chrono::Local::now().naive_local();
        save_results(&results, path, generated)?;
        println!("Results saved to: {}", path.display());
    }

    if results.iter().any(SymbolResult::is_failed) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_results(results: &[SymbolResult], show_timeline: bool) {
    println!();
    println!(
        "  {:<10} {:<24} {:<10} {:>10} {:<18} {}",
        "Symbol", "Name", "Date", "Close", "Score", "Patterns"
    );
    println!("{}", "-".repeat(100));

    for r in results {
        let marker = if r.highlighted { "*" } else { " " };
        let name: String = r.name.as_deref().unwrap_or("").chars().take(24).collect();
        match r.status {
            ResultStatus::Done => {
                let hits = r
                    .hits
                    .iter()
                    .map(|h| format!("{}({:+.1})", h.pattern, h.contribution))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!(
                    "{marker} {:<10} {:<24} {:<10} {:>10.2} {:<18} {}",
                    r.symbol,
                    name,
                    r.date.map(|d| d.to_string()).unwrap_or_default(),
                    r.close.unwrap_or_default(),
                    r.score.map(ScoreCategory::badge).unwrap_or_default(),
                    if hits.is_empty() { "-".to_string() } else { hits },
                );
                for w in &r.warnings {
                    println!("    warning: {w}");
                }
                if show_timeline {
                    for day in &r.timeline {
                        let ids = day
                            .hits
                            .iter()
                            .map(|h| h.pattern.to_string())
                            .collect::<Vec<_>>()
                            .join(" ");
                        println!("    {} {:+} {ids}", day.date, day.score);
                    }
                }
            }
            ResultStatus::Pending => {
                println!("{marker} {:<10} {:<24} (not processed)", r.symbol, name);
            }
            ResultStatus::FetchFailed | ResultStatus::ScoreFailed => {
                let (code, guidance) = r
                    .error
                    .as_ref()
                    .map(|e| (e.code.code(), e.guidance()))
                    .unwrap_or(("", ""));
                println!("{marker} {:<10} {:<24} {code}", r.symbol, name);
                if let Some(err) = &r.error {
                    println!("    {err}");
                }
                if !guidance.is_empty() {
                    println!("    hint: {guidance}");
                }
            }
        }
    }

    let done = results.iter().filter(|r| r.status == ResultStatus::Done).count();
    let failed = results.iter().filter(|r| r.is_failed()).count();
    println!();
    println!("{done} scored, {failed} failed, {} total", results.len());
}

fn run_cache_status(cache_dir: &Path, only: &[String]) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let store = ParquetStore::new(cache_dir);
    let symbols = if only.is_empty() {
        store.symbols()?
    } else {
        from_symbols(only)?.into_iter().map(|r| r.symbol).collect()
    };

    if symbols.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", symbols.len());
    println!();
    println!("{:<10} {:<25} {:>8} {:<20}", "Symbol", "Date Range", "Bars", "Name");
    println!("{}", "-".repeat(66));
    for symbol in &symbols {
        let manifest = store
            .manifest(symbol)
            .with_context(|| format!("failed to read manifest for {symbol}"))?;
        let name = match store.get_metadata(symbol) {
            Ok(meta) => meta.and_then(|m| m.name).unwrap_or_default(),
            Err(e) => {
                warn!(symbol = symbol.as_str(), error = %e, "unreadable metadata");
                String::new()
            }
        };
        match manifest {
            Some(m) => println!(
                "{:<10} {:<25} {:>8} {:<20}",
                symbol,
                format!("{} to {}", m.start_date, m.end_date),
                m.bar_count,
                name
            ),
            None => println!("{:<10} {:<25} {:>8} {:<20}", symbol, "(not cached)", 0, name),
        }
    }
    Ok(())
}

fn run_patterns(bias: Option<&Path>) -> Result<()> {
    let table = load_bias(bias)?;
    println!("{:<22} {:<30} {:>8} {:>8}", "Pattern", "Name", "Bull", "Bear");
    println!("{}", "-".repeat(72));
    for rec in RECOGNIZERS.iter() {
        let weight = |value: i32| {
            table
                .lookup(rec.id.as_str(), value)
                .ok()
                .filter(|e| e.variant == Variant::for_value(value))
                .map(|e| format!("{:+}", e.weight))
                .unwrap_or_else(|| "-".into())
        };
        println!(
            "{:<22} {:<30} {:>8} {:>8}",
            rec.id,
            rec.name,
            weight(100),
            weight(-100)
        );
    }
    println!();
    println!("{} recognizers", RECOGNIZERS.len());
    Ok(())
}
