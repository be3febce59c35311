//! CLI definition and dispatch.

use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::jsonl_event_adapter::JsonLinesEventAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::config::EngineConfig;
use crate::domain::error::PaperError;
use crate::domain::events::EventBus;
use crate::domain::liquidation::{FreshnessLatch, LiquidationIngest};
use crate::domain::market::{Candle, LiquidationRecord};
use crate::domain::orchestrator::BarOrchestrator;
use crate::domain::trade::TradeFilter;
use crate::ports::config_port::ConfigPort;
use crate::ports::storage_port::StoragePort;
use crate::runtime::{Inbound, ProcessorReport, spawn_processor};

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Paper-trading signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay candle and liquidation CSV files through the engine
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        candles: PathBuf,
        #[arg(long)]
        liquidations: Option<PathBuf>,
        /// Write every event as a JSON line; `-` for stdout
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// List paper trades, newest first
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_enum, default_value_t = StatusArg::All)]
        status: StatusArg,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show per-signal state
    Signals {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    All,
    Open,
    Closed,
}

impl From<StatusArg> for TradeFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => TradeFilter::All,
            StatusArg::Open => TradeFilter::Open,
            StatusArg::Closed => TradeFilter::Closed,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Replay {
            config,
            candles,
            liquidations,
            events,
        } => run_replay(&config, &candles, liquidations.as_deref(), events.as_deref()),
        Command::Trades {
            config,
            status,
            limit,
        } => run_trades(&config, status.into(), limit),
        Command::Signals { config } => run_signals(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PaperError> {
    FileConfigAdapter::from_file(path)
}

/// `RUST_LOG` wins, then `[logging] filter`, then `info`. A second call is
/// a no-op.
pub fn init_logging(config: &dyn ConfigPort) {
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            config
                .get_string("logging", "filter")
                .and_then(|f| EnvFilter::try_new(f).ok())
        })
        .unwrap_or_else(|| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_storage(config: &dyn ConfigPort) -> Result<Arc<SqliteAdapter>, PaperError> {
    let store = SqliteAdapter::from_config(config)?;
    store.initialize_schema()?;
    Ok(Arc::new(store))
}

fn run_replay(
    config_path: &Path,
    candles_path: &Path,
    liquidations_path: Option<&Path>,
    events_path: Option<&Path>,
) -> Result<(), PaperError> {
    let adapter = load_config(config_path)?;
    init_logging(&adapter);
    let engine = EngineConfig::from_port(&adapter)?;
    let store = open_storage(&adapter)?;

    let candles = CsvAdapter::load_candles(candles_path)?;
    let liquidations = match liquidations_path {
        Some(p) => CsvAdapter::load_liquidations(p)?,
        None => Vec::new(),
    };
    eprintln!(
        "Loaded {} candles and {} liquidation records",
        candles.len(),
        liquidations.len()
    );

    let mut events = EventBus::new();
    let jsonl = match events_path {
        Some(p) if p.as_os_str() == "-" => Some(Arc::new(JsonLinesEventAdapter::stdout())),
        Some(p) => Some(Arc::new(JsonLinesEventAdapter::create(p)?)),
        None => None,
    };
    if let Some(sink) = &jsonl {
        events.add_sink(sink.clone());
    }

    let stream = merge_replay(candles, liquidations, engine.liquidation_delay_secs);
    let report = replay_stream(store, events, engine, stream)?;

    if let Some(sink) = &jsonl {
        sink.flush()?;
    }

    eprintln!(
        "Replay complete: {} messages, {} new bars, {} liquidation polls, {} trades opened, {} closed, {} failed cycles",
        report.messages,
        report.new_bars,
        report.liquidation_polls,
        report.opened,
        report.closed,
        report.failed_cycles
    );
    Ok(())
}

/// Runs `stream` through a fresh processor on its own tokio runtime.
pub fn replay_stream(
    store: Arc<dyn StoragePort>,
    events: EventBus,
    engine: EngineConfig,
    stream: Vec<Inbound>,
) -> Result<ProcessorReport, PaperError> {
    let latch = FreshnessLatch::new();
    let ingest = LiquidationIngest::new(store.clone(), latch.clone(), &engine.liquidation_symbol)?;
    let capacity = engine.queue_capacity;
    let orchestrator = BarOrchestrator::new(store, events, engine, latch);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let handle = spawn_processor(orchestrator, ingest, capacity);
        for message in stream {
            handle.send(message).await?;
        }
        handle.finish().await
    })
}

/// Interleaves candles with liquidation polls. Records for hour `h` are
/// delivered as one poll once the candle clock reaches `h + delay_secs`,
/// ahead of the candle that reached it. Records still pending after the
/// last candle are delivered at the end.
pub fn merge_replay(
    candles: Vec<Candle>,
    mut liquidations: Vec<LiquidationRecord>,
    delay_secs: i64,
) -> Vec<Inbound> {
    liquidations.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.symbol.cmp(&b.symbol)));
    let mut pending = liquidations.into_iter().peekable();
    let mut stream = Vec::with_capacity(candles.len());

    for candle in candles {
        let mut due = Vec::new();
        while let Some(rec) = pending.next_if(|r| r.ts + delay_secs <= candle.ts) {
            due.push(rec);
        }
        if !due.is_empty() {
            stream.push(Inbound::Liquidations(due));
        }
        stream.push(Inbound::Candle(candle));
    }

    let rest: Vec<LiquidationRecord> = pending.collect();
    if !rest.is_empty() {
        stream.push(Inbound::Liquidations(rest));
    }
    stream
}

fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn run_trades(config_path: &Path, filter: TradeFilter, limit: usize) -> Result<(), PaperError> {
    let adapter = load_config(config_path)?;
    init_logging(&adapter);
    let store = open_storage(&adapter)?;

    let trades = store.trades(filter, limit)?;
    if trades.is_empty() {
        println!("No trades.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<5}  {:<5}  {:<16}  {:>12}  {:<16}  {:>12}  {:>9}  {:<6}",
        "ID", "SIG", "DIR", "ENTRY", "ENTRY PX", "EXIT", "EXIT PX", "BPS", "STATUS"
    );
    for t in &trades {
        let (exit_ts, exit_px, bps) = match &t.exit {
            Some(x) => (
                format_ts(x.exit_ts),
                format!("{:.2}", x.exit_price),
                format!("{:.1}", x.gross_bps),
            ),
            None => ("-".into(), "-".into(), "-".into()),
        };
        println!(
            "{:>5}  {:<5}  {:<5}  {:<16}  {:>12.2}  {:<16}  {:>12}  {:>9}  {:<6}",
            t.id,
            t.signal,
            t.direction,
            format_ts(t.entry_ts),
            t.entry_price,
            exit_ts,
            exit_px,
            bps,
            t.status()
        );
    }

    let closed: Vec<f64> = trades
        .iter()
        .filter_map(|t| t.exit.map(|x| x.gross_bps))
        .collect();
    if !closed.is_empty() {
        let mean = closed.iter().sum::<f64>() / closed.len() as f64;
        println!("\n{} closed, mean gross {:.1} bps", closed.len(), mean);
    }
    Ok(())
}

fn run_signals(config_path: &Path) -> Result<(), PaperError> {
    let adapter = load_config(config_path)?;
    init_logging(&adapter);
    let store = open_storage(&adapter)?;

    let book = store.signal_book()?;
    println!(
        "{:<5}  {:>4}  {:<16}  {:<5}  {:>10}",
        "SIG", "HOLD", "LAST FIRE", "DIR", "OPEN TRADE"
    );
    for (id, state) in book.iter() {
        println!(
            "{:<5}  {:>4}  {:<16}  {:<5}  {:>10}",
            id,
            id.hold_bars(),
            state.last_fire_ts.map(format_ts).unwrap_or_else(|| "-".into()),
            state
                .last_fire_dir
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into()),
            state
                .open_trade_id
                .map(|id| format!("#{id}"))
                .unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}
