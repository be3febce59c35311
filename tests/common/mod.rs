#![allow(dead_code)]

use papertrader::domain::config::EngineConfig;
use papertrader::domain::error::PaperError;
use papertrader::domain::events::{CoreEvent, EventBus};
use papertrader::domain::liquidation::{FreshnessLatch, LiquidationIngest};
use papertrader::domain::market::{BAR_SECS, Candle, LiquidationRecord};
use papertrader::domain::orchestrator::BarOrchestrator;
use papertrader::domain::signal::SignalBook;
use papertrader::domain::trade::{NewTrade, Trade, TradeExit, TradeFilter};
use papertrader::ports::event_port::EventPort;
use papertrader::ports::storage_port::StoragePort;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub const PRIMARY: &str = "BTC-USD";
pub const REFERENCE: &str = "ETH-USD";
pub const LIQ_SYMBOL: &str = "BTC";

#[derive(Default)]
struct Inner {
    candles: BTreeMap<(String, i64), Candle>,
    liquidations: BTreeMap<(String, i64), LiquidationRecord>,
    trades: Vec<Trade>,
    book: SignalBook,
    phantom_open: Vec<Trade>,
    failing: bool,
}

/// In-memory `StoragePort` with the same contract as the SQLite adapter.
#[derive(Default)]
pub struct MockStore {
    inner: Mutex<Inner>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write fails with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    /// Reported by `open_trades` but unknown to `close_trade`.
    pub fn inject_phantom_open(&self, trade: Trade) {
        self.inner.lock().unwrap().phantom_open.push(trade);
    }

    pub fn all_trades(&self) -> Vec<Trade> {
        self.inner.lock().unwrap().trades.clone()
    }

    fn check_writable(inner: &Inner) -> Result<(), PaperError> {
        if inner.failing {
            return Err(PaperError::Database {
                reason: "storage unavailable".into(),
            });
        }
        Ok(())
    }
}

impl StoragePort for MockStore {
    fn upsert_candles(&self, candles: &[Candle]) -> Result<(), PaperError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner)?;
        for c in candles {
            inner.candles.insert((c.symbol.clone(), c.ts), c.clone());
        }
        Ok(())
    }

    fn upsert_liquidations(&self, records: &[LiquidationRecord]) -> Result<(), PaperError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner)?;
        for r in records {
            inner.liquidations.insert((r.symbol.clone(), r.ts), r.clone());
        }
        Ok(())
    }

    fn fetch_candles(&self, symbol: &str) -> Result<Vec<Candle>, PaperError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Candle> = inner
            .candles
            .values()
            .filter(|c| c.symbol == symbol)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.ts);
        Ok(rows)
    }

    fn fetch_liquidations(&self, symbol: &str) -> Result<Vec<LiquidationRecord>, PaperError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<LiquidationRecord> = inner
            .liquidations
            .values()
            .filter(|r| r.symbol == symbol)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.ts);
        Ok(rows)
    }

    fn latest_liquidation_ts(&self, symbol: &str) -> Result<Option<i64>, PaperError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .liquidations
            .values()
            .filter(|r| r.symbol == symbol)
            .map(|r| r.ts)
            .max())
    }

    fn insert_trade(&self, trade: &NewTrade) -> Result<Trade, PaperError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner)?;
        if inner.book.get(trade.signal).open_trade_id.is_some() {
            return Err(PaperError::DatabaseQuery {
                reason: format!("signal {} already has an open trade", trade.signal),
            });
        }
        let created = Trade {
            id: inner.trades.len() as i64 + 1,
            signal: trade.signal,
            direction: trade.direction,
            entry_ts: trade.entry_ts,
            entry_price: trade.entry_price,
            hold_bars: trade.hold_bars,
            exit: None,
        };
        let state = inner.book.get_mut(trade.signal);
        state.last_fire_ts = Some(trade.entry_ts);
        state.last_fire_dir = Some(trade.direction);
        state.open_trade_id = Some(created.id);
        inner.trades.push(created.clone());
        Ok(created)
    }

    fn close_trade(&self, id: i64, exit: &TradeExit) -> Result<Trade, PaperError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner)?;
        let Some(trade) = inner.trades.iter_mut().find(|t| t.id == id && t.is_open()) else {
            return Err(PaperError::TradeNotOpen { id });
        };
        trade.exit = Some(*exit);
        let closed = trade.clone();
        let state = inner.book.get_mut(closed.signal);
        if state.open_trade_id == Some(id) {
            state.open_trade_id = None;
        }
        Ok(closed)
    }

    fn open_trades(&self) -> Result<Vec<Trade>, PaperError> {
        let inner = self.inner.lock().unwrap();
        let mut open: Vec<Trade> = inner
            .trades
            .iter()
            .filter(|t| t.is_open())
            .chain(inner.phantom_open.iter())
            .cloned()
            .collect();
        open.sort_by_key(|t| (t.entry_ts, t.id));
        Ok(open)
    }

    fn trades(&self, filter: TradeFilter, limit: usize) -> Result<Vec<Trade>, PaperError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Trade> = inner
            .trades
            .iter()
            .filter(|t| match filter {
                TradeFilter::All => true,
                TradeFilter::Open => t.is_open(),
                TradeFilter::Closed => !t.is_open(),
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| std::cmp::Reverse((t.entry_ts, t.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    fn signal_book(&self) -> Result<SignalBook, PaperError> {
        Ok(self.inner.lock().unwrap().book.clone())
    }

    fn prune_older_than(&self, cutoff_ts: i64) -> Result<(), PaperError> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner)?;
        inner.candles.retain(|_, c| c.ts >= cutoff_ts);
        inner.liquidations.retain(|_, r| r.ts >= cutoff_ts);
        Ok(())
    }
}

/// Event port that keeps everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CoreEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CoreEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPort for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn publish(&self, event: &CoreEvent) -> Result<(), PaperError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MockStore>,
    pub sink: Arc<RecordingSink>,
    pub latch: FreshnessLatch,
    pub orchestrator: BarOrchestrator,
    pub ingest: LiquidationIngest,
}

pub fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(MockStore::new());
    let sink = Arc::new(RecordingSink::default());
    let latch = FreshnessLatch::new();
    let events = EventBus::new().with_sink(sink.clone());
    let ingest = LiquidationIngest::new(store.clone(), latch.clone(), &config.liquidation_symbol)
        .unwrap();
    let orchestrator = BarOrchestrator::new(store.clone(), events, config, latch.clone());
    Harness {
        store,
        sink,
        latch,
        orchestrator,
        ingest,
    }
}

/// Stores one reference candle and one empty liquidation row at `ts = 0`,
/// enough for features to be computed. Both read as flat and zero, the same
/// values the feature engine uses before a series starts. The ingest's
/// last-seen marker is untouched.
pub fn seed_market_context(store: &dyn StoragePort) {
    store
        .upsert_candles(&[candle(REFERENCE, 0, 50.0, 1.0)])
        .unwrap();
    store.upsert_liquidations(&[liq(0, 0.0, 0.0)]).unwrap();
}

/// Harness whose store already holds reference and liquidation rows.
pub fn seeded_harness() -> Harness {
    seeded_harness_with(EngineConfig::default())
}

pub fn seeded_harness_with(config: EngineConfig) -> Harness {
    let h = harness_with(config);
    seed_market_context(h.store.as_ref());
    h
}

pub fn candle(symbol: &str, ts: i64, close: f64, volume: f64) -> Candle {
    Candle {
        ts,
        symbol: symbol.to_string(),
        open: close,
        high: close,
        low: close,
        close,
        volume,
    }
}

/// `n` consecutive bars starting at `start_ts`, close and volume per index.
pub fn series(
    symbol: &str,
    start_ts: i64,
    n: usize,
    close: impl Fn(usize) -> f64,
    volume: impl Fn(usize) -> f64,
) -> Vec<Candle> {
    (0..n)
        .map(|i| candle(symbol, start_ts + i as i64 * BAR_SECS, close(i), volume(i)))
        .collect()
}

pub fn liq(ts: i64, long: f64, short: f64) -> LiquidationRecord {
    LiquidationRecord {
        ts,
        symbol: LIQ_SYMBOL.to_string(),
        long_liq_usd: long,
        short_liq_usd: short,
    }
}
