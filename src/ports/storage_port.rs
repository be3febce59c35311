//! Storage port trait: raw rows, trades and per-signal state.

use crate::domain::error::PaperError;
use crate::domain::market::{Candle, LiquidationRecord};
use crate::domain::signal::SignalBook;
use crate::domain::trade::{NewTrade, Trade, TradeExit, TradeFilter};

pub trait StoragePort: Send + Sync {
    /// Insert or replace by `(ts, symbol)`.
    fn upsert_candles(&self, candles: &[Candle]) -> Result<(), PaperError>;

    /// Insert or replace by `(ts, symbol)`.
    fn upsert_liquidations(&self, records: &[LiquidationRecord]) -> Result<(), PaperError>;

    /// All retained candles for `symbol`, ascending by timestamp.
    fn fetch_candles(&self, symbol: &str) -> Result<Vec<Candle>, PaperError>;

    /// All retained liquidation records for `symbol`, ascending by timestamp.
    fn fetch_liquidations(&self, symbol: &str) -> Result<Vec<LiquidationRecord>, PaperError>;

    fn latest_liquidation_ts(&self, symbol: &str) -> Result<Option<i64>, PaperError>;

    /// Creates an OPEN trade and records it on the signal's state: last fire
    /// timestamp and direction become the entry, the open-trade id the new id.
    fn insert_trade(&self, trade: &NewTrade) -> Result<Trade, PaperError>;

    /// Closes an OPEN trade and clears its signal's open-trade id.
    ///
    /// Fails with [`PaperError::TradeNotOpen`] when `id` is unknown or closed.
    fn close_trade(&self, id: i64, exit: &TradeExit) -> Result<Trade, PaperError>;

    /// OPEN trades, oldest entry first.
    fn open_trades(&self) -> Result<Vec<Trade>, PaperError>;

    /// Trades matching `filter`, newest entry first, at most `limit`.
    fn trades(&self, filter: TradeFilter, limit: usize) -> Result<Vec<Trade>, PaperError>;

    fn signal_book(&self) -> Result<SignalBook, PaperError>;

    /// Deletes candles and liquidation records with `ts < cutoff_ts`.
    fn prune_older_than(&self, cutoff_ts: i64) -> Result<(), PaperError>;
}
