//! Raw market rows: 5-minute candles and hourly liquidation records.
//!
//! Both are keyed by `(ts, symbol)`; a re-delivered row with the same key
//! replaces the stored one.

/// Seconds in one primary bar.
pub const BAR_SECS: i64 = 300;

/// Seconds in one liquidation / resample bucket.
pub const HOUR_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub ts: i64,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Start of the hour containing this candle.
    pub fn hour(&self) -> i64 {
        floor_hour(self.ts)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LiquidationRecord {
    pub ts: i64,
    pub symbol: String,
    pub long_liq_usd: f64,
    pub short_liq_usd: f64,
}

impl LiquidationRecord {
    pub fn total_liq_usd(&self) -> f64 {
        self.long_liq_usd + self.short_liq_usd
    }
}

/// Floors a unix timestamp to its hour, handling pre-epoch values.
pub fn floor_hour(ts: i64) -> i64 {
    ts.div_euclid(HOUR_SECS) * HOUR_SECS
}
