//! Paper trade records.

use crate::domain::market::BAR_SECS;
use crate::domain::signal::{Direction, Firing, SignalId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
        })
    }
}

/// Which trades a ledger query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeFilter {
    #[default]
    All,
    Open,
    Closed,
}

/// A trade about to be opened; storage assigns the id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewTrade {
    pub signal: SignalId,
    pub direction: Direction,
    pub entry_ts: i64,
    pub entry_price: f64,
    pub hold_bars: u32,
}

impl NewTrade {
    pub fn from_firing(firing: &Firing, entry_ts: i64, entry_price: f64) -> Self {
        Self {
            signal: firing.signal,
            direction: firing.direction,
            entry_ts,
            entry_price,
            hold_bars: firing.hold_bars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TradeExit {
    pub exit_ts: i64,
    pub exit_price: f64,
    pub gross_bps: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Trade {
    pub id: i64,
    pub signal: SignalId,
    pub direction: Direction,
    pub entry_ts: i64,
    pub entry_price: f64,
    pub hold_bars: u32,
    /// Present exactly when the trade is closed.
    pub exit: Option<TradeExit>,
}

impl Trade {
    pub fn status(&self) -> TradeStatus {
        if self.exit.is_some() {
            TradeStatus::Closed
        } else {
            TradeStatus::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    pub fn hold_secs(&self) -> i64 {
        i64::from(self.hold_bars) * BAR_SECS
    }

    /// True once `now` is at least `hold_bars` bars past entry.
    pub fn is_due(&self, now: i64) -> bool {
        now - self.entry_ts >= self.hold_secs()
    }

    pub fn exit_at(&self, exit_ts: i64, exit_price: f64) -> TradeExit {
        TradeExit {
            exit_ts,
            exit_price,
            gross_bps: gross_bps(self.direction, self.entry_price, exit_price),
        }
    }
}

/// Return in basis points, sign-flipped for shorts.
pub fn gross_bps(direction: Direction, entry_price: f64, exit_price: f64) -> f64 {
    (exit_price / entry_price - 1.0) * 10_000.0 * direction.sign()
}
