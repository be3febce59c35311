//! Signal catalogue, firings and per-signal state.

use crate::domain::error::PaperError;
use crate::domain::market::BAR_SECS;
use crate::domain::slope::SlopeSign;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalId {
    Ca1,
    Ca2,
    Vs2,
    Vs3,
    Lq1,
    Lq2,
    Lq3,
}

impl SignalId {
    /// Catalogue order; also the order firings are reported in.
    pub const ALL: [SignalId; 7] = [
        SignalId::Ca1,
        SignalId::Ca2,
        SignalId::Vs2,
        SignalId::Vs3,
        SignalId::Lq1,
        SignalId::Lq2,
        SignalId::Lq3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalId::Ca1 => "CA-1",
            SignalId::Ca2 => "CA-2",
            SignalId::Vs2 => "VS-2",
            SignalId::Vs3 => "VS-3",
            SignalId::Lq1 => "LQ-1",
            SignalId::Lq2 => "LQ-2",
            SignalId::Lq3 => "LQ-3",
        }
    }

    pub fn hold_bars(self) -> u32 {
        match self {
            SignalId::Vs2 | SignalId::Vs3 => 12,
            SignalId::Ca1 | SignalId::Ca2 | SignalId::Lq1 | SignalId::Lq2 | SignalId::Lq3 => 8,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalId {
    type Err = PaperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| PaperError::UnknownSignal { name: s.to_string() })
    }
}

impl serde::Serialize for SignalId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Direction of a non-flat slope.
    pub fn from_slope(slope: SlopeSign) -> Option<Self> {
        match slope {
            SlopeSign::Up => Some(Direction::Long),
            SlopeSign::Down => Some(Direction::Short),
            SlopeSign::Flat => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = PaperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(PaperError::DatabaseQuery {
                reason: format!("invalid direction: {other}"),
            }),
        }
    }
}

/// One signal firing on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firing {
    pub signal: SignalId,
    pub direction: Direction,
    pub hold_bars: u32,
}

impl Firing {
    pub fn new(signal: SignalId, direction: Direction) -> Self {
        Self {
            signal,
            direction,
            hold_bars: signal.hold_bars(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct SignalState {
    pub last_fire_ts: Option<i64>,
    pub last_fire_dir: Option<Direction>,
    pub open_trade_id: Option<i64>,
}

impl SignalState {
    /// True while `now` is inside the dedup window of the last fire.
    pub fn in_dedup(&self, now: i64, hold_bars: u32) -> bool {
        match self.last_fire_ts {
            Some(last) => now - last < i64::from(hold_bars) * BAR_SECS,
            None => false,
        }
    }
}

/// State for every catalogue signal, indexed by [`SignalId`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignalBook {
    states: [SignalState; 7],
}

impl SignalBook {
    /// Builds a book from stored rows; every catalogue signal must appear.
    pub fn from_rows<I>(rows: I) -> Result<Self, PaperError>
    where
        I: IntoIterator<Item = (SignalId, SignalState)>,
    {
        let mut states: [Option<SignalState>; 7] = [None; 7];
        for (id, state) in rows {
            states[id.index()] = Some(state);
        }

        let mut book = SignalBook::default();
        for id in SignalId::ALL {
            book.states[id.index()] =
                states[id.index()].ok_or_else(|| PaperError::MissingSignalState {
                    signal: id.to_string(),
                })?;
        }
        Ok(book)
    }

    pub fn get(&self, id: SignalId) -> &SignalState {
        &self.states[id.index()]
    }

    pub fn get_mut(&mut self, id: SignalId) -> &mut SignalState {
        &mut self.states[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalId, &SignalState)> {
        SignalId::ALL.into_iter().map(|id| (id, self.get(id)))
    }
}
