//! Hourly EMA slope sign.
//!
//! Closes are resampled to 1-hour last-value buckets (empty hours are skipped),
//! smoothed with an EMA of span 20 (k = 2/21, seeded with the first value),
//! differenced over 3 buckets and reduced to {-1, 0, +1}. The first three
//! buckets have no difference and map to 0.

use crate::domain::market::Candle;

pub const EMA_SPAN: usize = 20;
pub const SLOPE_LAG: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlopeSign {
    Down,
    #[default]
    Flat,
    Up,
}

impl SlopeSign {
    /// NaN maps to `Flat`.
    pub fn from_diff(diff: f64) -> Self {
        if diff > 0.0 {
            SlopeSign::Up
        } else if diff < 0.0 {
            SlopeSign::Down
        } else {
            SlopeSign::Flat
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            SlopeSign::Down => -1,
            SlopeSign::Flat => 0,
            SlopeSign::Up => 1,
        }
    }
}

impl serde::Serialize for SlopeSign {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.as_i8())
    }
}

/// Last close of every hour that has at least one candle, ascending.
pub fn resample_hourly_close(candles: &[Candle]) -> Vec<(i64, f64)> {
    let mut hourly: Vec<(i64, f64)> = Vec::new();
    for candle in candles {
        let hour = candle.hour();
        match hourly.last_mut() {
            Some((last_hour, close)) if *last_hour == hour => *close = candle.close,
            _ => hourly.push((hour, candle.close)),
        }
    }
    hourly
}

/// Recursive EMA seeded with the first value: y[i] = (1-k)*y[i-1] + k*x[i].
pub fn ema_from_first(values: &[f64], span: usize) -> Vec<f64> {
    let k = 2.0 / (span as f64 + 1.0);
    let old_wt = 1.0 - k;
    let mut out = Vec::with_capacity(values.len());
    let mut ema = 0.0;

    for (i, &value) in values.iter().enumerate() {
        ema = if i == 0 {
            value
        } else {
            // normalised by the weight sum, which is not always exactly 1.0
            (old_wt * ema + k * value) / (old_wt + k)
        };
        out.push(ema);
    }

    out
}

/// Slope sign per hourly bucket, labelled by the bucket start.
pub fn hourly_slope_signs(candles: &[Candle]) -> Vec<(i64, SlopeSign)> {
    let hourly = resample_hourly_close(candles);
    let closes: Vec<f64> = hourly.iter().map(|&(_, close)| close).collect();
    let ema = ema_from_first(&closes, EMA_SPAN);

    hourly
        .iter()
        .enumerate()
        .map(|(i, &(hour, _))| {
            let sign = if i >= SLOPE_LAG {
                SlopeSign::from_diff(ema[i] - ema[i - SLOPE_LAG])
            } else {
                SlopeSign::Flat
            };
            (hour, sign)
        })
        .collect()
}

/// Carries an asset's hourly slope sign onto an ascending timestamp grid.
///
/// Each grid point takes the sign of the hour containing the asset's latest
/// candle at or before it, so a gap in the asset's own series holds the
/// previous hour's sign. Grid points before the asset's first candle are `Flat`.
pub fn slope_signs_on_grid(candles: &[Candle], grid: &[i64]) -> Vec<SlopeSign> {
    let hourly = hourly_slope_signs(candles);
    let mut signs = Vec::with_capacity(grid.len());
    let mut seen = 0;
    let mut bucket = 0;

    for &ts in grid {
        while seen < candles.len() && candles[seen].ts <= ts {
            seen += 1;
        }
        if seen == 0 {
            signs.push(SlopeSign::Flat);
            continue;
        }
        let hour = candles[seen - 1].hour();
        while bucket + 1 < hourly.len() && hourly[bucket + 1].0 <= hour {
            bucket += 1;
        }
        signs.push(hourly[bucket].1);
    }

    signs
}

/// The series shifted by one element; the first element's predecessor is `Flat`.
pub fn previous_signs(signs: &[SlopeSign]) -> Vec<SlopeSign> {
    let mut prev = Vec::with_capacity(signs.len());
    if !signs.is_empty() {
        prev.push(SlopeSign::Flat);
        prev.extend_from_slice(&signs[..signs.len() - 1]);
    }
    prev
}
