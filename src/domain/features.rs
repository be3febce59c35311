//! Feature engine.
//!
//! Recomputes the full feature table from the retained history on every call:
//! slope signs for the primary and reference assets, the primary volume rank,
//! and long / short / total liquidation ranks, one row per primary timestamp.
//! All inputs must be ascending by timestamp.

use crate::domain::error::PaperError;
use crate::domain::market::{Candle, LiquidationRecord};
use crate::domain::rank::rolling_pct_rank;
use crate::domain::slope::{SlopeSign, previous_signs, slope_signs_on_grid};

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct FeatureVector {
    pub reference_slope: SlopeSign,
    pub reference_slope_prev: SlopeSign,
    pub primary_slope: SlopeSign,
    pub primary_slope_prev: SlopeSign,
    pub volume_rank: f64,
    pub long_liq_rank: f64,
    pub short_liq_rank: f64,
    pub total_liq_rank: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub ts: i64,
    pub features: FeatureVector,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for the newest primary timestamp. Never `None` for a table built
    /// by [`compute_features`].
    pub fn latest(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }
}

/// Liquidation values carried forward onto a timestamp grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignedLiquidations {
    pub long: Vec<f64>,
    pub short: Vec<f64>,
    pub total: Vec<f64>,
}

pub fn compute_features(
    primary: &[Candle],
    reference: &[Candle],
    liquidations: &[LiquidationRecord],
    rank_window: usize,
) -> Result<FeatureTable, PaperError> {
    if primary.is_empty() {
        return Err(PaperError::InsufficientData {
            symbol: "primary".into(),
            bars: 0,
            minimum: 1,
        });
    }

    let grid: Vec<i64> = primary.iter().map(|c| c.ts).collect();

    let primary_slope = slope_signs_on_grid(primary, &grid);
    let primary_prev = previous_signs(&primary_slope);
    let reference_slope = slope_signs_on_grid(reference, &grid);
    let reference_prev = previous_signs(&reference_slope);

    let volumes: Vec<f64> = primary.iter().map(|c| c.volume).collect();
    let volume_rank = rolling_pct_rank(&volumes, rank_window);

    let liq = align_liquidations(liquidations, &grid);
    let long_rank = rolling_pct_rank(&liq.long, rank_window);
    let short_rank = rolling_pct_rank(&liq.short, rank_window);
    let total_rank = rolling_pct_rank(&liq.total, rank_window);

    let rows = grid
        .iter()
        .enumerate()
        .map(|(i, &ts)| FeatureRow {
            ts,
            features: FeatureVector {
                reference_slope: reference_slope[i],
                reference_slope_prev: reference_prev[i],
                primary_slope: primary_slope[i],
                primary_slope_prev: primary_prev[i],
                volume_rank: volume_rank[i],
                long_liq_rank: long_rank[i],
                short_liq_rank: short_rank[i],
                total_liq_rank: total_rank[i],
            },
        })
        .collect();

    Ok(FeatureTable { rows })
}

/// Each grid point takes the latest record at or before it; earlier points get 0.
pub fn align_liquidations(records: &[LiquidationRecord], grid: &[i64]) -> AlignedLiquidations {
    let mut aligned = AlignedLiquidations {
        long: Vec::with_capacity(grid.len()),
        short: Vec::with_capacity(grid.len()),
        total: Vec::with_capacity(grid.len()),
    };
    let mut seen = 0;

    for &ts in grid {
        while seen < records.len() && records[seen].ts <= ts {
            seen += 1;
        }
        match seen.checked_sub(1).map(|i| &records[i]) {
            Some(rec) => {
                aligned.long.push(rec.long_liq_usd);
                aligned.short.push(rec.short_liq_usd);
                aligned.total.push(rec.total_liq_usd());
            }
            None => {
                aligned.long.push(0.0);
                aligned.short.push(0.0);
                aligned.total.push(0.0);
            }
        }
    }

    aligned
}
