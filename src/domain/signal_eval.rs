//! Signal evaluator.
//!
//! A pure function over one feature vector. Triggers:
//!
//! - `CA-1` reference slope changed to a non-zero value
//! - `CA-2` primary slope changed to a non-zero value
//! - `VS-2` `CA-1` trigger and volume rank ≥ 0.80
//! - `VS-3` `VS-2` trigger and total liquidation rank ≥ 0.70
//! - `LQ-1` fresh liquidation reading and long liquidation rank ≥ 0.90, short
//! - `LQ-2` fresh liquidation reading and short liquidation rank ≥ 0.90, long
//! - `LQ-3` reference slope turned to -1 and long liquidation rank ≥ 0.70, short
//!
//! Each signal is deduped against its own last fire independently.

use crate::domain::features::FeatureVector;
use crate::domain::signal::{Direction, Firing, SignalBook, SignalId};
use crate::domain::slope::SlopeSign;

pub const VOLUME_SPIKE_RANK: f64 = 0.80;
pub const TOTAL_LIQ_RANK: f64 = 0.70;
pub const EXTREME_LIQ_RANK: f64 = 0.90;
pub const BEARISH_FLIP_LONG_LIQ_RANK: f64 = 0.70;

/// Firings for one bar, in catalogue order.
pub fn evaluate_signals(
    features: &FeatureVector,
    now: i64,
    fresh_liquidation: bool,
    states: &SignalBook,
) -> Vec<Firing> {
    let reference_flip = flip_direction(features.reference_slope, features.reference_slope_prev);
    let primary_flip = flip_direction(features.primary_slope, features.primary_slope_prev);
    let volume_spike = reference_flip.filter(|_| features.volume_rank >= VOLUME_SPIKE_RANK);
    let liq_confirmed = volume_spike.filter(|_| features.total_liq_rank >= TOTAL_LIQ_RANK);

    let bearish_flip = features.reference_slope == SlopeSign::Down
        && features.reference_slope_prev != SlopeSign::Down;

    let triggers = [
        (SignalId::Ca1, reference_flip),
        (SignalId::Ca2, primary_flip),
        (SignalId::Vs2, volume_spike),
        (SignalId::Vs3, liq_confirmed),
        (
            SignalId::Lq1,
            (fresh_liquidation && features.long_liq_rank >= EXTREME_LIQ_RANK)
                .then_some(Direction::Short),
        ),
        (
            SignalId::Lq2,
            (fresh_liquidation && features.short_liq_rank >= EXTREME_LIQ_RANK)
                .then_some(Direction::Long),
        ),
        (
            SignalId::Lq3,
            (bearish_flip && features.long_liq_rank >= BEARISH_FLIP_LONG_LIQ_RANK)
                .then_some(Direction::Short),
        ),
    ];

    triggers
        .into_iter()
        .filter_map(|(id, direction)| direction.map(|d| Firing::new(id, d)))
        .filter(|firing| !states.get(firing.signal).in_dedup(now, firing.hold_bars))
        .collect()
}

/// Direction of a slope change that lands on a non-zero value.
fn flip_direction(current: SlopeSign, previous: SlopeSign) -> Option<Direction> {
    if current != previous {
        Direction::from_slope(current)
    } else {
        None
    }
}
