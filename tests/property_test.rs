//! Property tests for engine invariants.
//!
//! 1. Percentile ranks stay in (0, 1] and match a direct window count
//! 2. Slope features only take values in {-1, 0, +1}
//! 3. At most one open trade per signal after every bar
//! 4. Consecutive entries of a signal are at least its hold apart

mod common;

use common::*;
use papertrader::domain::features::compute_features;
use papertrader::domain::market::BAR_SECS;
use papertrader::domain::rank::{percentile_rank, rolling_pct_rank};
use papertrader::domain::signal::SignalId;
use papertrader::ports::storage_port::StoragePort;
use proptest::prelude::*;
use std::collections::HashMap;

fn arb_values() -> impl Strategy<Value = Vec<f64>> {
    // coarse grid so ties are common
    prop::collection::vec((0u32..20).prop_map(|v| f64::from(v) * 0.5), 1..120)
}

fn arb_steps(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-3.0..3.0_f64, len)
}

proptest! {
    #[test]
    fn rank_bounded_and_matches_window(values in arb_values(), window in 1usize..40) {
        let ranks = rolling_pct_rank(&values, window);
        prop_assert_eq!(ranks.len(), values.len());
        for (i, &rank) in ranks.iter().enumerate() {
            prop_assert!(rank > 0.0 && rank <= 1.0);
            let start = (i + 1).saturating_sub(window);
            let expected = percentile_rank(&values[start..=i], values[i]);
            prop_assert!((rank - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn slopes_are_signs(steps in arb_steps(90), ref_steps in arb_steps(90)) {
        let mut price = 100.0;
        let primary: Vec<_> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                price += s;
                candle(PRIMARY, i as i64 * BAR_SECS, price, 10.0 + s.abs())
            })
            .collect();
        let mut ref_price = 50.0;
        let reference: Vec<_> = ref_steps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                ref_price += s;
                candle(REFERENCE, i as i64 * BAR_SECS, ref_price, 1.0)
            })
            .collect();

        let table = compute_features(&primary, &reference, &[], 8640).unwrap();
        prop_assert_eq!(table.len(), primary.len());
        for row in table.rows() {
            let f = row.features;
            for s in [f.reference_slope, f.reference_slope_prev, f.primary_slope, f.primary_slope_prev] {
                prop_assert!((-1..=1).contains(&s.as_i8()));
            }
            prop_assert!(f.volume_rank > 0.0 && f.volume_rank <= 1.0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn trade_invariants_hold_on_random_streams(
        steps in arb_steps(150),
        ref_steps in arb_steps(150),
        polls in prop::collection::vec(prop::bool::ANY, 150),
        liq_sizes in prop::collection::vec(0.0..1_000.0_f64, 150),
    ) {
        let mut h = harness();
        let mut price = 100.0;
        let mut ref_price = 50.0;

        for i in 0..steps.len() {
            let ts = i as i64 * BAR_SECS;
            price = (price + steps[i]).max(1.0);
            ref_price = (ref_price + ref_steps[i]).max(1.0);

            if polls[i] {
                h.ingest.ingest(&[liq(ts, liq_sizes[i], 1_000.0 - liq_sizes[i])]).unwrap();
            }
            h.orchestrator.on_candle(candle(REFERENCE, ts, ref_price, 1.0)).unwrap();
            h.orchestrator
                .on_candle(candle(PRIMARY, ts, price, 10.0 + steps[i].abs() * 5.0))
                .unwrap();

            let mut open_per_signal: HashMap<SignalId, usize> = HashMap::new();
            for t in h.store.open_trades().unwrap() {
                *open_per_signal.entry(t.signal).or_default() += 1;
            }
            prop_assert!(open_per_signal.values().all(|&n| n <= 1));
        }

        let trades = h.store.all_trades();
        for id in SignalId::ALL {
            let entries: Vec<i64> = trades
                .iter()
                .filter(|t| t.signal == id)
                .map(|t| t.entry_ts)
                .collect();
            for pair in entries.windows(2) {
                prop_assert!(pair[1] - pair[0] >= i64::from(id.hold_bars()) * BAR_SECS);
            }
        }
        for t in trades.iter().filter(|t| !t.is_open()) {
            let exit = t.exit.unwrap();
            prop_assert!(exit.exit_ts - t.entry_ts >= t.hold_secs());
        }
    }
}
