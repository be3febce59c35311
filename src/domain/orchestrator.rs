//! Bar orchestrator.
//!
//! Owns the feature cache, the last primary bar marker and the freshness
//! latch handle. Every primary candle is persisted. Once enough primary
//! history is retained alongside at least one reference candle and one
//! liquidation row, features are recomputed and a feature update is emitted.
//! Only a candle that advances the primary timestamp runs the retention
//! prune, exit check, signal evaluation and trade opening, in that order.
//! Calls must be serialized.

use crate::domain::config::EngineConfig;
use crate::domain::error::PaperError;
use crate::domain::events::{CoreEvent, EventBus};
use crate::domain::features::{FeatureRow, compute_features};
use crate::domain::liquidation::FreshnessLatch;
use crate::domain::market::{BAR_SECS, Candle, HOUR_SECS};
use crate::domain::signal::Firing;
use crate::domain::signal_eval::evaluate_signals;
use crate::domain::trade::Trade;
use crate::domain::trade_manager::{check_exits, open_on_firings};
use crate::ports::storage_port::StoragePort;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarKind {
    /// Primary timestamp advanced.
    NewBar,
    /// Revision of the current primary bar.
    SameBar,
    /// Revision of a primary bar older than the current one.
    StaleBar,
    /// Any non-primary candle; persisted only.
    OtherAsset,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrchestratorState {
    pub latest: Option<FeatureRow>,
    pub last_primary_ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarOutcome {
    pub kind: BarKind,
    /// `None` when features were not recomputed for this candle.
    pub features: Option<FeatureRow>,
    pub pruned: bool,
    pub firings: Vec<Firing>,
    pub opened: Vec<Trade>,
    pub closed: Vec<Trade>,
}

impl BarOutcome {
    fn new(kind: BarKind) -> Self {
        Self {
            kind,
            features: None,
            pruned: false,
            firings: Vec::new(),
            opened: Vec::new(),
            closed: Vec::new(),
        }
    }
}

pub struct BarOrchestrator {
    store: Arc<dyn StoragePort>,
    events: EventBus,
    config: EngineConfig,
    latch: FreshnessLatch,
    state: OrchestratorState,
}

impl BarOrchestrator {
    pub fn new(
        store: Arc<dyn StoragePort>,
        events: EventBus,
        config: EngineConfig,
        latch: FreshnessLatch,
    ) -> Self {
        Self {
            store,
            events,
            config,
            latch,
            state: OrchestratorState::default(),
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn latch(&self) -> &FreshnessLatch {
        &self.latch
    }

    pub fn on_candle(&mut self, candle: Candle) -> Result<BarOutcome, PaperError> {
        self.store.upsert_candles(std::slice::from_ref(&candle))?;

        if candle.symbol != self.config.primary_symbol {
            return Ok(BarOutcome::new(BarKind::OtherAsset));
        }

        let ts = candle.ts;
        let kind = match self.state.last_primary_ts {
            Some(last) if ts == last => BarKind::SameBar,
            Some(last) if ts < last => BarKind::StaleBar,
            _ => BarKind::NewBar,
        };
        if kind == BarKind::NewBar {
            self.state.last_primary_ts = Some(ts);
        }

        let mut outcome = BarOutcome::new(kind);
        outcome.features = self.refresh_features()?;

        if kind != BarKind::NewBar {
            return Ok(outcome);
        }

        if is_prune_bar(ts) {
            let cutoff = ts - self.config.retention_secs;
            self.store.prune_older_than(cutoff)?;
            outcome.pruned = true;
            debug!(cutoff, "pruned retained history");
        }

        let Some(row) = outcome.features.clone() else {
            return Ok(outcome);
        };

        outcome.closed = check_exits(self.store.as_ref(), &self.events, ts, candle.close)?;

        let book = self.store.signal_book()?;
        let fresh = self.latch.take();
        outcome.firings = evaluate_signals(&row.features, ts, fresh, &book);
        if !outcome.firings.is_empty() {
            info!(ts, fresh, count = outcome.firings.len(), "signals fired");
        }

        outcome.opened = open_on_firings(
            self.store.as_ref(),
            &self.events,
            &outcome.firings,
            ts,
            candle.close,
        )?;

        Ok(outcome)
    }

    /// Recomputes the feature table and publishes its newest row. Returns
    /// `None` while fewer than `min_primary_bars` primary candles are
    /// retained, or while no reference candle or no liquidation row is.
    fn refresh_features(&mut self) -> Result<Option<FeatureRow>, PaperError> {
        let primary = self.store.fetch_candles(&self.config.primary_symbol)?;
        if primary.len() < self.config.min_primary_bars {
            debug!(
                bars = primary.len(),
                minimum = self.config.min_primary_bars,
                "not enough primary history for features"
            );
            return Ok(None);
        }
        let reference = self.store.fetch_candles(&self.config.reference_symbol)?;
        if reference.is_empty() {
            debug!(symbol = %self.config.reference_symbol, "no reference candles yet");
            return Ok(None);
        }
        let liquidations = self
            .store
            .fetch_liquidations(&self.config.liquidation_symbol)?;
        if liquidations.is_empty() {
            debug!(symbol = %self.config.liquidation_symbol, "no liquidation rows yet");
            return Ok(None);
        }

        let table = compute_features(&primary, &reference, &liquidations, self.config.rank_window)?;
        let Some(row) = table.latest().cloned() else {
            return Ok(None);
        };

        self.events.publish(&CoreEvent::FeatureUpdate {
            ts: row.ts,
            features: row.features,
        });
        self.state.latest = Some(row.clone());
        Ok(Some(row))
    }
}

/// First primary bar of each hour.
pub fn is_prune_bar(ts: i64) -> bool {
    ts.rem_euclid(HOUR_SECS) < BAR_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_runs_on_first_bar_of_hour() {
        assert!(is_prune_bar(0));
        assert!(is_prune_bar(7_200));
        assert!(is_prune_bar(7_200 + 299));
        assert!(!is_prune_bar(7_200 + 300));
        assert!(!is_prune_bar(7_200 + 3_300));
    }
}
