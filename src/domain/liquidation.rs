//! Liquidation poll ingest and the freshness latch it raises.

use crate::domain::error::PaperError;
use crate::domain::market::LiquidationRecord;
use crate::ports::storage_port::StoragePort;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Single-slot flag shared between the poller and the bar orchestrator.
/// Set and take race as last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct FreshnessLatch {
    flag: Arc<AtomicBool>,
}

impl FreshnessLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns the current value and clears it.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Handles one liquidation poll cycle at a time.
pub struct LiquidationIngest {
    store: Arc<dyn StoragePort>,
    latch: FreshnessLatch,
    tracked_symbol: String,
    last_seen: HashMap<String, i64>,
}

impl LiquidationIngest {
    /// Seeds the last-seen timestamp of `tracked_symbol` from storage.
    pub fn new(
        store: Arc<dyn StoragePort>,
        latch: FreshnessLatch,
        tracked_symbol: &str,
    ) -> Result<Self, PaperError> {
        let mut last_seen = HashMap::new();
        if let Some(ts) = store.latest_liquidation_ts(tracked_symbol)? {
            last_seen.insert(tracked_symbol.to_string(), ts);
        }
        Ok(Self {
            store,
            latch,
            tracked_symbol: tracked_symbol.to_string(),
            last_seen,
        })
    }

    pub fn last_seen(&self, symbol: &str) -> Option<i64> {
        self.last_seen.get(symbol).copied()
    }

    /// Persists each symbol's batch whose newest record advanced. Returns
    /// `true` and raises the latch when the tracked symbol advanced.
    pub fn ingest(&mut self, records: &[LiquidationRecord]) -> Result<bool, PaperError> {
        let mut by_symbol: BTreeMap<&str, Vec<LiquidationRecord>> = BTreeMap::new();
        for rec in records {
            by_symbol.entry(rec.symbol.as_str()).or_default().push(rec.clone());
        }

        let mut fresh = false;
        for (symbol, batch) in by_symbol {
            let Some(latest) = batch.iter().map(|r| r.ts).max() else {
                continue;
            };
            let previous = self.last_seen(symbol);
            if previous.is_some_and(|prev| latest <= prev) {
                debug!(symbol, latest, "no new liquidation reading");
                continue;
            }

            self.store.upsert_liquidations(&batch)?;
            self.last_seen.insert(symbol.to_string(), latest);

            if symbol == self.tracked_symbol {
                self.latch.set();
                fresh = true;
                info!(symbol, ts = latest, "new liquidation reading");
            }
        }

        Ok(fresh)
    }
}
