//! Trade lifecycle: open a paper trade per firing, close trades whose hold
//! has elapsed. Callers run [`check_exits`] before [`open_on_firings`] on the
//! same bar so a maturing trade frees its signal for re-entry.

use crate::domain::error::PaperError;
use crate::domain::events::{CoreEvent, EventBus};
use crate::domain::signal::Firing;
use crate::domain::trade::{NewTrade, Trade};
use crate::ports::storage_port::StoragePort;
use tracing::{debug, info, warn};

/// Opens a trade for each firing whose signal has no open trade.
///
/// Returns the trades created, in firing order.
pub fn open_on_firings(
    store: &dyn StoragePort,
    events: &EventBus,
    firings: &[Firing],
    ts: i64,
    price: f64,
) -> Result<Vec<Trade>, PaperError> {
    if firings.is_empty() {
        return Ok(Vec::new());
    }

    let mut book = store.signal_book()?;
    let mut opened = Vec::new();

    for firing in firings {
        if let Some(open_id) = book.get(firing.signal).open_trade_id {
            debug!(signal = %firing.signal, open_id, "signal already has an open trade, skipping");
            continue;
        }

        let trade = store.insert_trade(&NewTrade::from_firing(firing, ts, price))?;
        let state = book.get_mut(firing.signal);
        state.open_trade_id = Some(trade.id);
        state.last_fire_ts = Some(ts);
        state.last_fire_dir = Some(firing.direction);

        info!(
            trade_id = trade.id,
            signal = %trade.signal,
            direction = %trade.direction,
            "opened trade @ {:.2} (hold {} bars)",
            price,
            trade.hold_bars
        );
        events.publish(&CoreEvent::SignalFire {
            trade_id: trade.id,
            signal: trade.signal,
            direction: trade.direction,
            entry_price: trade.entry_price,
            ts,
        });
        opened.push(trade);
    }

    Ok(opened)
}

/// Closes every open trade held for at least its `hold_bars`.
///
/// A trade that storage no longer reports as open is logged and skipped;
/// any other storage failure aborts the pass.
pub fn check_exits(
    store: &dyn StoragePort,
    events: &EventBus,
    ts: i64,
    price: f64,
) -> Result<Vec<Trade>, PaperError> {
    let mut closed = Vec::new();

    for trade in store.open_trades()? {
        if !trade.is_due(ts) {
            continue;
        }

        let exit = trade.exit_at(ts, price);
        let trade = match store.close_trade(trade.id, &exit) {
            Ok(t) => t,
            Err(PaperError::TradeNotOpen { id }) => {
                warn!(trade_id = id, "trade vanished or already closed, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };

        info!(
            trade_id = trade.id,
            signal = %trade.signal,
            direction = %trade.direction,
            "closed trade gross={:.1} bps",
            exit.gross_bps
        );
        events.publish(&CoreEvent::TradeClose {
            trade_id: trade.id,
            signal: trade.signal,
            direction: trade.direction,
            entry_price: trade.entry_price,
            exit_price: exit.exit_price,
            gross_bps: exit.gross_bps,
            ts,
        });
        closed.push(trade);
    }

    Ok(closed)
}
