//! SQLite storage adapter.

use crate::domain::error::PaperError;
use crate::domain::market::{Candle, LiquidationRecord};
use crate::domain::signal::{Direction, SignalBook, SignalId, SignalState};
use crate::domain::trade::{NewTrade, Trade, TradeExit, TradeFilter};
use crate::ports::config_port::ConfigPort;
use crate::ports::storage_port::StoragePort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

const TRADE_COLUMNS: &str = "id, signal, direction, entry_ts, entry_price, hold_bars, \
                             exit_ts, exit_price, gross_bps";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PaperError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| PaperError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|c| c.execute_batch("PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| PaperError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Single-connection pool so every checkout sees the same database.
    pub fn in_memory() -> Result<Self, PaperError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| PaperError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Creates tables and seeds one state row per catalogue signal.
    /// Safe to run against an existing database.
    pub fn initialize_schema(&self) -> Result<(), PaperError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candles_5m (
                ts INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (ts, symbol)
            );
            CREATE INDEX IF NOT EXISTS idx_candles_symbol_ts ON candles_5m(symbol, ts);
            CREATE TABLE IF NOT EXISTS liquidations_1h (
                ts INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                long_liq_usd REAL NOT NULL,
                short_liq_usd REAL NOT NULL,
                PRIMARY KEY (ts, symbol)
            );
            CREATE TABLE IF NOT EXISTS paper_trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                signal TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_ts INTEGER NOT NULL,
                entry_price REAL NOT NULL,
                hold_bars INTEGER NOT NULL,
                exit_ts INTEGER,
                exit_price REAL,
                gross_bps REAL,
                status TEXT NOT NULL DEFAULT 'OPEN'
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_trades_one_open
                ON paper_trades(signal) WHERE status = 'OPEN';
            CREATE TABLE IF NOT EXISTS signal_state (
                signal TEXT PRIMARY KEY,
                last_fire_ts INTEGER,
                last_fire_dir TEXT,
                open_trade_id INTEGER
            );",
        )
        .map_err(query_err)?;

        for id in SignalId::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO signal_state (signal) VALUES (?1)",
                params![id.as_str()],
            )
            .map_err(query_err)?;
        }

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PaperError> {
        self.pool.get().map_err(|e: r2d2::Error| PaperError::Database {
            reason: e.to_string(),
        })
    }
}

fn query_err(e: rusqlite::Error) -> PaperError {
    PaperError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Raw `paper_trades` columns, converted after the row is read so that
/// enum parse failures surface as domain errors.
struct TradeRow {
    id: i64,
    signal: String,
    direction: String,
    entry_ts: i64,
    entry_price: f64,
    hold_bars: i64,
    exit_ts: Option<i64>,
    exit_price: Option<f64>,
    gross_bps: Option<f64>,
}

impl TradeRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            signal: row.get(1)?,
            direction: row.get(2)?,
            entry_ts: row.get(3)?,
            entry_price: row.get(4)?,
            hold_bars: row.get(5)?,
            exit_ts: row.get(6)?,
            exit_price: row.get(7)?,
            gross_bps: row.get(8)?,
        })
    }

    fn into_trade(self) -> Result<Trade, PaperError> {
        let exit = match (self.exit_ts, self.exit_price, self.gross_bps) {
            (Some(exit_ts), Some(exit_price), Some(gross_bps)) => Some(TradeExit {
                exit_ts,
                exit_price,
                gross_bps,
            }),
            _ => None,
        };
        Ok(Trade {
            id: self.id,
            signal: self.signal.parse()?,
            direction: self.direction.parse()?,
            entry_ts: self.entry_ts,
            entry_price: self.entry_price,
            hold_bars: u32::try_from(self.hold_bars).map_err(|_| PaperError::DatabaseQuery {
                reason: format!("trade #{} has invalid hold_bars {}", self.id, self.hold_bars),
            })?,
            exit,
        })
    }
}

fn load_trade(conn: &rusqlite::Connection, id: i64) -> Result<Option<Trade>, PaperError> {
    let sql = format!("SELECT {TRADE_COLUMNS} FROM paper_trades WHERE id = ?1");
    conn.query_row(&sql, params![id], TradeRow::read)
        .optional()
        .map_err(query_err)?
        .map(TradeRow::into_trade)
        .transpose()
}

fn collect_trades(
    conn: &rusqlite::Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Trade>, PaperError> {
    let mut stmt = conn.prepare(sql).map_err(query_err)?;
    let rows = stmt.query_map(args, TradeRow::read).map_err(query_err)?;

    let mut trades = Vec::new();
    for row in rows {
        trades.push(row.map_err(query_err)?.into_trade()?);
    }
    Ok(trades)
}

impl StoragePort for SqliteAdapter {
    fn upsert_candles(&self, candles: &[Candle]) -> Result<(), PaperError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for c in candles {
            tx.execute(
                "INSERT OR REPLACE INTO candles_5m (ts, symbol, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![c.ts, c.symbol, c.open, c.high, c.low, c.close, c.volume],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn upsert_liquidations(&self, records: &[LiquidationRecord]) -> Result<(), PaperError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for r in records {
            tx.execute(
                "INSERT OR REPLACE INTO liquidations_1h (ts, symbol, long_liq_usd, short_liq_usd)
                 VALUES (?1, ?2, ?3, ?4)",
                params![r.ts, r.symbol, r.long_liq_usd, r.short_liq_usd],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn fetch_candles(&self, symbol: &str) -> Result<Vec<Candle>, PaperError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ts, symbol, open, high, low, close, volume
                 FROM candles_5m WHERE symbol = ?1 ORDER BY ts ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok(Candle {
                    ts: row.get(0)?,
                    symbol: row.get(1)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn fetch_liquidations(&self, symbol: &str) -> Result<Vec<LiquidationRecord>, PaperError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ts, symbol, long_liq_usd, short_liq_usd
                 FROM liquidations_1h WHERE symbol = ?1 ORDER BY ts ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![symbol], |row| {
                Ok(LiquidationRecord {
                    ts: row.get(0)?,
                    symbol: row.get(1)?,
                    long_liq_usd: row.get(2)?,
                    short_liq_usd: row.get(3)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn latest_liquidation_ts(&self, symbol: &str) -> Result<Option<i64>, PaperError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT MAX(ts) FROM liquidations_1h WHERE symbol = ?1",
            params![symbol],
            |row| row.get(0),
        )
        .map_err(query_err)
    }

    fn insert_trade(&self, trade: &NewTrade) -> Result<Trade, PaperError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute(
            "INSERT INTO paper_trades (signal, direction, entry_ts, entry_price, hold_bars, status)
             VALUES (?1, ?2, ?3, ?4, ?5, 'OPEN')",
            params![
                trade.signal.as_str(),
                trade.direction.as_str(),
                trade.entry_ts,
                trade.entry_price,
                trade.hold_bars
            ],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();

        let updated = tx
            .execute(
                "UPDATE signal_state
                 SET last_fire_ts = ?1, last_fire_dir = ?2, open_trade_id = ?3
                 WHERE signal = ?4",
                params![
                    trade.entry_ts,
                    trade.direction.as_str(),
                    id,
                    trade.signal.as_str()
                ],
            )
            .map_err(query_err)?;
        if updated == 0 {
            return Err(PaperError::MissingSignalState {
                signal: trade.signal.to_string(),
            });
        }

        tx.commit().map_err(query_err)?;

        Ok(Trade {
            id,
            signal: trade.signal,
            direction: trade.direction,
            entry_ts: trade.entry_ts,
            entry_price: trade.entry_price,
            hold_bars: trade.hold_bars,
            exit: None,
        })
    }

    fn close_trade(&self, id: i64, exit: &TradeExit) -> Result<Trade, PaperError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let mut trade = match load_trade(&tx, id)? {
            Some(t) if t.is_open() => t,
            _ => return Err(PaperError::TradeNotOpen { id }),
        };

        tx.execute(
            "UPDATE paper_trades
             SET exit_ts = ?1, exit_price = ?2, gross_bps = ?3, status = 'CLOSED'
             WHERE id = ?4",
            params![exit.exit_ts, exit.exit_price, exit.gross_bps, id],
        )
        .map_err(query_err)?;
        tx.execute(
            "UPDATE signal_state SET open_trade_id = NULL
             WHERE signal = ?1 AND open_trade_id = ?2",
            params![trade.signal.as_str(), id],
        )
        .map_err(query_err)?;

        tx.commit().map_err(query_err)?;

        trade.exit = Some(*exit);
        Ok(trade)
    }

    fn open_trades(&self) -> Result<Vec<Trade>, PaperError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {TRADE_COLUMNS} FROM paper_trades
             WHERE status = 'OPEN' ORDER BY entry_ts ASC, id ASC"
        );
        collect_trades(&conn, &sql, params![])
    }

    fn trades(&self, filter: TradeFilter, limit: usize) -> Result<Vec<Trade>, PaperError> {
        let conn = self.conn()?;
        let clause = match filter {
            TradeFilter::All => "",
            TradeFilter::Open => "WHERE status = 'OPEN'",
            TradeFilter::Closed => "WHERE status = 'CLOSED'",
        };
        let sql = format!(
            "SELECT {TRADE_COLUMNS} FROM paper_trades {clause}
             ORDER BY entry_ts DESC, id DESC LIMIT ?1"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        collect_trades(&conn, &sql, params![limit])
    }

    fn signal_book(&self) -> Result<SignalBook, PaperError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT signal, last_fire_ts, last_fire_dir, open_trade_id FROM signal_state")
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })
            .map_err(query_err)?;

        let mut states = Vec::with_capacity(SignalId::ALL.len());
        for row in rows {
            let (signal, last_fire_ts, last_fire_dir, open_trade_id) = row.map_err(query_err)?;
            // Rows for signals no longer in the catalogue are ignored.
            let Ok(id) = signal.parse::<SignalId>() else {
                continue;
            };
            let last_fire_dir = last_fire_dir
                .map(|d| d.parse::<Direction>())
                .transpose()?;
            states.push((
                id,
                SignalState {
                    last_fire_ts,
                    last_fire_dir,
                    open_trade_id,
                },
            ));
        }

        SignalBook::from_rows(states)
    }

    fn prune_older_than(&self, cutoff_ts: i64) -> Result<(), PaperError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute("DELETE FROM candles_5m WHERE ts < ?1", params![cutoff_ts])
            .map_err(query_err)?;
        tx.execute("DELETE FROM liquidations_1h WHERE ts < ?1", params![cutoff_ts])
            .map_err(query_err)?;
        tx.commit().map_err(query_err)
    }
}
