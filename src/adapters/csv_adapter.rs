//! CSV replay input.
//!
//! Candles: `ts,symbol,open,high,low,close,volume`.
//! Liquidations: `ts,symbol,long_liq_usd,short_liq_usd`.
//! Timestamps are unix seconds. Rows are returned sorted by `(ts, symbol)`.

use crate::domain::error::PaperError;
use crate::domain::market::{Candle, LiquidationRecord};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

pub struct CsvAdapter;

impl CsvAdapter {
    pub fn load_candles<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>, PaperError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut candles: Vec<Candle> = read_rows(file, &path.display().to_string())?;
        candles.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(candles)
    }

    pub fn load_liquidations<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<LiquidationRecord>, PaperError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut records: Vec<LiquidationRecord> = read_rows(file, &path.display().to_string())?;
        records.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(records)
    }
}

fn read_rows<T, R>(reader: R, source: &str) -> Result<Vec<T>, PaperError>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: T = result.map_err(|e: csv::Error| PaperError::InputParse {
            file: source.to_string(),
            line: e.position().map(|p| p.line()).unwrap_or(0),
            reason: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}
