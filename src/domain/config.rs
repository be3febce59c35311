//! Engine configuration built from a [`ConfigPort`] and validated up front.

use crate::domain::error::PaperError;
use crate::domain::market::BAR_SECS;
use crate::domain::rank::RANK_WINDOW;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_RETENTION_SECS: i64 = 30 * 24 * 3600;
pub const DEFAULT_MIN_PRIMARY_BARS: usize = 2;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;
/// An hourly liquidation record is polled two minutes after its hour closes.
pub const DEFAULT_LIQUIDATION_DELAY_SECS: i64 = 3720;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub primary_symbol: String,
    pub reference_symbol: String,
    pub liquidation_symbol: String,
    pub rank_window: usize,
    pub retention_secs: i64,
    pub min_primary_bars: usize,
    pub queue_capacity: usize,
    pub liquidation_delay_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_symbol: "BTC-USD".into(),
            reference_symbol: "ETH-USD".into(),
            liquidation_symbol: "BTC".into(),
            rank_window: RANK_WINDOW,
            retention_secs: DEFAULT_RETENTION_SECS,
            min_primary_bars: DEFAULT_MIN_PRIMARY_BARS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            liquidation_delay_secs: DEFAULT_LIQUIDATION_DELAY_SECS,
        }
    }
}

impl EngineConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, PaperError> {
        let defaults = EngineConfig::default();

        let built = EngineConfig {
            primary_symbol: symbol(config, "primary_symbol", &defaults.primary_symbol)?,
            reference_symbol: symbol(config, "reference_symbol", &defaults.reference_symbol)?,
            liquidation_symbol: symbol(
                config,
                "liquidation_symbol",
                &defaults.liquidation_symbol,
            )?,
            rank_window: positive(config, "engine", "rank_window", defaults.rank_window as i64)?
                as usize,
            retention_secs: positive(config, "engine", "retention_secs", defaults.retention_secs)?,
            min_primary_bars: positive(
                config,
                "engine",
                "min_primary_bars",
                defaults.min_primary_bars as i64,
            )? as usize,
            queue_capacity: positive(
                config,
                "engine",
                "queue_capacity",
                defaults.queue_capacity as i64,
            )? as usize,
            liquidation_delay_secs: non_negative(
                config,
                "replay",
                "liquidation_delay_secs",
                defaults.liquidation_delay_secs,
            )?,
        };

        built.validate()?;
        Ok(built)
    }

    fn validate(&self) -> Result<(), PaperError> {
        if self.primary_symbol == self.reference_symbol {
            return Err(PaperError::ConfigInvalid {
                section: "market".into(),
                key: "reference_symbol".into(),
                reason: "reference_symbol must differ from primary_symbol".into(),
            });
        }
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(PaperError::ConfigInvalid {
                section: "engine".into(),
                key: "queue_capacity".into(),
                reason: format!("queue_capacity must be at most {MAX_QUEUE_CAPACITY}"),
            });
        }
        let window_secs = i64::try_from(self.rank_window)
            .ok()
            .and_then(|bars| bars.checked_mul(BAR_SECS))
            .ok_or_else(|| PaperError::ConfigInvalid {
                section: "engine".into(),
                key: "rank_window".into(),
                reason: format!("rank_window ({}) is too large", self.rank_window),
            })?;
        if self.retention_secs < window_secs {
            return Err(PaperError::ConfigInvalid {
                section: "engine".into(),
                key: "retention_secs".into(),
                reason: format!(
                    "retention_secs ({}) must cover rank_window ({} bars = {} s)",
                    self.retention_secs, self.rank_window, window_secs
                ),
            });
        }
        Ok(())
    }
}

fn symbol(config: &dyn ConfigPort, key: &str, default: &str) -> Result<String, PaperError> {
    match config.get_string("market", key) {
        None => Ok(default.to_string()),
        Some(s) if s.trim().is_empty() => Err(PaperError::ConfigInvalid {
            section: "market".into(),
            key: key.into(),
            reason: format!("{key} must not be empty"),
        }),
        Some(s) => Ok(s.trim().to_string()),
    }
}

/// Reads an integer, rejecting values that are present but not numeric.
fn integer(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, PaperError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| PaperError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("expected an integer, got {raw:?}"),
        }),
    }
}

fn positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, PaperError> {
    let value = integer(config, section, key, default)?;
    if value < 1 {
        return Err(PaperError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("{key} must be at least 1"),
        });
    }
    Ok(value)
}

fn non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, PaperError> {
    let value = integer(config, section, key, default)?;
    if value < 0 {
        return Err(PaperError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("{key} must be non-negative"),
        });
    }
    Ok(value)
}
