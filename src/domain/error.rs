//! Domain error types.

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PaperError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("input parse error in {file} (line {line}): {reason}")]
    InputParse {
        file: String,
        line: u64,
        reason: String,
    },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("trade #{id} is not open")]
    TradeNotOpen { id: i64 },

    #[error("unknown signal name: {name}")]
    UnknownSignal { name: String },

    #[error("no stored state for signal {signal}")]
    MissingSignalState { signal: String },

    #[error("event sink {sink} failed: {reason}")]
    EventSink { sink: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PaperError> for std::process::ExitCode {
    fn from(err: &PaperError) -> Self {
        let code: u8 = match err {
            PaperError::Io(_) => 1,
            PaperError::ConfigParse { .. }
            | PaperError::ConfigMissing { .. }
            | PaperError::ConfigInvalid { .. } => 2,
            PaperError::Database { .. } | PaperError::DatabaseQuery { .. } => 3,
            PaperError::InputParse { .. } => 4,
            PaperError::InsufficientData { .. }
            | PaperError::TradeNotOpen { .. }
            | PaperError::UnknownSignal { .. }
            | PaperError::MissingSignalState { .. } => 5,
            PaperError::EventSink { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = PaperError::ConfigInvalid {
            section: "engine".into(),
            key: "rank_window".into(),
            reason: "must be at least 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value [engine] rank_window: must be at least 1"
        );

        let err = PaperError::TradeNotOpen { id: 42 };
        assert_eq!(err.to_string(), "trade #42 is not open");
    }

    #[test]
    fn exit_codes_group_by_family() {
        use std::process::ExitCode;

        let cases = [
            (
                PaperError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                },
                ExitCode::from(2),
            ),
            (
                PaperError::Database {
                    reason: "locked".into(),
                },
                ExitCode::from(3),
            ),
            (
                PaperError::InputParse {
                    file: "btc.csv".into(),
                    line: 3,
                    reason: "bad close".into(),
                },
                ExitCode::from(4),
            ),
            (PaperError::TradeNotOpen { id: 1 }, ExitCode::from(5)),
        ];

        for (err, expected) in cases {
            assert_eq!(ExitCode::from(&err), expected, "{err}");
        }
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PaperError = io.into();
        assert!(matches!(err, PaperError::Io(_)));
    }
}
