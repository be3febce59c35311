//! Events emitted for the presentation layer, and the fan-out bus.

use crate::domain::features::FeatureVector;
use crate::domain::signal::{Direction, SignalId};
use crate::ports::event_port::EventPort;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    FeatureUpdate {
        ts: i64,
        #[serde(flatten)]
        features: FeatureVector,
    },
    SignalFire {
        trade_id: i64,
        signal: SignalId,
        direction: Direction,
        entry_price: f64,
        ts: i64,
    },
    TradeClose {
        trade_id: i64,
        signal: SignalId,
        direction: Direction,
        entry_price: f64,
        exit_price: f64,
        gross_bps: f64,
        ts: i64,
    },
}

impl CoreEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            CoreEvent::FeatureUpdate { .. } => "feature_update",
            CoreEvent::SignalFire { .. } => "signal_fire",
            CoreEvent::TradeClose { .. } => "trade_close",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Delivers every event to each registered port in registration order.
#[derive(Clone, Default)]
pub struct EventBus {
    sinks: Vec<Arc<dyn EventPort>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventPort>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventPort>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Returns how many sinks accepted the event.
    pub fn publish(&self, event: &CoreEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.publish(event) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(sink = sink.name(), event = event.kind(), "event dropped: {e}"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::PaperError;
    use crate::domain::slope::SlopeSign;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl EventPort for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn publish(&self, event: &CoreEvent) -> Result<(), PaperError> {
            self.seen.lock().unwrap().push(event.kind().to_string());
            Ok(())
        }
    }

    struct Broken;

    impl EventPort for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn publish(&self, _event: &CoreEvent) -> Result<(), PaperError> {
            Err(PaperError::EventSink {
                sink: "broken".into(),
                reason: "socket closed".into(),
            })
        }
    }

    #[test]
    fn feature_update_is_flat_json() {
        let event = CoreEvent::FeatureUpdate {
            ts: 600,
            features: FeatureVector {
                reference_slope: SlopeSign::Up,
                volume_rank: 0.5,
                ..FeatureVector::default()
            },
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "feature_update");
        assert_eq!(value["ts"], 600);
        assert_eq!(value["reference_slope"], 1);
        assert_eq!(value["primary_slope_prev"], 0);
        assert_eq!(value["volume_rank"], 0.5);
    }

    #[test]
    fn trade_close_fields() {
        let event = CoreEvent::TradeClose {
            trade_id: 3,
            signal: SignalId::Lq1,
            direction: Direction::Short,
            entry_price: 100.0,
            exit_price: 95.0,
            gross_bps: 500.0,
            ts: 2_400,
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "trade_close");
        assert_eq!(value["signal"], "LQ-1");
        assert_eq!(value["direction"], "SHORT");
        assert_eq!(value["gross_bps"], 500.0);
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let bus = EventBus::new()
            .with_sink(Arc::new(Broken))
            .with_sink(recorder.clone());

        let event = CoreEvent::SignalFire {
            trade_id: 1,
            signal: SignalId::Ca1,
            direction: Direction::Long,
            entry_price: 10.0,
            ts: 0,
        };
        assert_eq!(bus.publish(&event), 1);
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["signal_fire"]);
        assert_eq!(bus.sink_count(), 2);
    }

    #[test]
    fn empty_bus_accepts_events() {
        let bus = EventBus::default();
        let event = CoreEvent::FeatureUpdate {
            ts: 0,
            features: FeatureVector::default(),
        };
        assert_eq!(bus.publish(&event), 0);
    }
}
