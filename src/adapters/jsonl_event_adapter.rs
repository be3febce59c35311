//! Writes each event as one JSON line.

use crate::domain::error::PaperError;
use crate::domain::events::CoreEvent;
use crate::ports::event_port::EventPort;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

pub struct JsonLinesEventAdapter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesEventAdapter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, PaperError> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn flush(&self) -> Result<(), PaperError> {
        let mut out = self.out.lock().map_err(|_| sink_err("writer lock poisoned"))?;
        out.flush()?;
        Ok(())
    }
}

fn sink_err(reason: impl Into<String>) -> PaperError {
    PaperError::EventSink {
        sink: "jsonl".into(),
        reason: reason.into(),
    }
}

impl EventPort for JsonLinesEventAdapter {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn publish(&self, event: &CoreEvent) -> Result<(), PaperError> {
        let line = event.to_json().map_err(|e| sink_err(e.to_string()))?;
        let mut out = self.out.lock().map_err(|_| sink_err("writer lock poisoned"))?;
        writeln!(out, "{line}").map_err(|e| sink_err(e.to_string()))
    }
}

impl Drop for JsonLinesEventAdapter {
    fn drop(&mut self) {
        if let Ok(out) = self.out.get_mut() {
            let _ = out.flush();
        }
    }
}
