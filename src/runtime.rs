//! Single-consumer processing loop.
//!
//! Candles and liquidation polls enter one bounded FIFO queue and are
//! handled strictly in arrival order, one at a time on the blocking pool, so
//! the orchestrator never runs two cycles at once. A full queue makes
//! senders wait; nothing is dropped. A stop request is seen between
//! messages even while producers are still connected. A failed cycle is
//! logged and the next message is processed.

use crate::domain::error::PaperError;
use crate::domain::liquidation::LiquidationIngest;
use crate::domain::market::{Candle, LiquidationRecord};
use crate::domain::orchestrator::{BarKind, BarOrchestrator};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Candle(Candle),
    Liquidations(Vec<LiquidationRecord>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorReport {
    pub messages: u64,
    pub new_bars: u64,
    pub liquidation_polls: u64,
    pub fresh_polls: u64,
    pub failed_cycles: u64,
    pub opened: u64,
    pub closed: u64,
}

pub struct ProcessorHandle {
    sender: mpsc::Sender<Inbound>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<ProcessorReport>,
}

impl ProcessorHandle {
    /// Producer handle; clones share the same queue.
    pub fn sender(&self) -> mpsc::Sender<Inbound> {
        self.sender.clone()
    }

    /// Waits for queue space when the queue is full.
    pub async fn send(&self, message: Inbound) -> Result<(), PaperError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| PaperError::Io(std::io::Error::other("processor has stopped")))
    }

    /// Raises the shutdown flag. The message in progress finishes; nothing
    /// queued behind it is processed.
    pub fn request_stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Closes this handle's producer side and waits until every queued
    /// message is processed. Other sender clones must be dropped as well,
    /// unless a stop was requested.
    pub async fn finish(self) -> Result<ProcessorReport, PaperError> {
        let ProcessorHandle {
            sender,
            shutdown,
            join,
        } = self;
        drop(sender);
        let report = join
            .await
            .map_err(|e| PaperError::Io(std::io::Error::other(e)));
        drop(shutdown);
        report
    }

    /// Stops before the next message, even while other producers are alive.
    pub async fn stop(self) -> Result<ProcessorReport, PaperError> {
        self.request_stop();
        self.finish().await
    }
}

/// Starts the processing loop. Each message is handled on tokio's blocking
/// pool; the loop itself waits on the queue and the shutdown flag.
pub fn spawn_processor(
    orchestrator: BarOrchestrator,
    ingest: LiquidationIngest,
    capacity: usize,
) -> ProcessorHandle {
    let (sender, rx) = mpsc::channel(capacity.max(1));
    let (shutdown, shutdown_rx) = watch::channel(false);

    let worker = Worker {
        orchestrator,
        ingest,
        report: ProcessorReport::default(),
    };
    let join = tokio::spawn(process(worker, rx, shutdown_rx));

    ProcessorHandle {
        sender,
        shutdown,
        join,
    }
}

async fn process(
    mut worker: Worker,
    mut rx: mpsc::Receiver<Inbound>,
    mut shutdown: watch::Receiver<bool>,
) -> ProcessorReport {
    let mut report = ProcessorReport::default();

    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => {
                info!(processed = report.messages, "shutdown requested, stopping processor");
                break;
            }
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        worker = match tokio::task::spawn_blocking(move || {
            worker.handle(message);
            worker
        })
        .await
        {
            Ok(worker) => worker,
            Err(e) => {
                error!("processing task failed: {e}");
                break;
            }
        };
        report = worker.report.clone();
    }

    info!(
        messages = report.messages,
        new_bars = report.new_bars,
        opened = report.opened,
        closed = report.closed,
        failed = report.failed_cycles,
        "processor stopped"
    );
    report
}

struct Worker {
    orchestrator: BarOrchestrator,
    ingest: LiquidationIngest,
    report: ProcessorReport,
}

impl Worker {
    fn handle(&mut self, message: Inbound) {
        let report = &mut self.report;
        report.messages += 1;

        match message {
            Inbound::Candle(candle) => {
                let ts = candle.ts;
                match self.orchestrator.on_candle(candle) {
                    Ok(outcome) => {
                        if outcome.kind == BarKind::NewBar {
                            report.new_bars += 1;
                        }
                        report.opened += outcome.opened.len() as u64;
                        report.closed += outcome.closed.len() as u64;
                    }
                    Err(e) => {
                        report.failed_cycles += 1;
                        error!(ts, "bar cycle failed: {e}");
                    }
                }
            }
            Inbound::Liquidations(records) => {
                report.liquidation_polls += 1;
                match self.ingest.ingest(&records) {
                    Ok(true) => report.fresh_polls += 1,
                    Ok(false) => debug!(rows = records.len(), "liquidation poll had nothing new"),
                    Err(e) => {
                        report.failed_cycles += 1;
                        error!("liquidation poll failed: {e}");
                    }
                }
            }
        }
    }
}
