//! Accrual Worker
//!
//! Background actor that reconciles not-finished orders against the
//! accrual system. One tick at a time: the tick body runs inline in the
//! actor loop, so a tick always finishes (batch commit included) before
//! the next timer fire or control message is looked at.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::entities::order::{OrderStatus, OrderUpdate};
use crate::domain::repositories::accrual_oracle::{AccrualOracle, OracleError};
use crate::domain::repositories::ledger_store::OrderStore;
use crate::domain::value_objects::points::Points;

/// Channel capacity for worker control messages
const WORKER_CHANNEL_CAPACITY: usize = 16;

/// Messages that can be sent to the accrual worker
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run one tick now and report on it
    TickNow { reply: oneshot::Sender<TickReport> },

    /// Get running totals
    GetStats { reply: oneshot::Sender<WorkerStats> },

    /// Stop taking ticks and exit the loop
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Timer period; also the deadline for a tick's listing and oracle calls
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Outcome of a single tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Orders that were not finished at the start of the tick
    pub pending: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub staged: usize,
    /// Staged updates were committed
    pub applied: bool,
    /// The tick did not run because the accrual system asked us to back off
    pub paused: bool,
    pub rate_limited: bool,
    pub deadline_exceeded: bool,
}

/// Accrual worker statistics
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    pub ticks: u64,
    pub orders_updated: u64,
    pub fetch_failures: u64,
    pub failed_batches: u64,
    pub last_tick: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("accrual worker is not running")]
    Stopped,
}

pub struct AccrualWorker {
    orders: Arc<dyn OrderStore>,
    oracle: Arc<dyn AccrualOracle>,
    config: WorkerConfig,
    stats: WorkerStats,
    paused_until: Option<Instant>,
}

impl AccrualWorker {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        oracle: Arc<dyn AccrualOracle>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            orders,
            oracle,
            config,
            stats: WorkerStats::default(),
            paused_until: None,
        }
    }

    /// Spawn the worker loop and return its handle
    pub fn spawn(
        orders: Arc<dyn OrderStore>,
        oracle: Arc<dyn AccrualOracle>,
        config: WorkerConfig,
    ) -> AccrualWorkerHandle {
        let (tx, rx) = mpsc::channel(WORKER_CHANNEL_CAPACITY);
        let worker = Self::new(orders, oracle, config);
        let task = tokio::spawn(worker.run(rx));

        info!("AccrualWorker spawned");
        AccrualWorkerHandle { tx, task }
    }

    /// Main actor loop
    async fn run(mut self, mut rx: mpsc::Receiver<WorkerMessage>) {
        let period = self.config.poll_interval;
        info!("AccrualWorker started with interval {:?}", period);

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }

                msg = rx.recv() => {
                    match msg {
                        Some(WorkerMessage::TickNow { reply }) => {
                            let report = self.tick().await;
                            if reply.send(report).is_err() {
                                debug!("TickNow caller went away before the reply");
                            }
                        }
                        Some(WorkerMessage::GetStats { reply }) => {
                            if reply.send(self.stats.clone()).is_err() {
                                debug!("GetStats caller went away before the reply");
                            }
                        }
                        Some(WorkerMessage::Shutdown) => {
                            info!("AccrualWorker received shutdown signal");
                            break;
                        }
                        None => {
                            warn!("AccrualWorker control channel closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("AccrualWorker stopped");
    }

    /// Run one reconciliation pass
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if let Some(until) = self.paused_until {
            if Instant::now() < until {
                debug!("Accrual system back-off in effect, skipping tick");
                report.paused = true;
                return report;
            }
            self.paused_until = None;
        }

        self.stats.ticks += 1;
        self.stats.last_tick = Some(Utc::now());
        let deadline = Instant::now() + self.config.poll_interval;

        let pending = match timeout_at(deadline, self.orders.list_not_finished()).await {
            Ok(Ok(orders)) => orders,
            Ok(Err(e)) => {
                error!("Failed to list not-finished orders: {}", e);
                return report;
            }
            Err(_) => {
                warn!("Tick deadline reached while listing not-finished orders");
                report.deadline_exceeded = true;
                return report;
            }
        };
        report.pending = pending.len();

        let mut staged = Vec::new();
        for order in &pending {
            let fetched = match timeout_at(deadline, self.oracle.fetch_status(&order.number)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Tick deadline reached, leaving {} orders for the next tick",
                        report.pending - report.fetched - report.skipped
                    );
                    report.deadline_exceeded = true;
                    break;
                }
            };

            match fetched {
                Ok(oracle_report) => {
                    report.fetched += 1;
                    let status = oracle_report.status.to_order_status();
                    if !order.status.advances_to(status) {
                        if status != order.status {
                            debug!("Order {}: ignoring {} -> {}", order.number, order.status, status);
                        }
                        continue;
                    }
                    let accrual = if status == OrderStatus::Processed {
                        oracle_report.accrual
                    } else {
                        Points::ZERO
                    };
                    debug!("Order {}: {} -> {} ({})", order.number, order.status, status, accrual);
                    staged.push(OrderUpdate {
                        number: order.number.clone(),
                        status,
                        accrual,
                    });
                }
                Err(OracleError::RateLimited { retry_after }) => {
                    warn!("Accrual system asked to back off for {:?}", retry_after);
                    self.paused_until = Some(Instant::now() + retry_after);
                    report.rate_limited = true;
                    report.skipped += 1;
                    break;
                }
                Err(OracleError::NotRegistered) => {
                    debug!("Order {} is not registered with the accrual system yet", order.number);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Accrual lookup for order {} failed: {}", order.number, e);
                    self.stats.fetch_failures += 1;
                    report.skipped += 1;
                }
            }
        }

        report.staged = staged.len();
        if staged.is_empty() {
            return report;
        }

        match self.orders.update_orders(&staged).await {
            Ok(()) => {
                info!("Applied {} accrual updates", staged.len());
                self.stats.orders_updated += staged.len() as u64;
                report.applied = true;
            }
            Err(e) => {
                error!("Accrual batch of {} updates rolled back: {}", staged.len(), e);
                self.stats.failed_batches += 1;
            }
        }

        report
    }
}

/// Start/stop handle for a spawned [`AccrualWorker`]
pub struct AccrualWorkerHandle {
    tx: mpsc::Sender<WorkerMessage>,
    task: JoinHandle<()>,
}

impl AccrualWorkerHandle {
    /// Run a tick out of schedule, queued behind any tick in progress
    pub async fn tick_now(&self) -> Result<TickReport, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerMessage::TickNow { reply })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        rx.await.map_err(|_| WorkerError::Stopped)
    }

    pub async fn stats(&self) -> Result<WorkerStats, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerMessage::GetStats { reply })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        rx.await.map_err(|_| WorkerError::Stopped)
    }

    /// Stop the timer and wait for any in-flight tick to finish
    pub async fn stop(self) {
        if self.tx.send(WorkerMessage::Shutdown).await.is_err() {
            debug!("AccrualWorker already stopped");
        }
        if let Err(e) = self.task.await {
            error!("AccrualWorker task ended abnormally: {}", e);
        }
    }
}
