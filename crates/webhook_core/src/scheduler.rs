//! Retry scheduling
//!
//! [`RetryScheduler::sweep`] resubmits `retrying` deliveries whose
//! `next_retry_at` has passed. [`RetryScheduler::recover_orphaned`] does the
//! same for `pending` deliveries that never reached a worker and for
//! `delivering` deliveries whose claim lease ran out. Both are safe to run
//! back to back or concurrently with the worker pool because every
//! execution starts with a claim.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::errors::{EngineError, EngineResult};
use crate::executor::DeliveryExecutor;
use crate::ids::DeliveryId;
use crate::store::Store;

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

pub struct RetryScheduler {
    store: Arc<dyn Store>,
    executor: Arc<DeliveryExecutor>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<DeliveryExecutor>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            clock,
            config,
        }
    }

    /// Execute up to `batch_limit` due retries, oldest first.
    ///
    /// Returns the number of executions that ran. Per-record errors are
    /// logged and skipped.
    ///
    /// # Errors
    /// `Store` if the due records cannot be listed.
    pub async fn sweep(&self, batch_limit: usize) -> EngineResult<usize> {
        let due = self
            .store
            .due_for_retry(self.clock.now(), batch_limit)
            .await?;
        if due.is_empty() {
            return Ok(0);
        }

        debug!(due = due.len(), "Retrying due deliveries");
        Ok(self.execute_batch(due, "retry").await)
    }

    /// Execute up to `batch_limit` abandoned deliveries: records whose claim
    /// lease expired, then `pending` records older than the orphan grace
    /// period.
    ///
    /// # Errors
    /// `Store` if the abandoned records cannot be listed.
    pub async fn recover_orphaned(&self, batch_limit: usize) -> EngineResult<usize> {
        let now = self.clock.now();
        let mut abandoned = self.store.expired_claims(now, batch_limit).await?;

        let remaining = batch_limit.saturating_sub(abandoned.len());
        if remaining > 0 {
            let grace_secs = i64::try_from(self.config.orphan_grace_secs).unwrap_or(i64::MAX);
            let grace = Duration::try_seconds(grace_secs).unwrap_or(Duration::MAX);
            let cutoff = now
                .checked_sub_signed(grace)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            abandoned.extend(self.store.stale_pending(cutoff, remaining).await?);
        }

        if abandoned.is_empty() {
            return Ok(0);
        }

        info!(abandoned = abandoned.len(), "Recovering abandoned deliveries");
        Ok(self.execute_batch(abandoned, "recovery").await)
    }

    /// Sweep on a fixed interval until `shutdown` turns `true` or its
    /// sender is dropped. Missed ticks are skipped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.config.interval().as_secs(),
            batch_limit = self.config.batch_limit,
            "Retry scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let ticked = tokio::select! {
                _ = ticker.tick() => true,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    false
                }
            };

            if ticked {
                self.tick().await;
            }
        }

        info!("Retry scheduler stopped");
    }

    async fn tick(&self) {
        match self.sweep(self.config.batch_limit).await {
            Ok(0) => {}
            Ok(count) => info!(attempted = count, "Retry sweep finished"),
            Err(e) => error!(error = %e, "Retry sweep failed"),
        }

        match self.recover_orphaned(self.config.batch_limit).await {
            Ok(0) => {}
            Ok(count) => info!(attempted = count, "Orphan recovery finished"),
            Err(e) => error!(error = %e, "Orphan recovery failed"),
        }
    }

    async fn execute_batch(&self, ids: Vec<DeliveryId>, kind: &'static str) -> usize {
        let concurrency = self.config.concurrency.max(1);

        stream::iter(ids)
            .map(|id| async move { (id, self.executor.execute(id).await) })
            .buffer_unordered(concurrency)
            .fold(0usize, |attempted, (id, result)| async move {
                match result {
                    Ok(outcome) => {
                        debug!(delivery_id = %id, status = %outcome.status, kind, "Scheduled delivery finished");
                        attempted + 1
                    }
                    Err(EngineError::DeliveryNotClaimable { status, .. }) => {
                        debug!(delivery_id = %id, status = %status, kind, "Delivery claimed elsewhere, skipping");
                        attempted
                    }
                    Err(e) => {
                        warn!(delivery_id = %id, error = %e, kind, "Scheduled delivery failed to execute");
                        attempted
                    }
                }
            })
            .await
    }
}
