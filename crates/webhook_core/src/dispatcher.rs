//! Dispatch queue and worker pool
//!
//! The publisher hands delivery ids to a bounded [`DispatchQueue`] without
//! waiting. A fixed pool of workers started by [`DeliveryDispatcher::start`]
//! pulls ids off the queue and runs the executor. Ids that cannot be queued
//! stay `pending` in the store and are picked up by orphan recovery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::EngineError;
use crate::executor::DeliveryExecutor;
use crate::ids::DeliveryId;

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("Dispatch queue is full, delivery {0} left pending")]
    Full(DeliveryId),

    #[error("Dispatch queue is closed, delivery {0} left pending")]
    Closed(DeliveryId),
}

/// Sending side of the dispatch queue. Clones share one queue.
#[derive(Clone)]
pub struct DispatchQueue {
    sender: Arc<RwLock<Option<mpsc::Sender<DeliveryId>>>>,
    depth: Arc<AtomicUsize>,
}

/// Receiving side, consumed by [`DeliveryDispatcher::start`].
pub struct DispatchReceiver {
    receiver: mpsc::Receiver<DeliveryId>,
    depth: Arc<AtomicUsize>,
}

/// Create a queue holding at most `capacity` ids.
pub fn dispatch_channel(capacity: usize) -> (DispatchQueue, DispatchReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let depth = Arc::new(AtomicUsize::new(0));
    (
        DispatchQueue {
            sender: Arc::new(RwLock::new(Some(sender))),
            depth: depth.clone(),
        },
        DispatchReceiver { receiver, depth },
    )
}

impl DispatchQueue {
    /// Queue an id without waiting.
    ///
    /// # Errors
    /// `EnqueueError::Full` when the queue is at capacity and
    /// `EnqueueError::Closed` after [`DispatchQueue::close`].
    pub fn try_enqueue(&self, id: DeliveryId) -> Result<(), EnqueueError> {
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = guard.as_ref() else {
            return Err(EnqueueError::Closed(id));
        };

        // Count before sending so a fast worker never decrements below zero.
        self.depth.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(id) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                match e {
                    mpsc::error::TrySendError::Full(_) => Err(EnqueueError::Full(id)),
                    mpsc::error::TrySendError::Closed(_) => Err(EnqueueError::Closed(id)),
                }
            }
        }
    }

    /// Number of ids waiting for a worker.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject further enqueues. Ids already queued are still delivered.
    pub fn close(&self) {
        let mut guard = self.sender.write().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            debug!("Dispatch queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

/// Handle to the running worker pool.
pub struct DeliveryDispatcher {
    workers: Vec<JoinHandle<()>>,
}

impl DeliveryDispatcher {
    /// Spawn `workers` tasks pulling from `receiver`.
    pub fn start(
        receiver: DispatchReceiver,
        executor: Arc<DeliveryExecutor>,
        workers: usize,
    ) -> Self {
        let depth = receiver.depth;
        let shared = Arc::new(Mutex::new(receiver.receiver));
        let count = workers.max(1);

        let workers = (0..count)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    shared.clone(),
                    depth.clone(),
                    executor.clone(),
                ))
            })
            .collect();

        info!(workers = count, "Delivery workers started");
        Self { workers }
    }

    /// Wait until every worker has exited.
    ///
    /// Workers exit once the queue is closed, every [`DispatchQueue`] clone
    /// has released its sender, and the remaining ids are drained.
    pub async fn join(self) {
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Delivery worker panicked");
            }
        }
        info!("Delivery workers stopped");
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DeliveryId>>>,
    depth: Arc<AtomicUsize>,
    executor: Arc<DeliveryExecutor>,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(delivery_id) = next else {
            debug!(worker, "Dispatch queue drained, worker exiting");
            return;
        };
        depth.fetch_sub(1, Ordering::SeqCst);

        match executor.execute(delivery_id).await {
            Ok(outcome) => {
                debug!(worker, delivery_id = %delivery_id, status = %outcome.status, "Dispatched delivery finished");
            }
            Err(EngineError::DeliveryNotClaimable { status, .. }) => {
                debug!(worker, delivery_id = %delivery_id, status = %status, "Delivery already taken");
            }
            Err(e) => {
                warn!(worker, delivery_id = %delivery_id, error = %e, "Dispatched delivery failed to execute");
            }
        }
    }
}
