//! Engine assembly
//!
//! [`WebhookEngine::start`] wires the store, executor, publisher, registry,
//! worker pool and retry scheduler together and spawns the background
//! tasks. [`WebhookEngine::shutdown`] stops them in order: the scheduler is
//! signalled, the queue is closed, and workers drain what was already queued.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dispatcher::{dispatch_channel, DeliveryDispatcher, DispatchQueue};
use crate::errors::EngineResult;
use crate::executor::DeliveryExecutor;
use crate::metrics::EventMetrics;
use crate::publisher::EventPublisher;
use crate::registry::WebhookRegistry;
use crate::scheduler::RetryScheduler;
use crate::store::Store;

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

pub struct WebhookEngine {
    publisher: Arc<EventPublisher>,
    registry: Arc<WebhookRegistry>,
    scheduler: Arc<RetryScheduler>,
    queue: DispatchQueue,
    dispatcher: DeliveryDispatcher,
    shutdown_tx: watch::Sender<bool>,
    scheduler_task: JoinHandle<()>,
}

impl WebhookEngine {
    /// Build every component and spawn the workers and the scheduler loop.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// `EngineError::HttpClient` if the outbound HTTP client cannot be built.
    pub fn start(
        config: &EngineConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn EventMetrics>,
    ) -> EngineResult<Self> {
        let executor = Arc::new(DeliveryExecutor::new(
            &config.delivery,
            store.clone(),
            clock.clone(),
            metrics,
        )?);

        let (queue, receiver) = dispatch_channel(config.delivery.queue_capacity);
        let publisher = Arc::new(EventPublisher::new(
            store.clone(),
            clock.clone(),
            queue.clone(),
        ));
        let registry = Arc::new(WebhookRegistry::new(
            store.clone(),
            publisher.clone(),
            executor.clone(),
            clock.clone(),
            config.registry.clone(),
        ));
        let scheduler = Arc::new(RetryScheduler::new(
            store,
            executor.clone(),
            clock,
            config.scheduler.clone(),
        ));

        let dispatcher = DeliveryDispatcher::start(receiver, executor, config.delivery.workers);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler_task = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run(shutdown_rx).await })
        };

        info!(
            workers = config.delivery.workers,
            queue_capacity = config.delivery.queue_capacity,
            "Webhook engine started"
        );

        Ok(Self {
            publisher,
            registry,
            scheduler,
            queue,
            dispatcher,
            shutdown_tx,
            scheduler_task,
        })
    }

    pub fn publisher(&self) -> Arc<EventPublisher> {
        self.publisher.clone()
    }

    pub fn registry(&self) -> Arc<WebhookRegistry> {
        self.registry.clone()
    }

    pub fn scheduler(&self) -> Arc<RetryScheduler> {
        self.scheduler.clone()
    }

    /// Current depth of the dispatch queue.
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Stop background work and wait for in-flight deliveries to finish.
    ///
    /// Deliveries published after this point stay `pending` until the next
    /// start recovers them.
    pub async fn shutdown(self) {
        info!("Webhook engine shutting down");

        // The receiver may already be gone if the scheduler task ended.
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.scheduler_task.await {
            error!(error = %e, "Retry scheduler task panicked");
        }

        self.queue.close();
        self.dispatcher.join().await;

        info!("Webhook engine stopped");
    }
}
