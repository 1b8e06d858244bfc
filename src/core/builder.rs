use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{QueueConfig, WorkQueue, queue::Shared},
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    tracking::{ExceptionSink, IdleGate, QueueListener, StatusRegistry},
};

/// Builder for constructing a [`WorkQueue`] with listeners and subscribers.
pub struct WorkQueueBuilder {
    cfg: QueueConfig,
    listeners: Vec<Arc<dyn QueueListener>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl WorkQueueBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: QueueConfig) -> Self {
        Self {
            cfg,
            listeners: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Registers a lifecycle listener.
    ///
    /// Listeners are called in registration order, after the queue's own
    /// status registry, failure sink and idle gate.
    pub fn with_listener(mut self, listener: Arc<dyn QueueListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues; they never slow the queue down.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the queue and spawns its dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Arc<WorkQueue> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        let status = Arc::new(StatusRegistry::new());
        let exceptions = Arc::new(ExceptionSink::new());
        let gate = Arc::new(IdleGate::new());

        let mut listeners: Vec<Arc<dyn QueueListener>> = Vec::with_capacity(3 + self.listeners.len());
        listeners.push(status.clone());
        listeners.push(exceptions.clone());
        listeners.push(gate.clone());
        listeners.extend(self.listeners);

        if !self.subscribers.is_empty() {
            spawn_event_listener(
                bus.clone(),
                SubscriberSet::new(self.subscribers, bus.clone()),
                runtime_token.clone(),
            );
        }

        let shared = Arc::new(Shared::new(
            self.cfg,
            bus,
            runtime_token,
            status,
            exceptions,
            gate,
            listeners,
        ));
        tokio::spawn(Arc::clone(&shared).dispatch());
        Arc::new(WorkQueue::from_shared(shared))
    }
}

/// Forwards bus events to the subscriber set until the queue is dropped.
fn spawn_event_listener(bus: Bus, set: SubscriberSet, runtime_token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = runtime_token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        // drain what is still buffered so subscribers see the final events
        while let Ok(ev) = rx.try_recv() {
            set.emit(ev);
        }
        set.shutdown().await;
    });
}
