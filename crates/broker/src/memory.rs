//! In-process broker with prefetch-1 consumers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mpc_core::job::JobMessage;
use tokio::sync::{Mutex, Notify};

use crate::error::BrokerError;
use crate::{Acknowledge, Broker, Delivery, JobConsumer};

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Vec<u8>>,
    unacked: usize,
    acked: usize,
}

#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<String, QueueState>>,
    notify: Notify,
    closed: AtomicBool,
    offline: AtomicBool,
    fail_acks: AtomicBool,
}

/// Cloneable handle to a shared in-memory broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every publish, purge and consume call fails.
    pub fn set_available(&self, available: bool) {
        self.inner.offline.store(!available, Ordering::SeqCst);
    }

    /// While set every ack fails. The message stays unacked but the
    /// consumer may take the next one, as after a lost channel.
    pub fn set_ack_failures(&self, fail: bool) {
        self.inner.fail_acks.store(fail, Ordering::SeqCst);
    }

    /// Messages waiting in `queue`.
    pub async fn ready_count(&self, queue: &str) -> usize {
        self.inner
            .queues
            .lock()
            .await
            .get(queue)
            .map_or(0, |q| q.ready.len())
    }

    pub async fn unacked_count(&self, queue: &str) -> usize {
        self.inner
            .queues
            .lock()
            .await
            .get(queue)
            .map_or(0, |q| q.unacked)
    }

    pub async fn acked_count(&self, queue: &str) -> usize {
        self.inner
            .queues
            .lock()
            .await
            .get(queue)
            .map_or(0, |q| q.acked)
    }

    /// Decoded copies of the messages waiting in `queue`.
    pub async fn peek(&self, queue: &str) -> Vec<JobMessage> {
        self.inner
            .queues
            .lock()
            .await
            .get(queue)
            .map(|q| {
                q.ready
                    .iter()
                    .filter_map(|bytes| serde_json::from_slice(bytes).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Enqueue raw bytes, bypassing serialisation.
    pub async fn publish_raw(&self, queue: &str, payload: Vec<u8>) {
        self.inner
            .queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .ready
            .push_back(payload);
        self.inner.notify.notify_waiters();
    }

    fn check(&self) -> Result<(), BrokerError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(BrokerError::Unavailable("memory broker offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare(&self, queue: &str) -> Result<(), BrokerError> {
        self.check()?;
        self.inner
            .queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, message: &JobMessage) -> Result<(), BrokerError> {
        self.check()?;
        let payload = serde_json::to_vec(message)?;
        self.publish_raw(queue, payload).await;
        Ok(())
    }

    async fn purge(&self, queue: &str) -> Result<u32, BrokerError> {
        self.check()?;
        let mut queues = self.inner.queues.lock().await;
        let purged = queues
            .get_mut(queue)
            .map_or(0, |q| std::mem::take(&mut q.ready).len());
        Ok(purged as u32)
    }

    async fn consume(&self, queue: &str) -> Result<Box<dyn JobConsumer>, BrokerError> {
        self.check()?;
        Ok(Box::new(MemoryConsumer {
            inner: Arc::clone(&self.inner),
            queue: queue.to_string(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        Ok(())
    }
}

struct MemoryConsumer {
    inner: Arc<Inner>,
    queue: String,
    in_flight: Arc<AtomicBool>,
}

impl MemoryConsumer {
    async fn try_take(&self) -> Option<Delivery> {
        if self.in_flight.load(Ordering::SeqCst) {
            return None;
        }
        let mut queues = self.inner.queues.lock().await;
        let state = queues.entry(self.queue.clone()).or_default();
        let payload = state.ready.pop_front()?;
        state.unacked += 1;
        self.in_flight.store(true, Ordering::SeqCst);

        Some(Delivery::new(
            payload,
            Box::new(MemoryAcker {
                inner: Arc::clone(&self.inner),
                queue: self.queue.clone(),
                in_flight: Arc::clone(&self.in_flight),
            }),
        ))
    }
}

#[async_trait]
impl JobConsumer for MemoryConsumer {
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>> {
        loop {
            // Registered before the check so a concurrent publish is not missed.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(delivery) = self.try_take().await {
                return Some(Ok(delivery));
            }
            notified.await;
        }
    }
}

struct MemoryAcker {
    inner: Arc<Inner>,
    queue: String,
    in_flight: Arc<AtomicBool>,
}

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError> {
        if self.inner.fail_acks.load(Ordering::SeqCst) {
            self.in_flight.store(false, Ordering::SeqCst);
            self.inner.notify.notify_waiters();
            return Err(BrokerError::Unavailable("ack rejected by memory broker".into()));
        }
        {
            let mut queues = self.inner.queues.lock().await;
            let state = queues.entry(self.queue.clone()).or_default();
            state.unacked = state.unacked.saturating_sub(1);
            state.acked += 1;
        }
        self.in_flight.store(false, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        Ok(())
    }
}
