//! Durable job queues.
//!
//! [`Broker`] is the seam between the coordinator/worker and the message
//! broker. [`AmqpBroker`] talks AMQP 0-9-1; [`MemoryBroker`] is an in-process
//! double with the same prefetch-1 acknowledgement semantics.

pub mod amqp;
pub mod config;
pub mod error;
pub mod memory;

use async_trait::async_trait;
use mpc_core::job::JobMessage;

pub use amqp::AmqpBroker;
pub use config::BrokerConfig;
pub use error::BrokerError;
pub use memory::MemoryBroker;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare a durable queue. Idempotent.
    async fn declare(&self, queue: &str) -> Result<(), BrokerError>;

    /// Publish a persistent message to `queue`.
    async fn publish(&self, queue: &str, message: &JobMessage) -> Result<(), BrokerError>;

    /// Drop every ready message in `queue`; returns how many were removed.
    async fn purge(&self, queue: &str) -> Result<u32, BrokerError>;

    /// Start consuming `queue` with a prefetch of one: the next delivery is
    /// only handed out after the previous one has been acknowledged.
    async fn consume(&self, queue: &str) -> Result<Box<dyn JobConsumer>, BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait JobConsumer: Send {
    /// Wait for the next delivery. `None` once the consumer is closed.
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>>;
}

#[async_trait]
pub trait Acknowledge: Send {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError>;
}

/// A message handed to a consumer, to be acknowledged exactly once.
pub struct Delivery {
    payload: Vec<u8>,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, acker: Box<dyn Acknowledge>) -> Self {
        Self { payload, acker }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn decode(&self) -> Result<JobMessage, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }
}
