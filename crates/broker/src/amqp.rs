//! AMQP 0-9-1 broker backed by `lapin`.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions, QueuePurgeOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use mpc_core::job::JobMessage;
use tokio::sync::Mutex;

use crate::error::BrokerError;
use crate::{Acknowledge, Broker, Delivery, JobConsumer};

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

struct Session {
    connection: Connection,
    channel: Channel,
}

/// Lazily connected AMQP broker. A dropped connection is re-established on
/// the next call.
pub struct AmqpBroker {
    url: String,
    session: Mutex<Option<Session>>,
}

impl AmqpBroker {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session: Mutex::new(None),
        }
    }

    /// Connect eagerly so startup fails fast on a bad URL.
    pub async fn connect(url: impl Into<String>) -> Result<Self, BrokerError> {
        let broker = Self::new(url);
        broker.channel().await?;
        Ok(broker)
    }

    async fn channel(&self) -> Result<Channel, BrokerError> {
        let mut session = self.session.lock().await;
        if let Some(s) = session.as_ref() {
            if s.connection.status().connected() && s.channel.status().connected() {
                return Ok(s.channel.clone());
            }
            tracing::warn!("AMQP session lost, reconnecting");
        }

        let connection = Connection::connect(&self.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        tracing::info!("AMQP connection established");
        *session = Some(Session {
            connection,
            channel: channel.clone(),
        });
        Ok(channel)
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare(&self, queue: &str) -> Result<(), BrokerError> {
        self.channel()
            .await?
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn publish(&self, queue: &str, message: &JobMessage) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(message)?;
        self.channel()
            .await?
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn purge(&self, queue: &str) -> Result<u32, BrokerError> {
        let purged = self
            .channel()
            .await?
            .queue_purge(queue, QueuePurgeOptions::default())
            .await?;
        Ok(purged)
    }

    async fn consume(&self, queue: &str) -> Result<Box<dyn JobConsumer>, BrokerError> {
        let channel = self.channel().await?;
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        let consumer = channel
            .basic_consume(
                queue,
                &format!("mpc-worker-{}", std::process::id()),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(Box::new(AmqpConsumer { inner: consumer }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if let Some(session) = self.session.lock().await.take() {
            session.connection.close(200, "shutdown").await?;
            tracing::info!("AMQP connection closed");
        }
        Ok(())
    }
}

struct AmqpConsumer {
    inner: lapin::Consumer,
}

#[async_trait]
impl JobConsumer for AmqpConsumer {
    async fn next(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let delivery = self.inner.next().await?;
        Some(
            delivery
                .map(|d| Delivery::new(d.data, Box::new(AmqpAcker(d.acker))))
                .map_err(BrokerError::from),
        )
    }
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(self: Box<Self>) -> Result<(), BrokerError> {
        self.0.ack(BasicAckOptions::default()).await?;
        Ok(())
    }
}
