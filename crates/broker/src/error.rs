#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Message codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
